//! Requirement specifiers.
//!
//! A small PEP 508 subset: `name[extras] specifiers ; marker` or `name @ url`.
//! Resolution itself belongs to the installer; these types only exist so the
//! working set can answer "is this requirement satisfied here?" and so that
//! the failing requirement can be named in errors.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequirementError {
  #[error("empty requirement")]
  Empty,

  #[error("invalid project name in requirement: {0}")]
  InvalidName(String),

  #[error("invalid version specifier '{specifier}' in requirement '{requirement}'")]
  InvalidSpecifier { requirement: String, specifier: String },

  #[error("invalid version: {0}")]
  InvalidVersion(String),
}

/// Normalize a project name for comparison (PEP 503).
///
/// Lowercases and collapses runs of `-`, `_` and `.` into a single `-`.
pub fn normalize_name(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  let mut pending_sep = false;
  for c in name.chars() {
    if matches!(c, '-' | '_' | '.') {
      pending_sep = true;
      continue;
    }
    if pending_sep && !out.is_empty() {
      out.push('-');
    }
    pending_sep = false;
    out.extend(c.to_lowercase());
  }
  out
}

fn is_valid_name(name: &str) -> bool {
  let bytes = name.as_bytes();
  !bytes.is_empty()
    && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
    && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
    && bytes
      .iter()
      .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// A parsed requirement string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Requirement {
  /// Project name as written.
  pub name: String,
  pub extras: Vec<String>,
  pub specifiers: Vec<VersionSpecifier>,
  /// Direct reference (`name @ url`).
  pub url: Option<String>,
  /// Environment marker, passed through to the installer verbatim.
  pub marker: Option<String>,
}

impl Requirement {
  /// Name used for working-set lookups.
  pub fn key(&self) -> String {
    normalize_name(&self.name)
  }

  /// Whether `version` satisfies every specifier.
  ///
  /// Direct references and unconstrained requirements accept any version.
  pub fn matches(&self, version: &Version) -> bool {
    self.specifiers.iter().all(|spec| spec.contains(version))
  }
}

impl FromStr for Requirement {
  type Err = RequirementError;

  fn from_str(input: &str) -> Result<Self, Self::Err> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
      return Err(RequirementError::Empty);
    }

    let (body, marker) = match trimmed.split_once(';') {
      Some((body, marker)) => (body.trim(), Some(marker.trim().to_string()).filter(|m| !m.is_empty())),
      None => (trimmed, None),
    };

    let (body, url) = match body.split_once('@') {
      Some((body, url)) => (body.trim(), Some(url.trim().to_string())),
      None => (body, None),
    };

    let name_end = body
      .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
      .unwrap_or(body.len());
    let name = &body[..name_end];
    if !is_valid_name(name) {
      return Err(RequirementError::InvalidName(trimmed.to_string()));
    }

    let mut rest = body[name_end..].trim_start();
    let mut extras = Vec::new();
    if let Some(after) = rest.strip_prefix('[') {
      let close = after
        .find(']')
        .ok_or_else(|| RequirementError::InvalidName(trimmed.to_string()))?;
      extras = after[..close]
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(String::from)
        .collect();
      rest = after[close + 1..].trim_start();
    }

    // Specifiers may be wrapped in parentheses: `name (>=1.0)`
    let rest = rest
      .strip_prefix('(')
      .and_then(|r| r.strip_suffix(')'))
      .unwrap_or(rest)
      .trim();

    let specifiers = if rest.is_empty() {
      Vec::new()
    } else if url.is_some() {
      return Err(RequirementError::InvalidSpecifier {
        requirement: trimmed.to_string(),
        specifier: rest.to_string(),
      });
    } else {
      rest
        .split(',')
        .map(|s| {
          s.parse::<VersionSpecifier>().map_err(|_| RequirementError::InvalidSpecifier {
            requirement: trimmed.to_string(),
            specifier: s.trim().to_string(),
          })
        })
        .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Self {
      name: name.to_string(),
      extras,
      specifiers,
      url,
      marker,
    })
  }
}

impl fmt::Display for Requirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)?;
    if !self.extras.is_empty() {
      write!(f, "[{}]", self.extras.join(","))?;
    }
    if let Some(url) = &self.url {
      write!(f, " @ {}", url)?;
    }
    let specs: Vec<String> = self.specifiers.iter().map(ToString::to_string).collect();
    write!(f, "{}", specs.join(","))?;
    if let Some(marker) = &self.marker {
      // A bare `;` would be read as part of the URL
      let sep = if self.url.is_some() { " ; " } else { "; " };
      write!(f, "{}{}", sep, marker)?;
    }
    Ok(())
  }
}

impl TryFrom<String> for Requirement {
  type Error = RequirementError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Requirement> for String {
  fn from(value: Requirement) -> Self {
    value.to_string()
  }
}

/// Comparison operator of a version specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
  Equal,
  NotEqual,
  GreaterEqual,
  LessEqual,
  Greater,
  Less,
  Compatible,
  Arbitrary,
}

impl Operator {
  fn as_str(&self) -> &'static str {
    match self {
      Self::Equal => "==",
      Self::NotEqual => "!=",
      Self::GreaterEqual => ">=",
      Self::LessEqual => "<=",
      Self::Greater => ">",
      Self::Less => "<",
      Self::Compatible => "~=",
      Self::Arbitrary => "===",
    }
  }
}

/// A single clause such as `>=1.2` or `==2.*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSpecifier {
  pub operator: Operator,
  /// Version text as written, without the trailing `.*`.
  pub version: String,
  pub wildcard: bool,
}

impl VersionSpecifier {
  pub fn contains(&self, candidate: &Version) -> bool {
    let target = match self.operator {
      Operator::Arbitrary => return candidate.raw == self.version,
      _ => match self.version.parse::<Version>() {
        Ok(target) => target,
        Err(_) => return false,
      },
    };

    match self.operator {
      Operator::Equal if self.wildcard => candidate.has_release_prefix(&target.release),
      Operator::NotEqual if self.wildcard => !candidate.has_release_prefix(&target.release),
      Operator::Equal => candidate == &target,
      Operator::NotEqual => candidate != &target,
      Operator::GreaterEqual => candidate >= &target,
      Operator::LessEqual => candidate <= &target,
      Operator::Greater => candidate > &target,
      Operator::Less => candidate < &target,
      Operator::Compatible => {
        let prefix_len = target.release.len().saturating_sub(1).max(1);
        candidate >= &target && candidate.has_release_prefix(&target.release[..prefix_len])
      }
      Operator::Arbitrary => false,
    }
  }
}

impl FromStr for VersionSpecifier {
  type Err = RequirementError;

  fn from_str(input: &str) -> Result<Self, Self::Err> {
    let s = input.trim();
    // Longest operators first so `===` is not read as `==`
    let operators = [
      ("===", Operator::Arbitrary),
      ("==", Operator::Equal),
      ("!=", Operator::NotEqual),
      (">=", Operator::GreaterEqual),
      ("<=", Operator::LessEqual),
      ("~=", Operator::Compatible),
      (">", Operator::Greater),
      ("<", Operator::Less),
    ];

    let (operator, rest) = operators
      .iter()
      .find_map(|(prefix, op)| s.strip_prefix(prefix).map(|rest| (*op, rest.trim())))
      .ok_or_else(|| RequirementError::InvalidVersion(s.to_string()))?;

    let (version, wildcard) = match rest.strip_suffix(".*") {
      Some(v) if matches!(operator, Operator::Equal | Operator::NotEqual) => (v, true),
      Some(_) => return Err(RequirementError::InvalidVersion(s.to_string())),
      None => (rest, false),
    };

    if operator != Operator::Arbitrary {
      version.parse::<Version>()?;
    }
    if operator == Operator::Compatible && !version.contains('.') {
      return Err(RequirementError::InvalidVersion(s.to_string()));
    }

    Ok(Self {
      operator,
      version: version.to_string(),
      wildcard,
    })
  }
}

impl fmt::Display for VersionSpecifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.operator.as_str(), self.version)?;
    if self.wildcard {
      write!(f, ".*")?;
    }
    Ok(())
  }
}

/// Pre-release phase, ordered alpha < beta < rc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum PrePhase {
  Alpha,
  Beta,
  Rc,
}

/// A PEP 440 version, reduced to what ordering needs.
///
/// Local labels (`+abc`) are kept in `raw` only and ignored for comparison.
#[derive(Debug, Clone)]
pub struct Version {
  raw: String,
  epoch: u64,
  release: Vec<u64>,
  pre: Option<(PrePhase, u64)>,
  post: Option<u64>,
  dev: Option<u64>,
}

impl Version {
  fn has_release_prefix(&self, prefix: &[u64]) -> bool {
    prefix
      .iter()
      .enumerate()
      .all(|(i, part)| self.release.get(i).copied().unwrap_or(0) == *part)
  }

  /// Sort key after the release segment: dev-only < pre < final < post.
  fn stage(&self) -> (u8, Option<PrePhase>, u64, u64, bool, u64) {
    let dev_key = (self.dev.is_none(), self.dev.unwrap_or(0));
    match (self.pre, self.post) {
      (None, None) if self.dev.is_some() => (0, None, 0, 0, dev_key.0, dev_key.1),
      (Some((phase, n)), _) => (1, Some(phase), n, self.post.unwrap_or(0), dev_key.0, dev_key.1),
      (None, None) => (2, None, 0, 0, true, 0),
      (None, Some(post)) => (3, None, post, 0, dev_key.0, dev_key.1),
    }
  }

  fn cmp_release(&self, other: &Self) -> Ordering {
    let len = self.release.len().max(other.release.len());
    for i in 0..len {
      let a = self.release.get(i).copied().unwrap_or(0);
      let b = other.release.get(i).copied().unwrap_or(0);
      match a.cmp(&b) {
        Ordering::Equal => continue,
        ord => return ord,
      }
    }
    Ordering::Equal
  }
}

fn split_number(s: &str) -> (u64, &str) {
  let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
  (s[..end].parse().unwrap_or(0), &s[end..])
}

fn strip_separator(s: &str) -> &str {
  s.strip_prefix(['.', '-', '_']).unwrap_or(s)
}

impl FromStr for Version {
  type Err = RequirementError;

  fn from_str(input: &str) -> Result<Self, Self::Err> {
    let invalid = || RequirementError::InvalidVersion(input.to_string());
    let raw = input.trim();
    let lowered = raw.to_ascii_lowercase();
    let mut s = lowered.strip_prefix('v').unwrap_or(&lowered);
    s = s.split('+').next().unwrap_or(s);

    let mut epoch = 0;
    if let Some((e, rest)) = s.split_once('!') {
      epoch = e.parse().map_err(|_| invalid())?;
      s = rest;
    }

    if !s.starts_with(|c: char| c.is_ascii_digit()) {
      return Err(invalid());
    }

    let mut release = Vec::new();
    loop {
      let (part, rest) = split_number(s);
      release.push(part);
      s = rest;
      match s.strip_prefix('.') {
        Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => s = next,
        _ => break,
      }
    }

    let mut pre = None;
    let mut post = None;
    let mut dev = None;

    let candidate = strip_separator(s);
    let pre_tags = [
      ("alpha", PrePhase::Alpha),
      ("a", PrePhase::Alpha),
      ("beta", PrePhase::Beta),
      ("b", PrePhase::Beta),
      ("preview", PrePhase::Rc),
      ("pre", PrePhase::Rc),
      ("rc", PrePhase::Rc),
      ("c", PrePhase::Rc),
    ];
    if let Some((phase, rest)) = pre_tags
      .iter()
      .find_map(|(tag, phase)| candidate.strip_prefix(tag).map(|rest| (*phase, rest)))
    {
      let (n, rest) = split_number(strip_separator(rest));
      pre = Some((phase, n));
      s = rest;
    }

    let candidate = strip_separator(s);
    if let Some(rest) = ["post", "rev", "r"].iter().find_map(|tag| candidate.strip_prefix(tag)) {
      let (n, rest) = split_number(strip_separator(rest));
      post = Some(n);
      s = rest;
    } else if let Some(rest) = s.strip_prefix('-')
      && rest.starts_with(|c: char| c.is_ascii_digit())
    {
      let (n, rest) = split_number(rest);
      post = Some(n);
      s = rest;
    }

    let candidate = strip_separator(s);
    if let Some(rest) = candidate.strip_prefix("dev") {
      let (n, rest) = split_number(rest);
      dev = Some(n);
      s = rest;
    }

    if !s.is_empty() {
      return Err(invalid());
    }

    Ok(Self {
      raw: raw.to_string(),
      epoch,
      release,
      pre,
      post,
      dev,
    })
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.raw)
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .epoch
      .cmp(&other.epoch)
      .then_with(|| self.cmp_release(other))
      .then_with(|| self.stage().cmp(&other.stage()))
  }
}
