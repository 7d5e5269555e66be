//! Registry of distributions importable from the search order.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};

use super::EnvironmentError;
use crate::requirement::{Requirement, Version, normalize_name};

/// An installed distribution discovered on a search path entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distribution {
  pub name: String,
  pub version: String,
  /// Search path entry the distribution was found on.
  pub location: PathBuf,
  /// The `*.dist-info` or `*.egg-info` path it was read from.
  pub metadata_path: PathBuf,
}

impl Distribution {
  pub fn key(&self) -> String {
    normalize_name(&self.name)
  }

  pub fn parsed_version(&self) -> Option<Version> {
    self.version.parse().ok()
  }

  /// Whether this distribution satisfies `requirement`.
  ///
  /// An unparseable version only satisfies requirements without specifiers.
  pub fn satisfies(&self, requirement: &Requirement) -> bool {
    if self.key() != requirement.key() {
      return false;
    }
    match self.parsed_version() {
      Some(version) => requirement.matches(&version),
      None => requirement.specifiers.is_empty(),
    }
  }
}

/// Outcome of looking a requirement up in the working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
  Found(Distribution),
  NotFound,
  /// The highest-precedence distribution with this name does not satisfy the requirement.
  Conflict { found: Distribution, requirement: Requirement },
}

impl Lookup {
  pub fn is_found(&self) -> bool {
    matches!(self, Lookup::Found(_))
  }
}

/// Known distributions, indexed by search path entry.
///
/// Entries are kept in precedence order. Explicitly registered distributions
/// take precedence over anything discovered on an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
  entries: Vec<PathBuf>,
  by_entry: BTreeMap<PathBuf, Vec<Distribution>>,
  registered: BTreeMap<String, Distribution>,
}

impl WorkingSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> &[PathBuf] {
    &self.entries
  }

  /// Add a search path entry at the lowest precedence.
  ///
  /// Re-adding a known entry only rescans its distributions.
  pub fn add_entry(&mut self, entry: &Path) -> Result<(), EnvironmentError> {
    match self.entries.iter().position(|e| e == entry) {
      Some(current) => self.insert_entry(entry, current),
      None => self.insert_entry(entry, self.entries.len()),
    }
  }

  /// Put a search path entry at `index` in precedence order and rescan it.
  ///
  /// A known entry is moved rather than duplicated.
  pub fn insert_entry(&mut self, entry: &Path, index: usize) -> Result<(), EnvironmentError> {
    let dists = scan_entry(entry)?;
    debug!(entry = ?entry, count = dists.len(), "scanned search path entry");
    self.entries.retain(|e| e != entry);
    let index = index.min(self.entries.len());
    self.entries.insert(index, entry.to_path_buf());
    self.by_entry.insert(entry.to_path_buf(), dists);
    Ok(())
  }

  /// Register a distribution explicitly. Registering an identical one again is a no-op.
  pub fn add(&mut self, dist: Distribution) {
    let key = dist.key();
    if self.registered.get(&key) != Some(&dist) {
      trace!(name = %dist.name, version = %dist.version, "registering distribution");
      self.registered.insert(key, dist);
    }
  }

  /// The highest-precedence distribution named like `name`.
  pub fn get(&self, name: &str) -> Option<&Distribution> {
    let key = normalize_name(name);
    self.registered.get(&key).or_else(|| {
      self
        .entries
        .iter()
        .filter_map(|entry| self.by_entry.get(entry))
        .flat_map(|dists| dists.iter())
        .find(|dist| dist.key() == key)
    })
  }

  pub fn find(&self, requirement: &Requirement) -> Lookup {
    match self.get(&requirement.name) {
      Some(dist) if dist.satisfies(requirement) => Lookup::Found(dist.clone()),
      Some(dist) => Lookup::Conflict {
        found: dist.clone(),
        requirement: requirement.clone(),
      },
      None => Lookup::NotFound,
    }
  }
}

/// Read every distribution's metadata directly under `entry`.
///
/// A missing entry has no distributions.
pub fn scan_entry(entry: &Path) -> Result<Vec<Distribution>, EnvironmentError> {
  let read_dir = match fs::read_dir(entry) {
    Ok(read_dir) => read_dir,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => {
      return Err(EnvironmentError::ReadEntry {
        path: entry.to_path_buf(),
        source: e,
      });
    }
  };

  let mut dists = Vec::new();
  for item in read_dir {
    let item = item.map_err(|e| EnvironmentError::ReadEntry {
      path: entry.to_path_buf(),
      source: e,
    })?;
    let path = item.path();
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
      continue;
    };

    let (stem, metadata_file) = if let Some(stem) = file_name.strip_suffix(".dist-info") {
      (stem, path.join("METADATA"))
    } else if let Some(stem) = file_name.strip_suffix(".egg-info") {
      // Legacy installs may write PKG-INFO as a plain `.egg-info` file
      let metadata_file = if path.is_dir() { path.join("PKG-INFO") } else { path.clone() };
      (stem, metadata_file)
    } else {
      continue;
    };

    let from_headers = fs::read_to_string(&metadata_file).ok().and_then(|c| parse_metadata(&c));
    let Some((name, version)) = from_headers.or_else(|| parse_stem(stem)) else {
      trace!(path = ?path, "skipping metadata without name and version");
      continue;
    };

    dists.push(Distribution {
      name,
      version,
      location: entry.to_path_buf(),
      metadata_path: path,
    });
  }

  dists.sort_by(|a, b| a.key().cmp(&b.key()));
  Ok(dists)
}

/// Extract `Name` and `Version` from core metadata headers.
fn parse_metadata(content: &str) -> Option<(String, String)> {
  let mut name = None;
  let mut version = None;
  for line in content.lines() {
    if line.trim().is_empty() {
      break;
    }
    if let Some(value) = line.strip_prefix("Name:") {
      name = Some(value.trim().to_string());
    } else if let Some(value) = line.strip_prefix("Version:") {
      version = Some(value.trim().to_string());
    }
  }
  Some((name?, version?))
}

/// Fall back to `<name>-<version>[-...]` encoded in the metadata directory name.
fn parse_stem(stem: &str) -> Option<(String, String)> {
  let mut parts = stem.splitn(3, '-');
  let name = parts.next().filter(|n| !n.is_empty())?;
  let version = parts.next().filter(|v| !v.is_empty())?;
  Some((name.to_string(), version.to_string()))
}
