//! Module search order and distribution registry handed to build scripts.
//!
//! An [`Environment`] is the explicit stand-in for interpreter-wide state: the
//! ordered list of directories modules are imported from, plus the
//! [`WorkingSet`] of distributions visible through them. Everything that
//! mutates it takes `&mut Environment`, and [`Environment::scoped`] undoes
//! those mutations once a closure returns.

mod layout;
mod working_set;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

pub use layout::{InstallScheme, PrefixLayout, PythonVersion};
pub use working_set::{Distribution, Lookup, WorkingSet, scan_entry};

use crate::consts::SEARCH_PATH_ENV;

#[derive(Debug, Error)]
pub enum EnvironmentError {
  #[error("failed to read search path entry {path}: {source}")]
  ReadEntry {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("search path entry cannot be joined into PYTHONPATH: {0}")]
  JoinPaths(#[from] std::env::JoinPathsError),
}

/// Subpaths of an install prefix to put in front of the search order.
///
/// Platform libraries come first, then pure libraries. A layout whose two
/// directories coincide yields a single entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPathAugmentation {
  entries: Vec<PathBuf>,
}

impl SearchPathAugmentation {
  pub fn for_layout(layout: &PrefixLayout) -> Self {
    let mut entries = vec![layout.platlib.clone()];
    if layout.purelib != layout.platlib {
      entries.push(layout.purelib.clone());
    }
    Self { entries }
  }

  pub fn entries(&self) -> &[PathBuf] {
    &self.entries
  }
}

/// Saved state returned by [`Environment::snapshot`].
#[derive(Debug, Clone)]
pub struct EnvironmentSnapshot {
  search_order: Vec<PathBuf>,
  working_set: WorkingSet,
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
  search_order: Vec<PathBuf>,
  working_set: WorkingSet,
}

impl Environment {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build an environment over `entries`, scanning each for distributions.
  pub fn from_search_order<I, P>(entries: I) -> Result<Self, EnvironmentError>
  where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
  {
    let mut env = Self::new();
    for entry in entries {
      let entry = entry.as_ref();
      if env.search_order.iter().any(|e| e == entry) {
        continue;
      }
      env.search_order.push(entry.to_path_buf());
      env.working_set.add_entry(entry)?;
    }
    Ok(env)
  }

  /// Seed the search order from this process's `PYTHONPATH`.
  pub fn from_process() -> Result<Self, EnvironmentError> {
    let entries: Vec<PathBuf> = match std::env::var_os(SEARCH_PATH_ENV) {
      Some(value) => std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()).collect(),
      None => Vec::new(),
    };
    debug!(count = entries.len(), "seeding environment from {}", SEARCH_PATH_ENV);
    Self::from_search_order(entries)
  }

  pub fn search_order(&self) -> &[PathBuf] {
    &self.search_order
  }

  pub fn working_set(&self) -> &WorkingSet {
    &self.working_set
  }

  pub fn working_set_mut(&mut self) -> &mut WorkingSet {
    &mut self.working_set
  }

  /// Put the augmentation's entries in front of the search order and register
  /// them with the working set.
  ///
  /// An entry that is already on the search order moves to its place at the
  /// front, so applying the same augmentation twice changes nothing.
  pub fn augment(&mut self, augmentation: &SearchPathAugmentation) -> Result<(), EnvironmentError> {
    for (index, entry) in augmentation.entries().iter().enumerate() {
      match self.search_order.iter().position(|e| e == entry) {
        Some(current) if current == index => trace!(entry = ?entry, "search path entry already in place"),
        Some(current) => {
          debug!(entry = ?entry, from = current, to = index, "moving search path entry to the front");
          self.search_order.remove(current);
          self.search_order.insert(index, entry.clone());
        }
        None => {
          debug!(entry = ?entry, position = index, "prepending search path entry");
          self.search_order.insert(index, entry.clone());
        }
      }
      self.working_set.insert_entry(entry, index)?;
    }
    Ok(())
  }

  pub fn snapshot(&self) -> EnvironmentSnapshot {
    EnvironmentSnapshot {
      search_order: self.search_order.clone(),
      working_set: self.working_set.clone(),
    }
  }

  pub fn restore(&mut self, snapshot: EnvironmentSnapshot) {
    self.search_order = snapshot.search_order;
    self.working_set = snapshot.working_set;
  }

  /// Run `f` against this environment and undo its mutations afterwards,
  /// whatever `f` returns.
  pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Environment) -> R) -> R {
    let snapshot = self.snapshot();
    let result = f(self);
    self.restore(snapshot);
    result
  }

  /// The search order rendered as a `PYTHONPATH` value for child processes.
  pub fn python_path(&self) -> Result<OsString, EnvironmentError> {
    Ok(std::env::join_paths(&self.search_order)?)
  }
}
