//! Self-contained executable archives.
//!
//! The bundler flattens a built library tree and an installed dependency tree
//! into one zip file, adds a `__main__.py` that calls the configured entry
//! point, and marks the result executable. The interpreter runs such an
//! archive directly: `python app.pyz`.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::consts::{ENTRY_POINT_FILE, EXCLUDED_DIR_SUFFIXES, EXCLUDED_FILE_SUFFIXES};
use crate::platform::permissions::{PermissionsError, make_executable};
use crate::util::fs::ensure_dir;
use crate::util::hash::{ContentHash, HashError, hash_file};

#[derive(Debug, Error)]
pub enum BundleError {
  #[error("failed to write archive {path}: {source}")]
  ArchiveWriteFailed {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("failed to create directory {path}: {source}")]
  DirectoryCreateFailed {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk {root}: {source}")]
  Walk {
    root: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to read {path}: {source}")]
  ReadSource {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid entry point '{0}', expected 'module:function'")]
  InvalidEntryPoint(String),

  #[error(transparent)]
  Permissions(#[from] PermissionsError),

  #[error(transparent)]
  Hash(#[from] HashError),
}

/// Names that never make it into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRules {
  pub dir_suffixes: Vec<String>,
  pub file_suffixes: Vec<String>,
}

impl Default for ExclusionRules {
  fn default() -> Self {
    Self {
      dir_suffixes: EXCLUDED_DIR_SUFFIXES.iter().map(|s| s.to_string()).collect(),
      file_suffixes: EXCLUDED_FILE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl ExclusionRules {
  pub fn excludes_dir(&self, name: &str) -> bool {
    self.dir_suffixes.iter().any(|s| name.ends_with(s.as_str()))
  }

  pub fn excludes_file(&self, name: &str) -> bool {
    self.file_suffixes.iter().any(|s| name.ends_with(s.as_str()))
  }
}

/// `module:function` called by the synthesized `__main__.py`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
  pub module: String,
  pub function: String,
}

impl EntryPoint {
  pub fn parse(s: &str) -> Result<Self, BundleError> {
    s.parse()
  }

  /// Source of the archive's `__main__.py`.
  pub fn main_py(&self) -> String {
    format!(
      "#!python\nimport sys\n\nfrom {module} import {function}\n\n\nif __name__ == \"__main__\":\n    sys.exit({function}())\n",
      module = self.module,
      function = self.function,
    )
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  chars.next().is_some_and(|c| c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl FromStr for EntryPoint {
  type Err = BundleError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (module, function) = match s.trim().split_once(':') {
      Some((module, function)) => (module.trim(), function.trim()),
      None => (s.trim(), "main"),
    };
    if module.is_empty() || !module.split('.').all(is_identifier) || !is_identifier(function) {
      return Err(BundleError::InvalidEntryPoint(s.to_string()));
    }
    Ok(Self {
      module: module.to_string(),
      function: function.to_string(),
    })
  }
}

impl fmt::Display for EntryPoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.module, self.function)
  }
}

/// What a finished archive contains.
#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
  pub path: PathBuf,
  /// Archive entry names in write order.
  pub entries: Vec<String>,
  /// Relative paths found in both roots; the library root's copy won.
  pub duplicates: Vec<String>,
  pub sha256: ContentHash,
}

/// Inputs of one archive build.
#[derive(Debug, Clone)]
pub struct BundleManifest {
  pub library_root: PathBuf,
  pub dependency_root: Option<PathBuf>,
  pub exclusions: ExclusionRules,
  pub entry_point: EntryPoint,
}

impl BundleManifest {
  pub fn new(library_root: &Path, dependency_root: Option<&Path>, entry_point: EntryPoint) -> Self {
    Self {
      library_root: library_root.to_path_buf(),
      dependency_root: dependency_root.map(Path::to_path_buf),
      exclusions: ExclusionRules::default(),
      entry_point,
    }
  }

  /// Write the archive to `output`, replacing anything already there.
  pub fn write(&self, output: &Path) -> Result<BundleReport, BundleError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
      ensure_dir(parent).map_err(|source| BundleError::DirectoryCreateFailed {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    match fs::remove_file(output) {
      Ok(()) => debug!(path = ?output, "removed previous archive"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => {
        return Err(BundleError::ArchiveWriteFailed {
          path: output.to_path_buf(),
          source: e.into(),
        });
      }
    }

    info!(path = ?output, entry_point = %self.entry_point, "creating the executable");
    let result = self.write_archive(output);
    let (entries, duplicates) = match result {
      Ok(written) => written,
      Err(e) => {
        // Never leave a partial archive behind
        let _ = fs::remove_file(output);
        return Err(e);
      }
    };

    make_executable(output)?;
    let sha256 = hash_file(output)?;
    info!(path = ?output, entries = entries.len(), sha256 = %sha256, "archive written");

    Ok(BundleReport {
      path: output.to_path_buf(),
      entries,
      duplicates,
      sha256,
    })
  }

  fn write_archive(&self, output: &Path) -> Result<(Vec<String>, Vec<String>), BundleError> {
    let write_error = |source: zip::result::ZipError| BundleError::ArchiveWriteFailed {
      path: output.to_path_buf(),
      source,
    };

    let file = File::create(output).map_err(|e| write_error(e.into()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
      .compression_method(zip::CompressionMethod::Deflated)
      .unix_permissions(0o644);

    let mut written = BTreeSet::new();
    let mut entries = Vec::new();
    let mut duplicates = Vec::new();

    let mut roots = vec![self.library_root.as_path()];
    roots.extend(self.dependency_root.as_deref());

    for root in roots {
      for (path, name) in self.collect(root)? {
        if name == ENTRY_POINT_FILE {
          debug!(path = ?path, "skipping source {} in favour of the generated one", ENTRY_POINT_FILE);
          continue;
        }
        if !written.insert(name.clone()) {
          warn!(entry = %name, path = ?path, "duplicate archive entry skipped");
          duplicates.push(name);
          continue;
        }

        let mut source = File::open(&path).map_err(|source| BundleError::ReadSource {
          path: path.clone(),
          source,
        })?;
        zip.start_file(name.as_str(), options).map_err(write_error)?;
        io::copy(&mut source, &mut zip).map_err(|e| write_error(e.into()))?;
        entries.push(name);
      }
    }

    zip.start_file(ENTRY_POINT_FILE, options).map_err(write_error)?;
    zip
      .write_all(self.entry_point.main_py().as_bytes())
      .map_err(|e| write_error(e.into()))?;
    entries.push(ENTRY_POINT_FILE.to_string());

    zip.finish().map_err(write_error)?;
    Ok((entries, duplicates))
  }

  /// Files under `root` that belong in the archive, with their entry names.
  ///
  /// A missing root contributes nothing.
  fn collect(&self, root: &Path) -> Result<Vec<(PathBuf, String)>, BundleError> {
    if !root.exists() {
      debug!(root = ?root, "bundle root does not exist, skipping");
      return Ok(Vec::new());
    }

    let walker = WalkDir::new(root)
      .follow_links(true)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|e| {
        if e.depth() == 0 || !e.file_type().is_dir() {
          return true;
        }
        e.file_name()
          .to_str()
          .map(|name| !self.exclusions.excludes_dir(name))
          .unwrap_or(true)
      });

    let mut files = Vec::new();
    for entry in walker {
      let entry = entry.map_err(|source| BundleError::Walk {
        root: root.to_path_buf(),
        source,
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      let file_name = entry.file_name().to_string_lossy();
      // Legacy installs write `*.egg-info` as a plain file
      if self.exclusions.excludes_file(&file_name) || self.exclusions.excludes_dir(&file_name) {
        continue;
      }

      let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
      let name = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
      files.push((entry.path().to_path_buf(), name));
    }
    Ok(files)
  }
}

/// Bundle `library_root` and `dependency_root` into an executable archive at `output`.
pub fn build(
  library_root: &Path,
  dependency_root: &Path,
  output: &Path,
  entry_point: &str,
) -> Result<BundleReport, BundleError> {
  let entry_point = EntryPoint::parse(entry_point)?;
  BundleManifest::new(library_root, Some(dependency_root), entry_point).write(output)
}
