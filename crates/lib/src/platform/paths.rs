//! Application directories.

use crate::consts::TMPDIR_ENV;
use std::path::PathBuf;

/// Returns the directory under which install sessions allocate their working directories.
///
/// `BDEP_TMPDIR` takes precedence over the system temporary directory.
pub fn temp_root() -> PathBuf {
  std::env::var_os(TMPDIR_ENV)
    .map(PathBuf::from)
    .unwrap_or_else(std::env::temp_dir)
}
