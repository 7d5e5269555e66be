//! Filesystem helpers.

use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

/// Create `path` and its parents.
///
/// A directory that already exists is reported with a warning and accepted.
/// Any other failure is returned unchanged.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
  match fs::create_dir(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {
      warn!(path = ?path, "directory already exists");
      Ok(())
    }
    Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(path),
    Err(e) => Err(e),
  }
}
