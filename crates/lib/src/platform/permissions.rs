//! File permission helpers.
//!
//! ## Platform Behavior
//!
//! - **Unix**: ORs the execute bits for owner, group and other into the existing mode
//! - **Windows**: No-op; executability is decided by file association

use std::path::Path;

use tracing::debug;

/// Error while changing file permissions.
#[derive(Debug, thiserror::Error)]
pub enum PermissionsError {
  #[error("failed to read metadata for {path}: {source}")]
  Metadata {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to set permissions on {path}: {source}")]
  SetPermissions {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Add execute permission for owner, group and other, keeping every other bit.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<(), PermissionsError> {
  use std::os::unix::fs::PermissionsExt;

  use crate::consts::EXECUTE_BITS;

  let metadata = std::fs::metadata(path).map_err(|e| PermissionsError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let current_mode = metadata.permissions().mode();
  let new_mode = current_mode | EXECUTE_BITS;
  debug!(path = ?path, mode = %format!("{:o}", new_mode), "marking executable");

  let mut perms = metadata.permissions();
  perms.set_mode(new_mode);
  std::fs::set_permissions(path, perms).map_err(|e| PermissionsError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}

/// Add execute permission for owner, group and other, keeping every other bit.
#[cfg(not(unix))]
pub fn make_executable(path: &Path) -> Result<(), PermissionsError> {
  std::fs::metadata(path).map_err(|e| PermissionsError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;
  debug!(path = ?path, "execute bits not applicable on this platform");
  Ok(())
}
