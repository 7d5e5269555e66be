//! Installer options shared by build-time and run-time installs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Snapshot of the options the primary installer's command line would use.
///
/// Captured once per process and read-only afterwards. Build-time installs
/// receive exactly these values so they select the same indexes, trust the
/// same certificates and apply the same pre-release policy as user installs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbientInstallOptions {
  /// Primary package index.
  pub index_url: Option<String>,
  /// Extra package indexes, in order.
  pub extra_index_urls: Vec<String>,
  /// Mirror indexes, consulted after the extra indexes when `use_mirrors` is set.
  pub mirrors: Vec<String>,
  pub use_mirrors: bool,
  /// Allow pre-release and development versions.
  pub pre: bool,
  pub verbose: u8,
  pub quiet: u8,
  /// Keep temporary build directories.
  pub no_clean: bool,
  /// Download only, do not install.
  pub no_install: bool,
  pub download_dir: Option<PathBuf>,
  /// `Some(true)` forces bytecode compilation, `Some(false)` disables it.
  pub compile: Option<bool>,
  pub force_reinstall: bool,
  /// CA bundle used to verify the index.
  pub cert: Option<PathBuf>,
  /// Client certificate for TLS authentication.
  pub client_cert: Option<PathBuf>,
  pub trusted_hosts: Vec<String>,
  /// Socket timeout in seconds.
  pub timeout: Option<u64>,
  /// Interpreter used to run the installer. Defaults to `python3` (`python` on Windows).
  pub python: Option<PathBuf>,
}

impl AmbientInstallOptions {
  /// Defaults used when no command line has been captured.
  pub fn baseline() -> Self {
    Self::default()
  }

  /// Index URLs in consultation order: primary, extras, then mirrors if enabled.
  pub fn index_urls(&self) -> Vec<&str> {
    let mut urls: Vec<&str> = self.index_url.iter().map(String::as_str).collect();
    urls.extend(self.extra_index_urls.iter().map(String::as_str));
    if self.use_mirrors {
      urls.extend(self.mirrors.iter().map(String::as_str));
    }
    urls
  }

  /// Whether a session's temporary build directory is kept after the install.
  ///
  /// Matches the primary installer's artifact retention: kept only when
  /// `no_clean` is set and the run either installs or downloads to a directory.
  pub fn retains_build_dir(&self) -> bool {
    self.no_clean && (!self.no_install || self.download_dir.is_some())
  }

  /// Interpreter used to run the installer.
  pub fn python(&self) -> PathBuf {
    self.python.clone().unwrap_or_else(|| {
      if cfg!(windows) {
        PathBuf::from("python")
      } else {
        PathBuf::from("python3")
      }
    })
  }
}
