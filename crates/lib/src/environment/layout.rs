//! Install schemes and the library directories they produce under a prefix.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::platform::Os;

/// A `major.minor` interpreter version, as used in `lib/pythonX.Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PythonVersion {
  pub major: u32,
  pub minor: u32,
}

impl FromStr for PythonVersion {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut parts = s.trim().split('.');
    let major = parts.next().and_then(|p| p.parse().ok());
    let minor = parts.next().and_then(|p| p.parse().ok());
    match (major, minor) {
      (Some(major), Some(minor)) => Ok(Self { major, minor }),
      _ => Err(format!("invalid python version: {s}")),
    }
  }
}

impl fmt::Display for PythonVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.major, self.minor)
  }
}

/// How the installer lays files out under the private prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum InstallScheme {
  /// Flat install (`--target`): packages land directly in the prefix.
  #[default]
  Target,
  /// Interpreter-style install (`--prefix`): packages land in `site-packages`.
  Prefix { python: PythonVersion },
}

/// Pure and platform library directories under an install prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixLayout {
  pub root: PathBuf,
  pub purelib: PathBuf,
  pub platlib: PathBuf,
}

impl PrefixLayout {
  pub fn new(root: &Path, scheme: InstallScheme) -> Self {
    let os = Os::current().unwrap_or(Os::Linux);
    Self::for_os(root, scheme, os)
  }

  pub fn for_os(root: &Path, scheme: InstallScheme, os: Os) -> Self {
    match scheme {
      InstallScheme::Target => Self {
        root: root.to_path_buf(),
        purelib: root.to_path_buf(),
        platlib: root.to_path_buf(),
      },
      InstallScheme::Prefix { .. } if !os.uses_posix_layout() => {
        let site = root.join("Lib").join("site-packages");
        Self {
          root: root.to_path_buf(),
          purelib: site.clone(),
          platlib: site,
        }
      }
      InstallScheme::Prefix { python } => {
        let python_dir = format!("python{}", python);
        Self {
          root: root.to_path_buf(),
          purelib: root.join("lib").join(&python_dir).join("site-packages"),
          platlib: root.join(platlib_dir()).join(&python_dir).join("site-packages"),
        }
      }
    }
  }
}

/// Directory holding platform-specific libraries (`sys.platlibdir`).
///
/// `lib` unless the distribution patches it, e.g. Fedora's `lib64`.
fn platlib_dir() -> String {
  std::env::var("BDEP_PLATLIBDIR").unwrap_or_else(|_| "lib".to_string())
}
