//! Installing requirements into a private prefix.
//!
//! The [`Installer`] trait is the only thing the rest of the crate knows about
//! the package installer. [`PipInstaller`] drives `python -m pip`; tests plug
//! in fakes that write metadata directories directly.

mod pip;
pub mod session;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use pip::PipInstaller;
pub use session::{InstallSession, InstalledPrefix};

use crate::environment::{InstallScheme, PythonVersion};
use crate::options::AmbientInstallOptions;
use crate::requirement::{Requirement, RequirementError};

#[derive(Debug, Error)]
pub enum InstallerError {
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("installing {requirement} failed with exit code {code:?}: {stderr}")]
  Failed {
    requirement: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("unexpected installer output: {0}")]
  InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum InstallError {
  #[error("failed to install {requirement}")]
  InstallFailed {
    requirement: String,
    #[source]
    source: InstallerError,
  },

  #[error("failed to create temporary build directory: {0}")]
  WorkDir(#[source] std::io::Error),
}

/// One installer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
  pub requirement: Requirement,
  /// Install prefix.
  pub target: PathBuf,
  /// Scratch space for the installer's downloads and builds.
  pub work_dir: PathBuf,
  pub scheme: InstallScheme,
  /// Install even if the requirement is already satisfied elsewhere.
  pub ignore_installed: bool,
}

pub trait Installer {
  /// Install `request.requirement` and its dependencies into `request.target`.
  ///
  /// Returns the names of the distributions that were installed.
  fn install(&self, request: &InstallRequest, options: &AmbientInstallOptions) -> Result<Vec<String>, InstallerError>;

  /// Version of the interpreter the installer installs for.
  fn python_version(&self, options: &AmbientInstallOptions) -> Result<PythonVersion, InstallerError>;
}

impl<T: Installer + ?Sized> Installer for &T {
  fn install(&self, request: &InstallRequest, options: &AmbientInstallOptions) -> Result<Vec<String>, InstallerError> {
    (**self).install(request, options)
  }

  fn python_version(&self, options: &AmbientInstallOptions) -> Result<PythonVersion, InstallerError> {
    (**self).python_version(options)
  }
}

impl<T: Installer + ?Sized> Installer for Box<T> {
  fn install(&self, request: &InstallRequest, options: &AmbientInstallOptions) -> Result<Vec<String>, InstallerError> {
    (**self).install(request, options)
  }

  fn python_version(&self, options: &AmbientInstallOptions) -> Result<PythonVersion, InstallerError> {
    (**self).python_version(options)
  }
}

/// Ordered requirements a build declares it needs before it can run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildDependencySpec(Vec<Requirement>);

impl BuildDependencySpec {
  pub fn new(requirements: Vec<Requirement>) -> Self {
    Self(requirements)
  }

  pub fn parse<I, S>(requirements: I) -> Result<Self, RequirementError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    requirements
      .into_iter()
      .map(|r| r.as_ref().parse())
      .collect::<Result<Vec<_>, _>>()
      .map(Self)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Requirement> {
    self.0.iter()
  }
}

impl<'a> IntoIterator for &'a BuildDependencySpec {
  type Item = &'a Requirement;
  type IntoIter = std::slice::Iter<'a, Requirement>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}
