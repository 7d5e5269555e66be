//! Test utilities for bdep-lib.
//!
//! `FakeInstaller` stands in for pip: it records every request and writes a
//! `*.dist-info` directory into the target instead of downloading anything.
//! The shell helpers give cross-platform commands for build script tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::environment::{PrefixLayout, PythonVersion};
use crate::install::{InstallRequest, Installer, InstallerError};
use crate::options::AmbientInstallOptions;
use crate::requirement::{Operator, Requirement};

#[derive(Debug, Default)]
pub struct FakeInstaller {
  calls: RefCell<Vec<InstallRequest>>,
  failing: Option<String>,
  skipping: Option<String>,
  versions: BTreeMap<String, String>,
}

impl FakeInstaller {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fail every request for `name`.
  pub fn failing(mut self, name: &str) -> Self {
    self.failing = Some(name.to_string());
    self
  }

  /// Succeed for `name` without installing anything, as pip does when a
  /// requirement's marker excludes the interpreter.
  pub fn skipping(mut self, name: &str) -> Self {
    self.skipping = Some(name.to_string());
    self
  }

  /// Install `version` of `name` regardless of what was asked for.
  pub fn with_version(mut self, name: &str, version: &str) -> Self {
    self.versions.insert(name.to_string(), version.to_string());
    self
  }

  pub fn calls(&self) -> Vec<InstallRequest> {
    self.calls.borrow().clone()
  }

  fn version_for(&self, requirement: &Requirement) -> String {
    if let Some(version) = self.versions.get(&requirement.name) {
      return version.clone();
    }
    requirement
      .specifiers
      .iter()
      .find(|s| s.operator == Operator::Equal && !s.wildcard)
      .map(|s| s.version.clone())
      .unwrap_or_else(|| "1.0".to_string())
  }
}

impl Installer for FakeInstaller {
  fn install(&self, request: &InstallRequest, _options: &AmbientInstallOptions) -> Result<Vec<String>, InstallerError> {
    self.calls.borrow_mut().push(request.clone());
    let requirement = &request.requirement;
    if self.failing.as_deref() == Some(requirement.name.as_str()) {
      return Err(InstallerError::Failed {
        requirement: requirement.to_string(),
        code: Some(1),
        stderr: format!("No matching distribution found for {}", requirement),
      });
    }

    if self.skipping.as_deref() == Some(requirement.name.as_str()) {
      return Ok(Vec::new());
    }

    let layout = PrefixLayout::new(&request.target, request.scheme);
    write_dist_info(&layout.purelib, &requirement.name, &self.version_for(requirement));
    Ok(vec![requirement.name.clone()])
  }

  fn python_version(&self, _options: &AmbientInstallOptions) -> Result<PythonVersion, InstallerError> {
    Ok(PythonVersion { major: 3, minor: 12 })
  }
}

/// Write `<name>-<version>.dist-info/METADATA` under `dir`.
pub fn write_dist_info(dir: &Path, name: &str, version: &str) {
  let info = dir.join(format!("{}-{}.dist-info", name, version));
  fs::create_dir_all(&info).unwrap();
  fs::write(
    info.join("METADATA"),
    format!("Metadata-Version: 2.1\nName: {}\nVersion: {}\n", name, version),
  )
  .unwrap();
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), script.to_string()]
}

/// Returns a shell script that writes the value of an environment variable to `file`.
#[cfg(unix)]
pub fn dump_env_script(var: &str, file: &str) -> String {
  format!("printf '%s' \"${}\" > {}", var, file)
}

#[cfg(windows)]
pub fn dump_env_script(var: &str, file: &str) -> String {
  format!("echo %{}%> {}", var, file)
}
