//! Isolated installs with a temporary working directory that never outlives them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info};

use super::{BuildDependencySpec, InstallError, InstallRequest, Installer};
use crate::consts::APP_NAME;
use crate::environment::{InstallScheme, PrefixLayout, SearchPathAugmentation};
use crate::options::AmbientInstallOptions;
use crate::platform::paths::temp_root;

/// A prefix populated by an [`InstallSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPrefix {
  pub root: PathBuf,
  pub layout: PrefixLayout,
  /// Distribution names installed by the session, in install order.
  pub installed: Vec<String>,
}

impl InstalledPrefix {
  /// A prefix nothing was installed into.
  pub fn empty(layout: PrefixLayout) -> Self {
    Self {
      root: layout.root.clone(),
      layout,
      installed: Vec::new(),
    }
  }

  pub fn augmentation(&self) -> SearchPathAugmentation {
    SearchPathAugmentation::for_layout(&self.layout)
  }
}

/// Installs a requirement list into one prefix.
///
/// Each call to [`install`](Self::install) allocates its own working directory
/// and releases it before returning, on success and on failure.
pub struct InstallSession<'a> {
  installer: &'a dyn Installer,
  target: PathBuf,
  scheme: InstallScheme,
  temp_root: PathBuf,
}

impl<'a> InstallSession<'a> {
  pub fn new(installer: &'a dyn Installer, target: &Path, scheme: InstallScheme) -> Self {
    Self {
      installer,
      target: target.to_path_buf(),
      scheme,
      temp_root: temp_root(),
    }
  }

  /// Allocate working directories under `temp_root` instead of the default.
  pub fn with_temp_root(mut self, temp_root: &Path) -> Self {
    self.temp_root = temp_root.to_path_buf();
    self
  }

  pub fn target(&self) -> &Path {
    &self.target
  }

  pub fn layout(&self) -> PrefixLayout {
    PrefixLayout::new(&self.target, self.scheme)
  }

  pub fn install(
    &self,
    requirements: &BuildDependencySpec,
    options: &AmbientInstallOptions,
  ) -> Result<InstalledPrefix, InstallError> {
    let layout = self.layout();
    if requirements.is_empty() {
      debug!(target = ?self.target, "no requirements to install");
      return Ok(InstalledPrefix::empty(layout));
    }

    fs::create_dir_all(&self.temp_root).map_err(InstallError::WorkDir)?;
    let work_dir = tempfile::Builder::new()
      .prefix(&format!("{}-build-", APP_NAME))
      .tempdir_in(&self.temp_root)
      .map_err(InstallError::WorkDir)?;
    debug!(work_dir = ?work_dir.path(), count = requirements.len(), "allocated build directory");

    let mut installed = Vec::new();
    let result = self.install_each(requirements, work_dir.path(), options, &mut installed);
    release(work_dir, options);
    result?;

    if !installed.is_empty() {
      info!("Successfully installed {}", installed.join(" "));
    }

    Ok(InstalledPrefix {
      root: self.target.clone(),
      layout,
      installed,
    })
  }

  fn install_each(
    &self,
    requirements: &BuildDependencySpec,
    work_dir: &Path,
    options: &AmbientInstallOptions,
    installed: &mut Vec<String>,
  ) -> Result<(), InstallError> {
    for requirement in requirements {
      let request = InstallRequest {
        requirement: requirement.clone(),
        target: self.target.clone(),
        work_dir: work_dir.to_path_buf(),
        scheme: self.scheme,
        ignore_installed: true,
      };
      let names = self
        .installer
        .install(&request, options)
        .map_err(|source| InstallError::InstallFailed {
          requirement: requirement.to_string(),
          source,
        })?;
      for name in names {
        if !installed.contains(&name) {
          installed.push(name);
        }
      }
    }
    Ok(())
  }
}

/// Remove the working directory unless the options ask for build directories to be kept.
fn release(work_dir: TempDir, options: &AmbientInstallOptions) {
  if options.retains_build_dir() {
    let kept = work_dir.keep();
    info!(path = ?kept, "keeping build directory");
    return;
  }
  let path = work_dir.path().to_path_buf();
  if let Err(e) = work_dir.close() {
    debug!(path = ?path, error = %e, "failed to remove build directory");
  }
}
