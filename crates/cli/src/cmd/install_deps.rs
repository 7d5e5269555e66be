//! Implementation of the `bdep install-build-deps` command.

use std::path::Path;

use anyhow::{Context, Result};

use bdep_lib::install::PipInstaller;
use bdep_lib::intercept::OptionsSource;
use bdep_lib::options::AmbientInstallOptions;
use bdep_lib::pipeline::install_build_deps;
use bdep_lib::project::Project;

use super::build::absolute;
use crate::output::{print_info, print_names, print_stat, print_success};

/// Execute the install-build-deps command.
///
/// Installs `[build-system] requires` into the build dependency prefix so a
/// later `bdep build --policy no-install` finds them without installing.
pub fn cmd_install_build_deps(project_dir: &Path, prefix: Option<&Path>, options: AmbientInstallOptions) -> Result<()> {
  let project = Project::load(project_dir).context("Failed to load project")?;
  let prefix = match prefix {
    Some(p) => absolute(p)?,
    None => project.prefix.clone(),
  };

  let installed = install_build_deps(&project, &PipInstaller::new(), &prefix, &OptionsSource::Ambient(options))
    .context("Failed to install build dependencies")?;

  if installed.installed.is_empty() {
    print_info("No build dependencies to install");
  } else {
    print_success(&format!("Installed {} build dependencies", installed.installed.len()));
    print_stat("Prefix", &installed.root.display().to_string());
    print_names("Packages", &installed.installed);
  }
  Ok(())
}
