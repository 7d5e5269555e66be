//! Implementation of the `bdep paths` command.

use std::path::Path;

use anyhow::{Context, Result};

use bdep_lib::install::PipInstaller;
use bdep_lib::intercept::OptionsSource;
use bdep_lib::options::AmbientInstallOptions;
use bdep_lib::pipeline::augmentation;
use bdep_lib::project::Project;

use super::build::absolute;
use crate::output::{print_info, print_json, symbols};

pub fn cmd_paths(project_dir: &Path, prefix: Option<&Path>, json: bool, options: AmbientInstallOptions) -> Result<()> {
  let project = Project::load(project_dir).context("Failed to load project")?;
  let prefix = match prefix {
    Some(p) => absolute(p)?,
    None => project.prefix.clone(),
  };

  let augmentation = augmentation(&project, &PipInstaller::new(), &prefix, &OptionsSource::Ambient(options))
    .context("Failed to compute search path")?;

  if json {
    return print_json(&serde_json::json!({
      "prefix": prefix,
      "entries": augmentation.entries(),
    }));
  }

  print_info(&format!("Search path entries for {}", prefix.display()));
  for entry in augmentation.entries() {
    println!("  {} {}", symbols::ARROW, entry.display());
  }
  Ok(())
}
