//! Implementation of the `bdep build` command.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use bdep_lib::environment::Environment;
use bdep_lib::install::PipInstaller;
use bdep_lib::intercept::{InstallPolicy, OptionsSource};
use bdep_lib::options::AmbientInstallOptions;
use bdep_lib::pipeline::Pipeline;
use bdep_lib::project::Project;

use crate::output::{
  format_duration, print_info, print_json, print_names, print_stat, print_success, print_warning, truncate_hash,
};

pub struct BuildArgs {
  pub project: PathBuf,
  pub output_dir: Option<PathBuf>,
  pub deps_target: Option<PathBuf>,
  pub prefix: Option<PathBuf>,
  pub policy: Option<InstallPolicy>,
  pub no_bundle: bool,
  pub json: bool,
  pub options: AmbientInstallOptions,
}

/// Execute the build command.
///
/// Loads the project, runs its build command with the build dependencies
/// importable, installs its runtime dependencies and bundles the result.
/// Paths given on the command line override the project's `[tool.bdep]` table.
pub fn cmd_build(args: BuildArgs) -> Result<()> {
  let start = Instant::now();
  let project = Project::load(&args.project).context("Failed to load project")?;
  debug!(project = %project.name, root = ?project.root, "loaded project");
  let installer = PipInstaller::new();

  let mut pipeline = Pipeline::new(&project, &installer).bundle(!args.no_bundle);
  if let Some(policy) = args.policy {
    pipeline = pipeline.policy(policy);
  }
  if let Some(prefix) = &args.prefix {
    pipeline = pipeline.prefix(&absolute(prefix)?);
  }
  if let Some(deps) = &args.deps_target {
    pipeline = pipeline.deps_dir(&absolute(deps)?);
  }
  if let Some(output_dir) = &args.output_dir {
    pipeline = pipeline.output_dir(&absolute(output_dir)?);
  }

  let mut env = Environment::from_process().context("Failed to read PYTHONPATH")?;
  let summary = pipeline
    .run(&mut env, OptionsSource::Ambient(args.options))
    .with_context(|| format!("Build of {} failed", project.name))?;

  if args.json {
    return print_json(&summary);
  }

  println!();
  match &summary.archive {
    Some(archive) => print_success(&format!("Built {}", archive.path.display())),
    None => print_success(&format!("Built {}", project.name)),
  }
  print_stat("Policy", &format!("{:?}", summary.policy));
  print_names("Build dependencies", &summary.build_installed);
  print_names("Runtime dependencies", &summary.runtime_installed);
  if let Some(archive) = &summary.archive {
    print_stat("Entries", &archive.entries.len().to_string());
    print_stat("SHA-256", truncate_hash(&archive.sha256.0));
    for duplicate in &archive.duplicates {
      print_warning(&format!("Skipped duplicate entry {}", duplicate));
    }
  } else {
    print_info("Bundling skipped");
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}

/// Canonical form of `path` when it exists, otherwise its absolute form.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
  dunce::canonicalize(path)
    .or_else(|_| std::path::absolute(path))
    .with_context(|| format!("Failed to resolve {}", path.display()))
}
