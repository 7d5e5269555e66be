//! The `bdep build` pipeline.
//!
//! Intercept the build command so its build dependencies are importable, run
//! it, install the project's runtime dependencies next to the built library
//! and bundle both into an executable archive.

use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::bundle::{self, BundleError, BundleReport};
use crate::environment::{Environment, InstallScheme, PrefixLayout, SearchPathAugmentation};
use crate::install::{BuildDependencySpec, InstallError, InstallSession, InstalledPrefix, Installer, InstallerError};
use crate::intercept::{InstallPolicy, InterceptError, Interceptor, OptionsSource};
use crate::platform::paths::temp_root;
use crate::project::{Project, SchemeKind};
use crate::requirement::RequirementError;
use crate::script::CommandScript;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Intercept(#[from] InterceptError),

  #[error("failed to install runtime dependencies")]
  RuntimeDependencies(#[source] InstallError),

  #[error("failed to determine the installer's python version")]
  PythonVersion(#[source] InstallerError),

  #[error("invalid runtime dependency: {0}")]
  InvalidRequirement(#[from] RequirementError),

  #[error("failed to clear {path}: {source}")]
  Clear {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Bundle(#[from] BundleError),
}

/// What a pipeline run did.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
  pub policy: InstallPolicy,
  /// Build dependencies installed into the prefix by this run.
  pub build_installed: Vec<String>,
  /// Search order the build command ran with.
  pub search_order: Vec<PathBuf>,
  pub runtime_installed: Vec<String>,
  pub archive: Option<BundleReport>,
}

/// Resolve the project's configured scheme, probing the interpreter for `prefix` installs.
pub fn install_scheme(
  project: &Project,
  installer: &dyn Installer,
  options: &OptionsSource,
) -> Result<InstallScheme, PipelineError> {
  match project.scheme {
    SchemeKind::Target => Ok(InstallScheme::Target),
    SchemeKind::Prefix => {
      let python = installer
        .python_version(&options.options())
        .map_err(PipelineError::PythonVersion)?;
      debug!(python = %python, "queried interpreter version");
      Ok(InstallScheme::Prefix { python })
    }
  }
}

/// Search path entries a build of `project` would get for `prefix`.
pub fn augmentation(
  project: &Project,
  installer: &dyn Installer,
  prefix: &Path,
  options: &OptionsSource,
) -> Result<SearchPathAugmentation, PipelineError> {
  let scheme = install_scheme(project, installer, options)?;
  Ok(SearchPathAugmentation::for_layout(&PrefixLayout::new(prefix, scheme)))
}

/// Install the project's build dependencies into `prefix` without building.
pub fn install_build_deps(
  project: &Project,
  installer: &dyn Installer,
  prefix: &Path,
  options: &OptionsSource,
) -> Result<InstalledPrefix, PipelineError> {
  let scheme = install_scheme(project, installer, options)?;
  let spec = BuildDependencySpec::parse(&project.build_requires)
    .map_err(|e| PipelineError::Intercept(InterceptError::InvalidRequirement(e)))?;
  InstallSession::new(installer, prefix, scheme)
    .install(&spec, &options.options())
    .map_err(|e| PipelineError::Intercept(InterceptError::Install(e)))
}

pub struct Pipeline<'a> {
  project: &'a Project,
  installer: &'a dyn Installer,
  policy: InstallPolicy,
  prefix: PathBuf,
  deps_dir: PathBuf,
  output_dir: PathBuf,
  temp_root: PathBuf,
  bundle: bool,
}

impl<'a> Pipeline<'a> {
  pub fn new(project: &'a Project, installer: &'a dyn Installer) -> Self {
    Self {
      project,
      installer,
      policy: project.policy,
      prefix: project.prefix.clone(),
      deps_dir: project.deps_dir.clone(),
      output_dir: project.output_dir.clone(),
      temp_root: temp_root(),
      bundle: true,
    }
  }

  pub fn policy(mut self, policy: InstallPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn prefix(mut self, prefix: &Path) -> Self {
    self.prefix = prefix.to_path_buf();
    self
  }

  pub fn deps_dir(mut self, deps_dir: &Path) -> Self {
    self.deps_dir = deps_dir.to_path_buf();
    self
  }

  pub fn output_dir(mut self, output_dir: &Path) -> Self {
    self.output_dir = output_dir.to_path_buf();
    self
  }

  pub fn temp_root(mut self, temp_root: &Path) -> Self {
    self.temp_root = temp_root.to_path_buf();
    self
  }

  pub fn bundle(mut self, bundle: bool) -> Self {
    self.bundle = bundle;
    self
  }

  pub fn archive_path(&self) -> PathBuf {
    self.project.archive_path(Some(&self.output_dir))
  }

  /// Run the pipeline against `env`.
  pub fn run(&self, env: &mut Environment, options: OptionsSource) -> Result<BuildSummary, PipelineError> {
    let project = self.project;
    info!(project = %project.name, policy = ?self.policy, "building");

    let scheme = install_scheme(project, self.installer, &options)?;
    let mut interceptor = Interceptor::new(self.installer, &self.prefix, scheme).with_temp_root(&self.temp_root);
    let script = CommandScript::new(project.build_command.clone(), &project.root)
      .placeholder("lib_dir", &project.lib_dir)
      .placeholder("deps_dir", &self.deps_dir)
      .placeholder("prefix", &self.prefix);
    let args = project.setup_args();

    let search_order = match self.policy {
      InstallPolicy::Bulk => interceptor.wrap(env, options.clone(), |ctx, config| {
        script.run(ctx.env(), &config)?;
        Ok::<_, Box<dyn Error + Send + Sync>>(ctx.env().search_order().to_vec())
      })(args)?,
      InstallPolicy::NoInstall => interceptor.wrap_no_install(env, |ctx, config| {
        script.run(ctx.env(), &config)?;
        Ok::<_, Box<dyn Error + Send + Sync>>(ctx.env().search_order().to_vec())
      })(args)?,
      InstallPolicy::FetchOnDemand => {
        let declared = BuildDependencySpec::parse(&args.build_requires).map_err(InterceptError::from)?;
        interceptor.wrap_fetch_on_demand(env, options.clone(), |ctx, config| {
          for requirement in &declared {
            ctx.fetch_applicable(requirement)?;
          }
          script.run(ctx.env(), &config)?;
          Ok::<_, Box<dyn Error + Send + Sync>>(ctx.env().search_order().to_vec())
        })(args)?
      }
    };
    let build_installed = interceptor.installed().to_vec();

    let runtime_installed = self.install_runtime_deps(&options)?;

    let archive = if self.bundle {
      Some(bundle::build(
        &project.lib_dir,
        &self.deps_dir,
        &self.archive_path(),
        &project.entry_point,
      )?)
    } else {
      debug!("bundling disabled");
      None
    };

    Ok(BuildSummary {
      policy: self.policy,
      build_installed,
      search_order,
      runtime_installed,
      archive,
    })
  }

  /// Install `[project] dependencies` into a fresh dependency root.
  fn install_runtime_deps(&self, options: &OptionsSource) -> Result<Vec<String>, PipelineError> {
    let spec = BuildDependencySpec::parse(&self.project.dependencies)?;
    match fs::remove_dir_all(&self.deps_dir) {
      Ok(()) => debug!(path = ?self.deps_dir, "cleared dependency root"),
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(source) => {
        return Err(PipelineError::Clear {
          path: self.deps_dir.clone(),
          source,
        });
      }
    }
    let installed = InstallSession::new(self.installer, &self.deps_dir, InstallScheme::Target)
      .with_temp_root(&self.temp_root)
      .install(&spec, &options.options())
      .map_err(PipelineError::RuntimeDependencies)?;
    Ok(installed.installed)
  }
}
