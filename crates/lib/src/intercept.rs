//! Build-time dependency interception.
//!
//! An [`Interceptor`] wraps a build entry point. Before the entry point runs it
//! takes the `build_requires` declaration out of the arguments, installs it
//! into a private prefix, puts that prefix in front of the module search order
//! and checks that every declared requirement now resolves. The entry point
//! itself never sees the declaration.
//!
//! Three policies are available:
//!
//! - [`InstallPolicy::Bulk`] installs everything up front (`wrap`)
//! - [`InstallPolicy::NoInstall`] assumes the prefix was populated out of band (`wrap_no_install`)
//! - [`InstallPolicy::FetchOnDemand`] installs requirements one at a time as
//!   the entry point asks for them (`wrap_fetch_on_demand`)

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::environment::{Distribution, Environment, EnvironmentError, InstallScheme, Lookup, PrefixLayout};
use crate::install::{BuildDependencySpec, InstallError, InstallSession, InstalledPrefix, Installer};
use crate::options::AmbientInstallOptions;
use crate::platform::paths::temp_root;
use crate::requirement::{Requirement, RequirementError};
use crate::resolve::{Resolver, WorkingSetResolver};

#[derive(Debug, Error)]
pub enum InterceptError {
  #[error(transparent)]
  Install(#[from] InstallError),

  #[error("build dependency {requirement} was not found after installation")]
  DistributionNotFound { requirement: String },

  #[error("build dependency {requirement} conflicts with installed {found}")]
  VersionConflict { requirement: String, found: String },

  #[error("invalid build requirement: {0}")]
  InvalidRequirement(#[from] RequirementError),

  #[error("build script failed")]
  Script(#[source] Box<dyn Error + Send + Sync>),

  #[error(transparent)]
  Environment(#[from] EnvironmentError),
}

/// When build dependencies get installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
  /// Install the whole declaration before the entry point runs.
  #[default]
  Bulk,
  /// Never install; the prefix is expected to be populated already.
  NoInstall,
  /// Install each requirement the first time the entry point fetches it.
  #[serde(rename = "on-demand", alias = "fetch-on-demand")]
  FetchOnDemand,
}

/// Where build-time installs take their installer options from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsSource {
  /// Options captured from the primary installer's command line.
  Ambient(AmbientInstallOptions),
  /// No command line was captured; use defaults.
  Baseline,
}

impl OptionsSource {
  pub fn options(&self) -> Cow<'_, AmbientInstallOptions> {
    match self {
      OptionsSource::Ambient(options) => Cow::Borrowed(options),
      OptionsSource::Baseline => Cow::Owned(AmbientInstallOptions::baseline()),
    }
  }
}

/// Build configuration handed to the entry point once `build_requires` has been removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
  pub name: Option<String>,
  pub version: Option<String>,
  /// Distribution class the build script should use, if it cares.
  pub dist_class: Option<String>,
  pub package_dir: Option<PathBuf>,
  pub settings: BTreeMap<String, String>,
}

/// Arguments of a build entry point call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupArgs {
  /// Declared build dependencies; empty when the build declares none.
  #[serde(default)]
  pub build_requires: Vec<String>,
  #[serde(flatten)]
  pub config: BuildConfig,
}

/// Installs single requirements for [`InstallPolicy::FetchOnDemand`].
struct OnDemand<'a> {
  installer: &'a dyn Installer,
  target: &'a Path,
  scheme: InstallScheme,
  temp_root: &'a Path,
  options: AmbientInstallOptions,
  installed: Vec<String>,
}

impl OnDemand<'_> {
  fn install(&mut self, requirement: &Requirement) -> Result<InstalledPrefix, InstallError> {
    info!(requirement = %requirement, "fetching build dependency");
    let spec = BuildDependencySpec::new(vec![requirement.clone()]);
    let prefix = InstallSession::new(self.installer, self.target, self.scheme)
      .with_temp_root(self.temp_root)
      .install(&spec, &self.options)?;
    record_installed(&mut self.installed, &prefix.installed);
    Ok(prefix)
  }
}

fn record_installed(installed: &mut Vec<String>, names: &[String]) {
  for name in names {
    if !installed.contains(name) {
      installed.push(name.clone());
    }
  }
}

/// A marker-bearing requirement that is still missing after an install had
/// its marker evaluate false for the installer's interpreter.
fn excluded_by_marker(requirement: &Requirement, lookup: &Lookup) -> bool {
  requirement.marker.is_some() && matches!(lookup, Lookup::NotFound)
}

/// What the entry point sees of the interceptor while it runs.
pub struct BuildContext<'a> {
  env: &'a mut Environment,
  resolver: &'a dyn Resolver,
  on_demand: Option<OnDemand<'a>>,
}

impl BuildContext<'_> {
  pub fn env(&self) -> &Environment {
    &*self.env
  }

  pub fn env_mut(&mut self) -> &mut Environment {
    &mut *self.env
  }

  /// Resolve `requirement` and register the distribution with the working set.
  ///
  /// Under [`InstallPolicy::FetchOnDemand`] a requirement that is not found is
  /// installed into the prefix and looked up once more. Otherwise a miss is fatal.
  pub fn fetch(&mut self, requirement: &Requirement) -> Result<Distribution, InterceptError> {
    let lookup = self.lookup(requirement)?;
    self.register(requirement, lookup)
  }

  /// Like [`fetch`](Self::fetch), but a requirement whose environment marker
  /// excludes the interpreter yields `None` instead of an error.
  pub fn fetch_applicable(&mut self, requirement: &Requirement) -> Result<Option<Distribution>, InterceptError> {
    let lookup = self.lookup(requirement)?;
    if excluded_by_marker(requirement, &lookup) {
      debug!(requirement = %requirement, "marker excludes this interpreter");
      return Ok(None);
    }
    self.register(requirement, lookup).map(Some)
  }

  fn lookup(&mut self, requirement: &Requirement) -> Result<Lookup, InterceptError> {
    let lookup = self.resolver.resolve(self.env, requirement);
    match (lookup, self.on_demand.as_mut()) {
      (Lookup::NotFound, Some(on_demand)) => {
        let prefix = on_demand.install(requirement)?;
        self.env.augment(&prefix.augmentation())?;
        Ok(self.resolver.resolve(self.env, requirement))
      }
      (lookup, _) => Ok(lookup),
    }
  }

  fn register(&mut self, requirement: &Requirement, lookup: Lookup) -> Result<Distribution, InterceptError> {
    let dist = expect_found(requirement, lookup)?;
    self.env.working_set_mut().add(dist.clone());
    Ok(dist)
  }
}

fn expect_found(requirement: &Requirement, lookup: Lookup) -> Result<Distribution, InterceptError> {
  match lookup {
    Lookup::Found(dist) => Ok(dist),
    Lookup::NotFound => Err(InterceptError::DistributionNotFound {
      requirement: requirement.to_string(),
    }),
    Lookup::Conflict { found, requirement } => Err(InterceptError::VersionConflict {
      requirement: requirement.to_string(),
      found: format!("{} {}", found.name, found.version),
    }),
  }
}

/// Wraps build entry points so their build dependencies are importable when they run.
pub struct Interceptor<I> {
  installer: I,
  target: PathBuf,
  scheme: InstallScheme,
  temp_root: PathBuf,
  resolver: Box<dyn Resolver>,
  prefix: Option<InstalledPrefix>,
  installed: Vec<String>,
}

impl<I: Installer> Interceptor<I> {
  /// Intercept into the private prefix `target`.
  pub fn new(installer: I, target: &Path, scheme: InstallScheme) -> Self {
    Self {
      installer,
      target: target.to_path_buf(),
      scheme,
      temp_root: temp_root(),
      resolver: Box::new(WorkingSetResolver),
      prefix: None,
      installed: Vec::new(),
    }
  }

  pub fn with_temp_root(mut self, temp_root: &Path) -> Self {
    self.temp_root = temp_root.to_path_buf();
    self
  }

  pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
    self.resolver = Box::new(resolver);
    self
  }

  /// Prefix populated by an earlier bulk install, if any.
  pub fn prefix(&self) -> Option<&InstalledPrefix> {
    self.prefix.as_ref()
  }

  /// Names installed into the prefix by this interceptor, in install order,
  /// whether up front or on demand.
  pub fn installed(&self) -> &[String] {
    &self.installed
  }

  pub fn layout(&self) -> PrefixLayout {
    PrefixLayout::new(&self.target, self.scheme)
  }

  /// Install the whole declaration up front, then call `entry`.
  pub fn wrap<F, T, E>(
    &mut self,
    env: &mut Environment,
    options: OptionsSource,
    entry: F,
  ) -> impl FnOnce(SetupArgs) -> Result<T, InterceptError>
  where
    F: FnOnce(&mut BuildContext<'_>, BuildConfig) -> Result<T, E>,
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    move |args| self.intercept(env, InstallPolicy::Bulk, &options, args, entry)
  }

  /// Only make the already populated prefix importable, then call `entry`.
  pub fn wrap_no_install<F, T, E>(
    &mut self,
    env: &mut Environment,
    entry: F,
  ) -> impl FnOnce(SetupArgs) -> Result<T, InterceptError>
  where
    F: FnOnce(&mut BuildContext<'_>, BuildConfig) -> Result<T, E>,
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    move |args| self.intercept(env, InstallPolicy::NoInstall, &OptionsSource::Baseline, args, entry)
  }

  /// Make the prefix importable and install requirements as `entry` fetches them.
  pub fn wrap_fetch_on_demand<F, T, E>(
    &mut self,
    env: &mut Environment,
    options: OptionsSource,
    entry: F,
  ) -> impl FnOnce(SetupArgs) -> Result<T, InterceptError>
  where
    F: FnOnce(&mut BuildContext<'_>, BuildConfig) -> Result<T, E>,
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    move |args| self.intercept(env, InstallPolicy::FetchOnDemand, &options, args, entry)
  }

  /// Run `entry` under `policy`. The `wrap*` methods are thin closures over this.
  pub fn intercept<F, T, E>(
    &mut self,
    env: &mut Environment,
    policy: InstallPolicy,
    options: &OptionsSource,
    args: SetupArgs,
    entry: F,
  ) -> Result<T, InterceptError>
  where
    F: FnOnce(&mut BuildContext<'_>, BuildConfig) -> Result<T, E>,
    E: Into<Box<dyn Error + Send + Sync>>,
  {
    let SetupArgs { build_requires, config } = args;
    let spec = BuildDependencySpec::parse(&build_requires)?;
    let options = options.options().into_owned();
    debug!(policy = ?policy, count = spec.len(), "intercepting build entry point");

    match policy {
      InstallPolicy::Bulk => {
        if !spec.is_empty() {
          let prefix = InstallSession::new(&self.installer, &self.target, self.scheme)
            .with_temp_root(&self.temp_root)
            .install(&spec, &options)?;
          record_installed(&mut self.installed, &prefix.installed);
          self.prefix = Some(prefix);
        }
        if let Some(prefix) = &self.prefix {
          env.augment(&prefix.augmentation())?;
        }
        for requirement in &spec {
          let lookup = self.resolver.resolve(env, requirement);
          if excluded_by_marker(requirement, &lookup) {
            debug!(requirement = %requirement, "marker excludes this interpreter");
            continue;
          }
          let dist = expect_found(requirement, lookup)?;
          debug!(name = %dist.name, version = %dist.version, "registered build dependency");
          env.working_set_mut().add(dist);
        }
      }
      InstallPolicy::NoInstall | InstallPolicy::FetchOnDemand => {
        let prefix = self.prefix.clone().unwrap_or_else(|| InstalledPrefix::empty(self.layout()));
        env.augment(&prefix.augmentation())?;
      }
    }

    let on_demand = (policy == InstallPolicy::FetchOnDemand).then(|| OnDemand {
      installer: &self.installer,
      target: &self.target,
      scheme: self.scheme,
      temp_root: &self.temp_root,
      options,
      installed: Vec::new(),
    });
    let mut ctx = BuildContext {
      env,
      resolver: self.resolver.as_ref(),
      on_demand,
    };
    let result = entry(&mut ctx, config);
    let fetched = ctx.on_demand.map(|o| o.installed).unwrap_or_default();
    record_installed(&mut self.installed, &fetched);
    result.map_err(|e| InterceptError::Script(e.into()))
  }
}
