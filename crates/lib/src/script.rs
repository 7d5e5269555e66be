//! Running an external build command as the intercepted entry point.
//!
//! The command sees the environment's search order as `PYTHONPATH`, so the
//! build dependencies installed by the interceptor are importable from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::consts::SEARCH_PATH_ENV;
use crate::environment::{Environment, EnvironmentError};
use crate::intercept::BuildConfig;

#[derive(Debug, Error)]
pub enum ScriptError {
  #[error("build command is empty")]
  EmptyCommand,

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("build command '{cmd}' failed with exit code {code:?}")]
  Failed { cmd: String, code: Option<i32> },

  #[error(transparent)]
  Environment(#[from] EnvironmentError),
}

/// An argv-style build command with `{name}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandScript {
  argv: Vec<String>,
  cwd: PathBuf,
  placeholders: BTreeMap<String, String>,
}

impl CommandScript {
  pub fn new(argv: Vec<String>, cwd: &Path) -> Self {
    Self {
      argv,
      cwd: cwd.to_path_buf(),
      placeholders: BTreeMap::new(),
    }
  }

  /// Substitute `{key}` in every argument with `path`.
  pub fn placeholder(mut self, key: &str, path: &Path) -> Self {
    self.placeholders.insert(key.to_string(), path.display().to_string());
    self
  }

  /// The command line after placeholder substitution.
  pub fn argv(&self) -> Vec<String> {
    self
      .argv
      .iter()
      .map(|arg| {
        self
          .placeholders
          .iter()
          .fold(arg.clone(), |acc, (key, value)| acc.replace(&format!("{{{}}}", key), value))
      })
      .collect()
  }

  /// Run the command in its working directory with `env`'s search order exported.
  ///
  /// Project metadata from `config` is exported as `BDEP_PROJECT_NAME`,
  /// `BDEP_PROJECT_VERSION` and `BDEP_DIST_CLASS` when set.
  pub fn run(&self, env: &Environment, config: &BuildConfig) -> Result<(), ScriptError> {
    let argv = self.argv();
    let (program, args) = argv.split_first().ok_or(ScriptError::EmptyCommand)?;
    let python_path = env.python_path()?;
    let cwd = config.package_dir.as_ref().map(|dir| self.cwd.join(dir)).unwrap_or_else(|| self.cwd.clone());

    info!(cmd = %argv.join(" "), "running build command");
    debug!(cwd = ?cwd, python_path = ?python_path, "spawning build command");

    let mut command = Command::new(program);
    command.args(args).current_dir(&cwd).env(SEARCH_PATH_ENV, &python_path);
    let exported = [
      ("BDEP_PROJECT_NAME", &config.name),
      ("BDEP_PROJECT_VERSION", &config.version),
      ("BDEP_DIST_CLASS", &config.dist_class),
    ];
    for (key, value) in exported {
      if let Some(value) = value {
        command.env(key, value);
      }
    }
    for (key, value) in &config.settings {
      command.env(format!("BDEP_SETTING_{}", key.to_uppercase().replace('-', "_")), value);
    }

    let status = command.status().map_err(|source| ScriptError::Spawn {
      program: program.clone(),
      source,
    })?;

    if !status.success() {
      return Err(ScriptError::Failed {
        cmd: argv.join(" "),
        code: status.code(),
      });
    }
    Ok(())
  }
}
