//! `python -m pip` as the package installer.

use std::ffi::OsString;
use std::process::Command;

use tracing::{debug, info};

use super::{InstallRequest, Installer, InstallerError};
use crate::environment::{InstallScheme, PythonVersion};
use crate::options::AmbientInstallOptions;
use crate::requirement::normalize_name;

const INSTALLED_PREFIX: &str = "Successfully installed ";

const VERSION_QUERY: &str = "import sys; print('%d.%d' % sys.version_info[:2])";

/// Runs pip from the interpreter named by [`AmbientInstallOptions::python`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PipInstaller;

impl PipInstaller {
  pub fn new() -> Self {
    Self
  }
}

impl Installer for PipInstaller {
  fn install(&self, request: &InstallRequest, options: &AmbientInstallOptions) -> Result<Vec<String>, InstallerError> {
    let python = options.python();
    let args = install_args(request, options);
    info!(requirement = %request.requirement, target = ?request.target, "running pip install");
    debug!(python = ?python, args = ?args, "spawning installer");

    let mut command = Command::new(&python);
    command
      .args(&args)
      .env("TMPDIR", &request.work_dir)
      .env("TMP", &request.work_dir)
      .env("TEMP", &request.work_dir)
      .env("PIP_DISABLE_PIP_VERSION_CHECK", "1");

    let output = command.output().map_err(|source| InstallerError::Spawn {
      program: python.display().to_string(),
      source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "pip stdout");
    }
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "pip stderr");
    }

    if !output.status.success() {
      return Err(InstallerError::Failed {
        requirement: request.requirement.to_string(),
        code: output.status.code(),
        stderr: stderr.trim().to_string(),
      });
    }

    let installed = parse_installed(&stdout);
    if installed.is_empty() {
      // Quiet runs print no summary; the requested name is all we know
      return Ok(vec![request.requirement.name.clone()]);
    }
    Ok(installed)
  }

  fn python_version(&self, options: &AmbientInstallOptions) -> Result<PythonVersion, InstallerError> {
    let python = options.python();
    let output = Command::new(&python)
      .args(["-c", VERSION_QUERY])
      .output()
      .map_err(|source| InstallerError::Spawn {
        program: python.display().to_string(),
        source,
      })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
      return Err(InstallerError::InvalidOutput(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }
    stdout.trim().parse().map_err(InstallerError::InvalidOutput)
  }
}

/// Arguments after the interpreter for one `pip install` run.
pub(crate) fn install_args(request: &InstallRequest, options: &AmbientInstallOptions) -> Vec<OsString> {
  let mut args: Vec<OsString> = vec!["-m".into(), "pip".into(), "install".into()];

  match request.scheme {
    InstallScheme::Target => args.push("--target".into()),
    InstallScheme::Prefix { .. } => args.push("--prefix".into()),
  }
  args.push(request.target.clone().into());

  if request.ignore_installed {
    args.push("--ignore-installed".into());
  }

  let mut urls = options.index_urls().into_iter();
  if let Some(primary) = options.index_url.as_deref() {
    urls.next();
    args.push("--index-url".into());
    args.push(primary.into());
  }
  for url in urls {
    args.push("--extra-index-url".into());
    args.push(url.into());
  }

  if options.pre {
    args.push("--pre".into());
  }
  if options.force_reinstall {
    args.push("--force-reinstall".into());
  }
  if options.no_clean {
    args.push("--no-clean".into());
  }
  match options.compile {
    Some(true) => args.push("--compile".into()),
    Some(false) => args.push("--no-compile".into()),
    None => {}
  }
  for _ in 0..options.verbose {
    args.push("-v".into());
  }
  for _ in 0..options.quiet {
    args.push("-q".into());
  }
  if let Some(cert) = &options.cert {
    args.push("--cert".into());
    args.push(cert.clone().into());
  }
  if let Some(client_cert) = &options.client_cert {
    args.push("--client-cert".into());
    args.push(client_cert.clone().into());
  }
  for host in &options.trusted_hosts {
    args.push("--trusted-host".into());
    args.push(host.into());
  }
  if let Some(timeout) = options.timeout {
    args.push("--timeout".into());
    args.push(timeout.to_string().into());
  }

  args.push(request.requirement.to_string().into());
  args
}

/// Names from pip's `Successfully installed a-1.0 b-2.0` line.
fn parse_installed(stdout: &str) -> Vec<String> {
  stdout
    .lines()
    .filter_map(|line| line.trim().strip_prefix(INSTALLED_PREFIX))
    .flat_map(str::split_whitespace)
    .map(|item| match item.rsplit_once('-') {
      Some((name, _version)) => name.to_string(),
      None => item.to_string(),
    })
    .map(|name| normalize_name(&name))
    .collect()
}
