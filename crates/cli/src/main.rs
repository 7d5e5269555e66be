mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bdep_lib::intercept::InstallPolicy;
use bdep_lib::options::AmbientInstallOptions;

use crate::output::print_error;

/// bdep - build-time dependency interceptor and archive bundler
#[derive(Parser)]
#[command(name = "bdep")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v debug, -vv trace)
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  /// Decrease log verbosity (-q warn, -qq error)
  #[arg(short, long, global = true, action = clap::ArgAction::Count, conflicts_with = "verbose")]
  quiet: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Install build dependencies, run the build command and bundle the result
  Build {
    /// Project directory containing pyproject.toml
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Directory the archive is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Directory runtime dependencies are installed into
    #[arg(long)]
    deps_target: Option<PathBuf>,

    /// Prefix build dependencies are installed into
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// How build dependencies are made available
    #[arg(long, value_parser = parse_policy)]
    policy: Option<InstallPolicy>,

    /// Stop after installing runtime dependencies
    #[arg(long)]
    no_bundle: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    installer: InstallerArgs,
  },

  /// Pre-populate the build dependency prefix without building
  InstallBuildDeps {
    /// Project directory containing pyproject.toml
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Prefix build dependencies are installed into
    #[arg(long)]
    prefix: Option<PathBuf>,

    #[command(flatten)]
    installer: InstallerArgs,
  },

  /// Bundle a library directory and its dependencies into an executable archive
  Bundle {
    /// Built library directory
    #[arg(long)]
    lib_dir: PathBuf,

    /// Installed runtime dependencies
    #[arg(long)]
    deps_dir: Option<PathBuf>,

    /// Archive to write
    #[arg(long)]
    output: PathBuf,

    /// Entry point as MODULE[:FUNCTION]
    #[arg(long)]
    entry_point: String,
  },

  /// Show the search path entries a build would add for the project's prefix
  Paths {
    /// Project directory containing pyproject.toml
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Prefix build dependencies are installed into
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    installer: InstallerArgs,
  },
}

/// Options forwarded to every pip invocation.
#[derive(Args, Debug, Clone)]
struct InstallerArgs {
  /// Python interpreter that runs pip
  #[arg(long, env = "BDEP_PYTHON")]
  python: Option<PathBuf>,

  /// Primary package index
  #[arg(short = 'i', long, env = "PIP_INDEX_URL")]
  index_url: Option<String>,

  /// Extra package indexes (repeatable)
  #[arg(long = "extra-index-url", env = "PIP_EXTRA_INDEX_URL", value_delimiter = ' ')]
  extra_index_urls: Vec<String>,

  /// Mirror indexes, consulted after the extras when --use-mirrors is given
  #[arg(long = "mirror")]
  mirrors: Vec<String>,

  #[arg(long)]
  use_mirrors: bool,

  /// Include pre-release and development versions
  #[arg(long, env = "PIP_PRE", value_parser = FalseyValueParser::new())]
  pre: bool,

  /// Keep temporary build directories
  #[arg(long, env = "PIP_NO_CLEAN", value_parser = FalseyValueParser::new())]
  no_clean: bool,

  /// Force bytecode compilation
  #[arg(long, conflicts_with = "no_compile")]
  compile: bool,

  /// Disable bytecode compilation
  #[arg(long)]
  no_compile: bool,

  #[arg(long)]
  force_reinstall: bool,

  /// CA bundle used to verify the index
  #[arg(long, env = "PIP_CERT")]
  cert: Option<PathBuf>,

  /// Client certificate for TLS authentication
  #[arg(long)]
  client_cert: Option<PathBuf>,

  /// Hosts trusted without valid HTTPS (repeatable)
  #[arg(long = "trusted-host", env = "PIP_TRUSTED_HOST", value_delimiter = ' ')]
  trusted_hosts: Vec<String>,

  /// Socket timeout in seconds
  #[arg(long, env = "PIP_TIMEOUT")]
  timeout: Option<u64>,
}

impl InstallerArgs {
  fn into_options(self, verbose: u8, quiet: u8) -> AmbientInstallOptions {
    let compile = match (self.compile, self.no_compile) {
      (true, _) => Some(true),
      (_, true) => Some(false),
      _ => None,
    };
    AmbientInstallOptions {
      index_url: self.index_url,
      extra_index_urls: self.extra_index_urls,
      mirrors: self.mirrors,
      use_mirrors: self.use_mirrors,
      pre: self.pre,
      verbose,
      quiet,
      no_clean: self.no_clean,
      compile,
      force_reinstall: self.force_reinstall,
      cert: self.cert,
      client_cert: self.client_cert,
      trusted_hosts: self.trusted_hosts,
      timeout: self.timeout,
      python: self.python,
      ..Default::default()
    }
  }
}

fn parse_policy(value: &str) -> Result<InstallPolicy, String> {
  match value {
    "bulk" => Ok(InstallPolicy::Bulk),
    "no-install" => Ok(InstallPolicy::NoInstall),
    "on-demand" | "fetch-on-demand" => Ok(InstallPolicy::FetchOnDemand),
    other => Err(format!("unknown policy '{}' (expected bulk, no-install or on-demand)", other)),
  }
}

fn init_tracing(verbose: u8, quiet: u8) {
  let level = match (verbose, quiet) {
    (0, 0) => "info",
    (1, _) => "debug",
    (v, _) if v >= 2 => "trace",
    (_, 1) => "warn",
    _ => "error",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose, cli.quiet);

  let (verbose, quiet) = (cli.verbose, cli.quiet);
  let result = match cli.command {
    Commands::Build {
      project,
      output_dir,
      deps_target,
      prefix,
      policy,
      no_bundle,
      json,
      installer,
    } => cmd::cmd_build(cmd::BuildArgs {
      project,
      output_dir,
      deps_target,
      prefix,
      policy,
      no_bundle,
      json,
      options: installer.into_options(verbose, quiet),
    }),
    Commands::InstallBuildDeps {
      project,
      prefix,
      installer,
    } => cmd::cmd_install_build_deps(&project, prefix.as_deref(), installer.into_options(verbose, quiet)),
    Commands::Bundle {
      lib_dir,
      deps_dir,
      output,
      entry_point,
    } => cmd::cmd_bundle(&lib_dir, deps_dir.as_deref(), &output, &entry_point),
    Commands::Paths {
      project,
      prefix,
      json,
      installer,
    } => cmd::cmd_paths(&project, prefix.as_deref(), json, installer.into_options(verbose, quiet)),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      let chain: Vec<String> = e.chain().map(|cause| cause.to_string()).collect();
      print_error(&chain.join(": "));
      ExitCode::FAILURE
    }
  }
}
