//! `pyproject.toml` loading.
//!
//! Reads the `[project]` and `[build-system]` tables and the `[tool.bdep]`
//! table, filling in defaults for everything the project leaves unset. All
//! paths in the result are absolute, anchored at the project directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::PROJECT_FILE;
use crate::intercept::{BuildConfig, InstallPolicy, SetupArgs};

#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },

  #[error("{path} is missing {field}")]
  Missing { path: PathBuf, field: &'static str },
}

/// Which install scheme build dependencies use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeKind {
  #[default]
  Target,
  Prefix,
}

#[derive(Debug, Deserialize)]
struct PyProject {
  project: Option<ProjectTable>,
  #[serde(rename = "build-system")]
  build_system: Option<BuildSystemTable>,
  #[serde(default)]
  tool: ToolTable,
}

#[derive(Debug, Deserialize)]
struct ProjectTable {
  name: Option<String>,
  version: Option<String>,
  #[serde(default)]
  dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BuildSystemTable {
  #[serde(default)]
  requires: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
  #[serde(default)]
  bdep: BdepTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct BdepTable {
  build_command: Option<Vec<String>>,
  entry_point: Option<String>,
  lib_dir: Option<PathBuf>,
  deps_dir: Option<PathBuf>,
  output_dir: Option<PathBuf>,
  archive_name: Option<String>,
  prefix: Option<PathBuf>,
  policy: Option<InstallPolicy>,
  scheme: Option<SchemeKind>,
  dist_class: Option<String>,
  package_dir: Option<PathBuf>,
  #[serde(default)]
  settings: BTreeMap<String, String>,
}

/// A loaded project with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
  pub root: PathBuf,
  pub name: String,
  pub version: Option<String>,
  /// Runtime dependencies bundled next to the library.
  pub dependencies: Vec<String>,
  /// Build-time dependencies.
  pub build_requires: Vec<String>,
  pub build_command: Vec<String>,
  pub entry_point: String,
  pub lib_dir: PathBuf,
  pub deps_dir: PathBuf,
  pub output_dir: PathBuf,
  pub archive_name: String,
  pub prefix: PathBuf,
  pub policy: InstallPolicy,
  pub scheme: SchemeKind,
  pub dist_class: Option<String>,
  pub package_dir: Option<PathBuf>,
  pub settings: BTreeMap<String, String>,
}

impl Project {
  /// Load `pyproject.toml` from `dir`.
  pub fn load(dir: &Path) -> Result<Self, ProjectError> {
    let root = dunce::canonicalize(dir).map_err(|source| ProjectError::Read {
      path: dir.to_path_buf(),
      source,
    })?;
    let path = root.join(PROJECT_FILE);
    let content = fs::read_to_string(&path).map_err(|source| ProjectError::Read {
      path: path.clone(),
      source,
    })?;
    debug!(path = ?path, "loading project");
    Self::parse(&root, &path, &content)
  }

  fn parse(root: &Path, path: &Path, content: &str) -> Result<Self, ProjectError> {
    let raw: PyProject = toml::from_str(content).map_err(|source| ProjectError::Parse {
      path: path.to_path_buf(),
      source: Box::new(source),
    })?;

    let project = raw.project.ok_or_else(|| ProjectError::Missing {
      path: path.to_path_buf(),
      field: "[project]",
    })?;
    let name = project.name.ok_or_else(|| ProjectError::Missing {
      path: path.to_path_buf(),
      field: "project.name",
    })?;

    let tool = raw.tool.bdep;
    let build_command = tool.build_command.unwrap_or_else(|| {
      ["python", "setup.py", "build", "--build-lib", "{lib_dir}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
    });
    let module = name.replace('-', "_");

    Ok(Self {
      root: root.to_path_buf(),
      version: project.version,
      dependencies: project.dependencies,
      build_requires: raw.build_system.map(|b| b.requires).unwrap_or_default(),
      build_command,
      entry_point: tool.entry_point.unwrap_or_else(|| format!("{}.__main__:main", module)),
      lib_dir: root.join(tool.lib_dir.unwrap_or_else(|| PathBuf::from("build/lib"))),
      deps_dir: root.join(tool.deps_dir.unwrap_or_else(|| PathBuf::from("build/deps"))),
      output_dir: root.join(tool.output_dir.unwrap_or_else(|| PathBuf::from("build/exe"))),
      archive_name: tool.archive_name.unwrap_or_else(|| format!("{}.pyz", name)),
      prefix: root.join(tool.prefix.unwrap_or_else(|| PathBuf::from(".bdep/build-deps"))),
      policy: tool.policy.unwrap_or_default(),
      scheme: tool.scheme.unwrap_or_default(),
      dist_class: tool.dist_class,
      package_dir: tool.package_dir,
      settings: tool.settings,
      name,
    })
  }

  /// Path of the bundled archive, optionally under a different output directory.
  pub fn archive_path(&self, output_dir: Option<&Path>) -> PathBuf {
    output_dir.unwrap_or(&self.output_dir).join(&self.archive_name)
  }

  /// Entry point arguments for the intercepted build.
  pub fn setup_args(&self) -> SetupArgs {
    SetupArgs {
      build_requires: self.build_requires.clone(),
      config: BuildConfig {
        name: Some(self.name.clone()),
        version: self.version.clone(),
        dist_class: self.dist_class.clone(),
        package_dir: self.package_dir.clone(),
        settings: self.settings.clone(),
      },
    }
  }
}
