//! Shared test helpers for CLI integration tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Fake interpreter: prints `3.12` for `-c` version queries and imitates
/// `-m pip install` by writing a dist-info directory into the target.
/// Requests for `broken` fail.
const FAKE_PYTHON: &str = r#"#!/bin/sh
if [ "$1" = "-c" ]; then
  echo "3.12"
  exit 0
fi
shift 3
target=""
req=""
while [ $# -gt 0 ]; do
  case "$1" in
    --target) target="$2"; shift 2 ;;
    --prefix) target="$2/lib/python3.12/site-packages"; shift 2 ;;
    --index-url|--extra-index-url|--cert|--client-cert|--trusted-host|--timeout) shift 2 ;;
    -*) shift ;;
    *) req="$1"; shift ;;
  esac
done
name=$(printf '%s' "$req" | sed 's/[^A-Za-z0-9_.-].*//')
version=$(printf '%s' "$req" | sed -n 's/.*==\([0-9.]*\).*/\1/p')
[ -n "$version" ] || version="1.0"
if [ "$name" = "broken" ]; then
  echo "ERROR: No matching distribution found for $req" >&2
  exit 1
fi
mkdir -p "$target/$name-$version.dist-info"
printf 'Metadata-Version: 2.1\nName: %s\nVersion: %s\n' "$name" "$version" > "$target/$name-$version.dist-info/METADATA"
echo "Successfully installed $name-$version"
"#;

/// Project whose build command copies `src/` into the library root.
pub const PYPROJECT: &str = r#"
[project]
name = "hello-cli"
version = "0.2.0"
dependencies = ["colorlib==2.0"]

[build-system]
requires = ["build-helper"]

[tool.bdep]
build-command = ["/bin/sh", "-c", "mkdir -p '{lib_dir}' && cp -R src/. '{lib_dir}'"]
entry-point = "hello_cli"
"#;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the fake interpreter,
/// a project and a session temp root.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let python = temp.path().join("bin").join("python");
    fs::create_dir_all(python.parent().unwrap()).unwrap();
    fs::write(&python, FAKE_PYTHON).unwrap();
    fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();
    Self { temp }
  }

  /// A test environment with [`PYPROJECT`] and its sources written under `project/`.
  pub fn with_project() -> Self {
    let env = Self::new();
    env.write_file("project/pyproject.toml", PYPROJECT);
    env.write_file("project/src/hello_cli/__init__.py", "def main():\n    print('hello')\n");
    env.write_file("project/src/hello_cli/__pycache__/x.cpython-312.pyc", "");
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  pub fn project_path(&self) -> PathBuf {
    let p = self.temp.path().join("project");
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// A `bdep` command wired to the fake interpreter and an isolated temp root.
  pub fn cmd(&self) -> Command {
    let tmp = self.temp.path().join("tmp");
    fs::create_dir_all(&tmp).unwrap();
    let mut cmd = cargo_bin_cmd!("bdep");
    cmd
      .env("BDEP_PYTHON", self.temp.path().join("bin").join("python"))
      .env("BDEP_TMPDIR", &tmp)
      .env_remove("PYTHONPATH")
      .env_remove("RUST_LOG");
    cmd
  }

  pub fn temp_root(&self) -> PathBuf {
    self.temp.path().join("tmp")
  }
}

pub fn archive_names(path: &Path) -> Vec<String> {
  let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  let mut names: Vec<String> = archive.file_names().map(String::from).collect();
  names.sort();
  names
}

pub fn is_empty_dir(dir: &Path) -> bool {
  fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}
