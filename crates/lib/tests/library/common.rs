//! Shared helpers for library integration tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use bdep_lib::options::AmbientInstallOptions;
use tempfile::TempDir;

/// Stand-in for `python`: answers the version query and imitates
/// `-m pip install --target|--prefix DIR ... REQ` by writing a dist-info
/// directory. Requests for `broken` fail. Every install appends
/// `<requirement> <TMPDIR>` to `calls.log` next to the script.
const FAKE_PYTHON: &str = r#"#!/bin/sh
log="$(dirname "$0")/calls.log"
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
echo "$req $TMPDIR" >> "$log"
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

/// Isolated test environment with a fake interpreter, a prefix and a temp root.
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

  pub fn python(&self) -> PathBuf {
    self.temp.path().join("bin").join("python")
  }

  /// Installer options pointing at the fake interpreter.
  pub fn options(&self) -> AmbientInstallOptions {
    AmbientInstallOptions {
      python: Some(self.python()),
      ..Default::default()
    }
  }

  pub fn prefix(&self) -> PathBuf {
    self.temp.path().join("prefix")
  }

  pub fn temp_root(&self) -> PathBuf {
    let p = self.temp.path().join("tmp");
    fs::create_dir_all(&p).unwrap();
    p
  }

  /// `(requirement, TMPDIR)` pairs seen by the fake interpreter.
  pub fn calls(&self) -> Vec<(String, PathBuf)> {
    fs::read_to_string(self.temp.path().join("bin").join("calls.log"))
      .unwrap_or_default()
      .lines()
      .filter_map(|line| line.split_once(' '))
      .map(|(req, tmp)| (req.to_string(), PathBuf::from(tmp)))
      .collect()
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
  }
}

pub fn is_empty_dir(dir: &Path) -> bool {
  fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}
