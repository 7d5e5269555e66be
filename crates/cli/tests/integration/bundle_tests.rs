use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;

use predicates::prelude::*;
use serial_test::serial;

use super::common::{TestEnv, archive_names};

#[test]
#[serial]
fn bundle_merges_library_and_dependencies() {
  let env = TestEnv::new();
  env.write_file("lib/app/__init__.py", "");
  env.write_file("lib/app/__main__.py", "def main():\n    pass\n");
  env.write_file("deps/six.py", "");
  env.write_file("deps/six-1.16.0.dist-info/METADATA", "Name: six\n");
  env.write_file("deps/app/__init__.py", "# shadowed\n");
  let output = env.temp.path().join("out/app.pyz");

  env
    .cmd()
    .arg("bundle")
    .arg("--lib-dir")
    .arg(env.temp.path().join("lib"))
    .arg("--deps-dir")
    .arg(env.temp.path().join("deps"))
    .arg("--output")
    .arg(&output)
    .args(["--entry-point", "app.__main__:main"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Wrote"))
    .stderr(predicate::str::contains("Skipped duplicate entry app/__init__.py"));

  assert_eq!(
    archive_names(&output),
    vec!["__main__.py", "app/__init__.py", "app/__main__.py", "six.py"]
  );
  let mode = fs::metadata(&output).unwrap().permissions().mode();
  assert_eq!(mode & 0o111, 0o111);

  let mut archive = zip::ZipArchive::new(fs::File::open(&output).unwrap()).unwrap();
  let mut shadowed = String::new();
  archive
    .by_name("app/__init__.py")
    .unwrap()
    .read_to_string(&mut shadowed)
    .unwrap();
  assert!(shadowed.is_empty());
}

#[test]
#[serial]
fn bundle_without_deps_dir() {
  let env = TestEnv::new();
  env.write_file("lib/tool.py", "def main():\n    pass\n");
  let output = env.temp.path().join("tool.pyz");

  env
    .cmd()
    .arg("bundle")
    .arg("--lib-dir")
    .arg(env.temp.path().join("lib"))
    .arg("--output")
    .arg(&output)
    .args(["--entry-point", "tool"])
    .assert()
    .success();

  assert_eq!(archive_names(&output), vec!["__main__.py", "tool.py"]);
}
