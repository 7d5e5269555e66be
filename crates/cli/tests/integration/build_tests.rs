use predicates::prelude::*;
use serial_test::serial;

use super::common::{TestEnv, archive_names, is_empty_dir};

#[test]
#[serial]
fn build_writes_archive_and_summary() {
  let env = TestEnv::with_project();
  let project = env.project_path();

  env
    .cmd()
    .arg("build")
    .arg("--project")
    .arg(&project)
    .assert()
    .success()
    .stdout(predicate::str::contains("Built"))
    .stdout(predicate::str::contains("hello-cli.pyz"))
    .stdout(predicate::str::contains("build-helper"))
    .stdout(predicate::str::contains("colorlib"))
    .stderr(predicate::str::contains("Successfully installed build-helper"));

  let archive = project.join("build/exe/hello-cli.pyz");
  assert_eq!(archive_names(&archive), vec!["__main__.py", "hello_cli/__init__.py"]);
  assert!(project.join(".bdep/build-deps/build-helper-1.0.dist-info").is_dir());
  assert!(project.join("build/deps/colorlib-2.0.dist-info").is_dir());
  assert!(is_empty_dir(&env.temp_root()));
}

#[test]
#[serial]
fn build_honours_path_overrides() {
  let env = TestEnv::with_project();
  let out = env.temp.path().join("dist");
  let deps = env.temp.path().join("deps");
  let prefix = env.temp.path().join("build-prefix");

  env
    .cmd()
    .arg("build")
    .arg("--project")
    .arg(env.project_path())
    .arg("--output-dir")
    .arg(&out)
    .arg("--deps-target")
    .arg(&deps)
    .arg("--prefix")
    .arg(&prefix)
    .assert()
    .success();

  assert!(out.join("hello-cli.pyz").is_file());
  assert!(deps.join("colorlib-2.0.dist-info").is_dir());
  assert!(prefix.join("build-helper-1.0.dist-info").is_dir());
}

#[test]
#[serial]
fn build_json_summary() {
  let env = TestEnv::with_project();

  let output = env
    .cmd()
    .args(["-q", "build", "--json", "--no-bundle", "--project"])
    .arg(env.project_path())
    .output()
    .unwrap();

  assert!(output.status.success());
  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["policy"], "bulk");
  assert_eq!(summary["build_installed"], serde_json::json!(["build-helper"]));
  assert_eq!(summary["runtime_installed"], serde_json::json!(["colorlib"]));
  assert!(summary["archive"].is_null());
  assert!(!env.project_path().join("build/exe").exists());
}

#[test]
#[serial]
fn no_install_policy_after_install_build_deps() {
  let env = TestEnv::with_project();

  env
    .cmd()
    .arg("install-build-deps")
    .arg("--project")
    .arg(env.project_path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed 1 build dependencies"));

  env
    .cmd()
    .args(["build", "--policy", "no-install", "--project"])
    .arg(env.project_path())
    .assert()
    .success()
    .stderr(predicate::str::contains("Successfully installed build-helper").not());
}

#[test]
#[serial]
fn failed_build_dependency_exits_nonzero() {
  let env = TestEnv::with_project();
  env.write_file(
    "project/pyproject.toml",
    &super::common::PYPROJECT.replace(r#"requires = ["build-helper"]"#, r#"requires = ["broken>=1"]"#),
  );

  env
    .cmd()
    .arg("build")
    .arg("--project")
    .arg(env.project_path())
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("broken>=1"));

  assert!(!env.project_path().join("build/exe/hello-cli.pyz").exists());
  assert!(is_empty_dir(&env.temp_root()));
}

#[test]
#[serial]
fn paths_reports_prefix_entries() {
  let env = TestEnv::with_project();
  let prefix = env.project_path().join(".bdep/build-deps");

  let output = env
    .cmd()
    .args(["paths", "--json", "--project"])
    .arg(env.project_path())
    .output()
    .unwrap();

  assert!(output.status.success());
  let paths: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(paths["entries"], serde_json::json!([prefix]));
}
