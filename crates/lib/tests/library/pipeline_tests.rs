use std::fs;
use std::io::Read;

use bdep_lib::environment::Environment;
use bdep_lib::install::PipInstaller;
use bdep_lib::intercept::{InstallPolicy, OptionsSource};
use bdep_lib::pipeline::{self, Pipeline};
use bdep_lib::project::Project;
use serial_test::serial;

use super::common::{TestEnv, is_empty_dir};

/// A project whose build command copies `src/` into the library root and
/// records the `PYTHONPATH` it was given.
const PYPROJECT: &str = r#"
[project]
name = "demo-app"
version = "0.1.0"
dependencies = ["runtime-lib==3.1"]

[build-system]
requires = ["build-helper==1.0"]

[tool.bdep]
build-command = ["/bin/sh", "-c", "mkdir -p '{lib_dir}' && cp -R src/. '{lib_dir}' && printf '%s' \"$PYTHONPATH\" > pythonpath.txt"]
entry-point = "demo_app.cli:run"
"#;

fn project(env: &TestEnv) -> Project {
  env.write_file("proj/pyproject.toml", PYPROJECT);
  env.write_file("proj/src/demo_app/__init__.py", "");
  env.write_file("proj/src/demo_app/cli.py", "def run():\n    return 0\n");
  env.write_file("proj/src/demo_app/cli.pyc", "stale bytecode");
  Project::load(&env.temp.path().join("proj")).unwrap()
}

fn archive_names(path: &std::path::Path) -> Vec<String> {
  let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  let mut names: Vec<String> = archive.file_names().map(String::from).collect();
  names.sort();
  names
}

#[test]
#[serial]
fn full_build_produces_archive() {
  let env = TestEnv::new();
  let project = project(&env);
  let installer = PipInstaller::new();
  let temp_root = env.temp_root();
  let mut python_env = Environment::new();

  let summary = Pipeline::new(&project, &installer)
    .temp_root(&temp_root)
    .run(&mut python_env, OptionsSource::Ambient(env.options()))
    .unwrap();

  assert_eq!(summary.build_installed, vec!["build-helper"]);
  assert_eq!(summary.runtime_installed, vec!["runtime-lib"]);
  assert_eq!(summary.search_order, vec![project.prefix.clone()]);

  let seen = fs::read_to_string(project.root.join("pythonpath.txt")).unwrap();
  assert_eq!(seen, project.prefix.display().to_string());

  let archive = summary.archive.unwrap();
  assert_eq!(archive.path, project.root.join("build/exe/demo-app.pyz"));
  // runtime-lib only ships metadata, which is never bundled; cli.pyc is bytecode
  assert_eq!(
    archive_names(&archive.path),
    vec!["__main__.py", "demo_app/__init__.py", "demo_app/cli.py"]
  );

  let mut main_py = String::new();
  zip::ZipArchive::new(fs::File::open(&archive.path).unwrap())
    .unwrap()
    .by_name("__main__.py")
    .unwrap()
    .read_to_string(&mut main_py)
    .unwrap();
  assert!(main_py.contains("from demo_app.cli import run"));
  assert!(is_empty_dir(&temp_root));
}

#[test]
#[serial]
fn no_install_policy_uses_prepared_prefix() {
  let env = TestEnv::new();
  let project = project(&env);
  let installer = PipInstaller::new();
  let options = OptionsSource::Ambient(env.options());

  let prepared = pipeline::install_build_deps(&project, &installer, &project.prefix, &options).unwrap();
  assert_eq!(prepared.installed, vec!["build-helper"]);

  let summary = Pipeline::new(&project, &installer)
    .policy(InstallPolicy::NoInstall)
    .temp_root(&env.temp_root())
    .bundle(false)
    .run(&mut Environment::new(), options)
    .unwrap();

  assert!(summary.build_installed.is_empty());
  assert!(summary.archive.is_none());
  let build_calls = env.calls().iter().filter(|(req, _)| req.starts_with("build-helper")).count();
  assert_eq!(build_calls, 1);
}

#[test]
#[serial]
fn on_demand_policy_reports_fetched_dependencies() {
  let env = TestEnv::new();
  let project = project(&env);
  let installer = PipInstaller::new();
  let temp_root = env.temp_root();

  let summary = Pipeline::new(&project, &installer)
    .policy(InstallPolicy::FetchOnDemand)
    .temp_root(&temp_root)
    .bundle(false)
    .run(&mut Environment::new(), OptionsSource::Ambient(env.options()))
    .unwrap();

  assert_eq!(summary.build_installed, vec!["build-helper"]);
  assert_eq!(summary.runtime_installed, vec!["runtime-lib"]);
  assert_eq!(summary.search_order, vec![project.prefix.clone()]);
  assert!(is_empty_dir(&temp_root));
}

#[test]
#[serial]
fn rebuild_refreshes_dependency_root() {
  let env = TestEnv::new();
  let project = project(&env);
  let installer = PipInstaller::new();
  fs::create_dir_all(project.deps_dir.join("leftover")).unwrap();
  fs::write(project.deps_dir.join("leftover/__init__.py"), "").unwrap();

  let summary = Pipeline::new(&project, &installer)
    .temp_root(&env.temp_root())
    .run(&mut Environment::new(), OptionsSource::Ambient(env.options()))
    .unwrap();

  let names = archive_names(&summary.archive.unwrap().path);
  assert!(!names.iter().any(|n| n.starts_with("leftover/")));
}

#[test]
#[serial]
fn augmentation_reports_prefix_entries() {
  let env = TestEnv::new();
  let project = project(&env);
  let aug = pipeline::augmentation(
    &project,
    &PipInstaller::new(),
    &project.prefix,
    &OptionsSource::Ambient(env.options()),
  )
  .unwrap();
  assert_eq!(aug.entries(), &[project.prefix.clone()]);
}
