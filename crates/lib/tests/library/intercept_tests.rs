use std::fs;
use std::path::PathBuf;

use bdep_lib::environment::{Environment, InstallScheme};
use bdep_lib::install::PipInstaller;
use bdep_lib::intercept::{BuildConfig, InterceptError, Interceptor, OptionsSource, SetupArgs};
use bdep_lib::script::CommandScript;
use serial_test::serial;

use super::common::{TestEnv, is_empty_dir};

fn setup_args(requires: &[&str]) -> SetupArgs {
  SetupArgs {
    build_requires: requires.iter().map(|r| r.to_string()).collect(),
    config: BuildConfig {
      name: Some("demo".into()),
      ..Default::default()
    },
  }
}

#[test]
#[serial]
fn build_script_sees_installed_dependency() {
  let env = TestEnv::new();
  let temp_root = env.temp_root();
  let mut interceptor =
    Interceptor::new(PipInstaller::new(), &env.prefix(), InstallScheme::Target).with_temp_root(&temp_root);
  let mut python_env = Environment::from_search_order(["/site"]).unwrap();
  let script = CommandScript::new(
    vec![
      "/bin/sh".into(),
      "-c".into(),
      "printf '%s' \"$PYTHONPATH\" > pythonpath.txt".into(),
    ],
    env.temp.path(),
  );

  let version = interceptor.wrap(&mut python_env, OptionsSource::Ambient(env.options()), |ctx, config| {
    let dist = ctx.fetch(&"widget==1.0".parse().unwrap())?;
    script.run(ctx.env(), &config)?;
    Ok::<_, Box<dyn std::error::Error + Send + Sync>>(dist.version)
  })(setup_args(&["widget==1.0"]))
  .unwrap();

  assert_eq!(version, "1.0");
  let seen = fs::read_to_string(env.temp.path().join("pythonpath.txt")).unwrap();
  let expected = std::env::join_paths([env.prefix(), PathBuf::from("/site")]).unwrap();
  assert_eq!(seen, expected.to_string_lossy());
  assert!(is_empty_dir(&temp_root));
}

#[test]
#[serial]
fn empty_declaration_leaves_environment_alone() {
  let env = TestEnv::new();
  let mut interceptor =
    Interceptor::new(PipInstaller::new(), &env.prefix(), InstallScheme::Target).with_temp_root(&env.temp_root());
  let mut python_env = Environment::from_search_order(["/site"]).unwrap();

  let config = interceptor.wrap(&mut python_env, OptionsSource::Ambient(env.options()), |ctx, config| {
    assert_eq!(ctx.env().search_order(), &[PathBuf::from("/site")]);
    Ok::<_, InterceptError>(config)
  })(setup_args(&[]))
  .unwrap();

  assert_eq!(config.name.as_deref(), Some("demo"));
  assert!(env.calls().is_empty());
  assert!(!env.prefix().exists());
}

#[test]
#[serial]
fn failing_build_script_still_cleans_up() {
  let env = TestEnv::new();
  let temp_root = env.temp_root();
  let mut interceptor =
    Interceptor::new(PipInstaller::new(), &env.prefix(), InstallScheme::Target).with_temp_root(&temp_root);
  let mut python_env = Environment::new();
  let script = CommandScript::new(vec!["/bin/sh".into(), "-c".into(), "exit 7".into()], env.temp.path());

  let err = interceptor.wrap(&mut python_env, OptionsSource::Ambient(env.options()), |ctx, config| {
    script.run(ctx.env(), &config)
  })(setup_args(&["widget"]))
  .unwrap_err();

  assert!(matches!(err, InterceptError::Script(_)));
  assert!(is_empty_dir(&temp_root));
}

#[test]
#[serial]
fn on_demand_fetches_lazily_through_pip() {
  let env = TestEnv::new();
  let temp_root = env.temp_root();
  let mut interceptor =
    Interceptor::new(PipInstaller::new(), &env.prefix(), InstallScheme::Target).with_temp_root(&temp_root);
  let mut python_env = Environment::new();

  interceptor.wrap_fetch_on_demand(&mut python_env, OptionsSource::Ambient(env.options()), |ctx, _| {
    ctx.fetch(&"gadget==2.0".parse().unwrap())
  })(setup_args(&["gadget==2.0", "widget"]))
  .unwrap();

  let calls: Vec<String> = env.calls().into_iter().map(|(req, _)| req).collect();
  assert_eq!(calls, vec!["gadget==2.0"]);
  assert!(is_empty_dir(&temp_root));
}
