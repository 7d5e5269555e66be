//! bdep-lib: build-time dependency interception and executable archive bundling.
//!
//! This crate provides the pieces of the `bdep build` pipeline:
//! - `InstallSession`: isolated installs into a private prefix with scoped cleanup
//! - `Interceptor`: wraps a build entry point so its build dependencies are importable
//! - `Environment`: the module search order and distribution working set a build sees
//! - `BundleManifest`: flattens library and dependency trees into an executable zip
//! - `Pipeline`: the whole build, from intercepted build command to archive

pub mod bundle;
pub mod consts;
pub mod environment;
pub mod install;
pub mod intercept;
pub mod options;
pub mod pipeline;
pub mod platform;
pub mod project;
pub mod requirement;
pub mod resolve;
pub mod script;
pub mod util;
