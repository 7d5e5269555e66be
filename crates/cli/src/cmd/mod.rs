mod build;
mod bundle;
mod install_deps;
mod paths;

pub use build::{BuildArgs, cmd_build};
pub use bundle::cmd_bundle;
pub use install_deps::cmd_install_build_deps;
pub use paths::cmd_paths;
