//! Crate-wide constants.

/// Application name, used to prefix temporary directory names.
pub const APP_NAME: &str = "bdep";

/// Name of the synthesized entry point inside a bundled archive.
pub const ENTRY_POINT_FILE: &str = "__main__.py";

/// Project file read by the build pipeline.
pub const PROJECT_FILE: &str = "pyproject.toml";

/// Environment variable overriding the root for temporary install directories.
pub const TMPDIR_ENV: &str = "BDEP_TMPDIR";

/// Environment variable passed to build scripts with the augmented search order.
pub const SEARCH_PATH_ENV: &str = "PYTHONPATH";

/// Directory suffixes that are never copied into a bundle.
pub const EXCLUDED_DIR_SUFFIXES: &[&str] = &[".egg-info", ".dist-info"];

/// File suffixes (compiled and optimized bytecode caches) that are never copied into a bundle.
pub const EXCLUDED_FILE_SUFFIXES: &[&str] = &[".pyc", ".pyo"];

/// Execute bits for owner, group and other.
pub const EXECUTE_BITS: u32 = 0o111;
