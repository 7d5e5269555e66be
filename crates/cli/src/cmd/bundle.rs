//! Implementation of the `bdep bundle` command.

use std::path::Path;

use anyhow::{Context, Result};

use bdep_lib::bundle::{BundleManifest, EntryPoint};

use crate::output::{print_stat, print_success, print_warning, truncate_hash};

/// Execute the bundle command.
///
/// Writes `lib_dir` and, when given, `deps_dir` into an executable archive at
/// `output` whose `__main__.py` calls `entry_point`.
pub fn cmd_bundle(lib_dir: &Path, deps_dir: Option<&Path>, output: &Path, entry_point: &str) -> Result<()> {
  let entry_point = EntryPoint::parse(entry_point).context("Invalid entry point")?;
  let report = BundleManifest::new(lib_dir, deps_dir, entry_point)
    .write(output)
    .with_context(|| format!("Failed to bundle {}", output.display()))?;

  print_success(&format!("Wrote {}", report.path.display()));
  print_stat("Entries", &report.entries.len().to_string());
  print_stat("SHA-256", truncate_hash(&report.sha256.0));
  for duplicate in &report.duplicates {
    print_warning(&format!("Skipped duplicate entry {}", duplicate));
  }
  Ok(())
}
