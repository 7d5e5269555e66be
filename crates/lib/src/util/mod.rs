//! Shared utilities.
//!
//! Filesystem helpers, content hashing and test helpers.

pub mod fs;
pub mod hash;

#[cfg(test)]
pub mod testutil;
