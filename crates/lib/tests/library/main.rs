//! Library integration tests.
//!
//! Drives the real `PipInstaller` against a fake interpreter script that
//! imitates `python -m pip install`, so no network or Python is needed.

#![cfg(unix)]

mod common;
mod intercept_tests;
mod pipeline_tests;
