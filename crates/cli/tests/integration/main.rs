//! End-to-end tests driving the `bdep` binary against a fake interpreter.
#![cfg(unix)]

mod build_tests;
mod bundle_tests;
mod common;
