//! Requirement lookups against an [`Environment`].
//!
//! This is the second phase of interception: once the installer has populated
//! a prefix and the environment has been augmented, a [`Resolver`] decides
//! which distribution satisfies each requirement.

use tracing::trace;

use crate::environment::{Environment, Lookup};
use crate::requirement::Requirement;

pub trait Resolver {
  fn resolve(&self, env: &Environment, requirement: &Requirement) -> Lookup;
}

/// Answers lookups from the environment's working set.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkingSetResolver;

impl Resolver for WorkingSetResolver {
  fn resolve(&self, env: &Environment, requirement: &Requirement) -> Lookup {
    let lookup = env.working_set().find(requirement);
    trace!(requirement = %requirement, found = lookup.is_found(), "resolved requirement");
    lookup
  }
}
