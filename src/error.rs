//! Error types for the completion core.
//!
//! All failures travel through the same [`Fallible`](crate::Fallible)
//! channel as successes; nothing is thrown across executor boundaries.
//! The variants here are the distinguished failures the core itself
//! produces, as opposed to errors supplied by user code:
//!
//! - [`ConcurrencyError::ContextDeallocated`]: a context-scoped,
//!   value-producing registration fired after its owning context was torn
//!   down. Side-effect subscriptions in the same situation are silently
//!   dropped instead.
//! - [`ConcurrencyError::Abandoned`]: a promise was dropped while still
//!   pending, so its dependents can never receive a value.
//! - [`ConcurrencyError::Timeout`]: a deadline elapsed. Synchronous waits
//!   report timeouts as `None` rather than a failure; this variant exists
//!   for callers that need an error value to store or forward.

use crate::fallible::Failure;
use std::sync::Arc;
use thiserror::Error;

/// Distinguished failures produced by the completion core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum ConcurrencyError {
    /// The owning context was deallocated before the handler fired.
    #[error("owning context was deallocated before the handler fired")]
    ContextDeallocated,
    /// The promise was dropped while still pending.
    #[error("promise was dropped while still pending")]
    Abandoned,
    /// A deadline elapsed before completion.
    #[error("timed out waiting for completion")]
    Timeout,
}

impl ConcurrencyError {
    /// Erases this error into a [`Failure`].
    #[must_use]
    pub fn into_failure(self) -> Failure {
        Arc::new(self)
    }
}

/// Returns true if the failure is the given [`ConcurrencyError`].
#[must_use]
pub fn failure_is(failure: &Failure, kind: ConcurrencyError) -> bool {
    failure.downcast_ref::<ConcurrencyError>() == Some(&kind)
}
