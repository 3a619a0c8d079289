//! Success-or-failure sum type carried by completions.
//!
//! Every completed future resolves to a [`Fallible`]: either a success
//! carrying the produced value, or a failure carrying a type-erased error.
//! The failure side is an `Arc`-erased error so completions stay cheaply
//! clonable when they fan out to multiple handlers.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Type-erased, cheaply clonable failure value.
pub type Failure = Arc<dyn StdError + Send + Sync + 'static>;

/// The outcome of a completed computation: success carrying `T`, or
/// failure carrying an error.
///
/// Combinators pattern-match on this and nothing else. Both variants are
/// always populated; there is no third state.
pub enum Fallible<T> {
    /// The computation produced a value.
    Success(T),
    /// The computation failed.
    Failure(Failure),
}

impl<T> Fallible<T> {
    /// Wraps a concrete error into the failure variant.
    pub fn from_error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Failure(Arc::new(error))
    }

    /// Returns true if this is the success variant.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true if this is the failure variant.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returns a reference to the success value, if any.
    #[must_use]
    pub const fn as_success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Returns a reference to the failure value, if any.
    #[must_use]
    pub const fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Consumes self, returning the success value if any.
    #[must_use]
    pub fn into_success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// Consumes self, returning the failure value if any.
    #[must_use]
    pub fn into_failure(self) -> Option<Failure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    /// Converts into a plain `Result`.
    ///
    /// # Errors
    ///
    /// Returns the carried failure when this is the failure variant.
    pub fn into_result(self) -> Result<T, Failure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(failure) => Err(failure),
        }
    }

    /// Maps the success value, passing failures through unchanged.
    pub fn map_success<U>(self, f: impl FnOnce(T) -> U) -> Fallible<U> {
        match self {
            Self::Success(value) => Fallible::Success(f(value)),
            Self::Failure(failure) => Fallible::Failure(failure),
        }
    }
}

impl<T: Clone> Clone for Fallible<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Success(value) => Self::Success(value.clone()),
            Self::Failure(failure) => Self::Failure(Arc::clone(failure)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Fallible<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(value) => f.debug_tuple("Success").field(value).finish(),
            Self::Failure(failure) => f.debug_tuple("Failure").field(failure).finish(),
        }
    }
}

impl<T> From<Result<T, Failure>> for Fallible<T> {
    fn from(result: Result<T, Failure>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(failure) => Self::Failure(failure),
        }
    }
}
