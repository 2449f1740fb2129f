//! Result alias and conversion helpers for foreign errors.

use std::fmt::Display;

use crate::error::Error;

/// The standard Result type for deckhand operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classify a foreign error at the point it crosses into deckhand.
///
/// External calls report failures in their own error types; the call site
/// knows whether the failure is transient, so it picks the kind here.
pub trait ErrorContext<T> {
    /// Treat the failure as a retryable operational error.
    fn operational(self, operation: &str) -> Result<T>;

    /// Treat the failure as unrecoverable.
    fn unrecoverable(self, what: &str) -> Result<T>;
}

impl<T, E: Display> ErrorContext<T> for std::result::Result<T, E> {
    fn operational(self, operation: &str) -> Result<T> {
        self.map_err(|e| Error::operational(operation, e.to_string()))
    }

    fn unrecoverable(self, what: &str) -> Result<T> {
        self.map_err(|e| Error::unrecoverable(format!("{what}: {e}")))
    }
}
