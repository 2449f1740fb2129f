//! Error taxonomy shared by every deckhand crate.
//!
//! Errors fall into four kinds (see [`ErrorKind`]). Only operational errors
//! may be retried; every other kind ends the action that raised it.

use std::fmt;

use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised while assembling the actor tree. Always fatal.
    Configuration,
    /// Raised by an external call during execution. Retryable.
    Operational,
    /// A condition that retrying cannot fix. Always fatal.
    Unrecoverable,
    /// Execution was cancelled from outside.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::Operational => "operational",
            Self::Unrecoverable => "unrecoverable",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Core error type for deckhand operations.
#[derive(Debug, Error)]
pub enum Error {
    // Construction-time errors
    #[error("invalid options for '{actor}': {reason}")]
    InvalidOptions { actor: String, reason: String },

    #[error("unknown actor type '{name}'")]
    UnknownActor { name: String },

    #[error("missing credentials for {service}: the {variable} environment variable is not set")]
    MissingCredentials { service: String, variable: String },

    #[error("failed to load script '{path}': {reason}")]
    ScriptLoad { path: String, reason: String },

    #[error("no {service} backend configured: {reason}")]
    BackendUnavailable { service: String, reason: String },

    // Execution-time errors
    #[error("{operation} failed: {reason}")]
    Operational { operation: String, reason: String },

    #[error("unrecoverable failure: {reason}")]
    Unrecoverable { reason: String },

    #[error("execution cancelled")]
    Cancelled,

    /// Wraps an error raised by a child of a group, keeping the child's kind.
    #[error("act #{position} '{description}': {source}")]
    Child {
        position: usize,
        description: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an invalid options error.
    pub fn invalid_options(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            actor: actor.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown actor error.
    pub fn unknown_actor(name: impl Into<String>) -> Self {
        Self::UnknownActor { name: name.into() }
    }

    /// Create a missing credentials error.
    pub fn missing_credentials(service: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::MissingCredentials {
            service: service.into(),
            variable: variable.into(),
        }
    }

    /// Create a script load error.
    pub fn script_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ScriptLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a backend unavailable error.
    pub fn backend_unavailable(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create an operational error.
    pub fn operational(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Operational {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an unrecoverable error.
    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        Self::Unrecoverable {
            reason: reason.into(),
        }
    }

    /// Wrap an error raised by the child at `position` of a group.
    pub fn in_child(position: usize, description: impl Into<String>, source: Self) -> Self {
        Self::Child {
            position,
            description: description.into(),
            source: Box::new(source),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOptions { .. }
            | Self::UnknownActor { .. }
            | Self::MissingCredentials { .. }
            | Self::ScriptLoad { .. }
            | Self::BackendUnavailable { .. } => ErrorKind::Configuration,
            Self::Operational { .. } => ErrorKind::Operational,
            Self::Unrecoverable { .. } => ErrorKind::Unrecoverable,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Child { source, .. } => source.kind(),
        }
    }

    /// Only operational errors may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Operational
    }

    /// Configuration and unrecoverable errors end execution outright.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Unrecoverable
        )
    }

    /// Check if this error is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::operational("register instances", "connection reset");
        assert!(err.to_string().contains("register instances"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::invalid_options("a", "b").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::unknown_actor("x").kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::missing_credentials("packagecloud", "PACKAGECLOUD_TOKEN").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::backend_unavailable("load balancer", "no inventory").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::unrecoverable("gone").kind(), ErrorKind::Unrecoverable);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::operational("list", "timeout").is_retryable());
        assert!(!Error::unrecoverable("no such elb").is_retryable());
        assert!(!Error::invalid_options("a", "b").is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::unrecoverable("gone").is_fatal());
        assert!(Error::unknown_actor("x").is_fatal());
        assert!(!Error::operational("list", "timeout").is_fatal());
        assert!(!Error::Cancelled.is_fatal());
    }

    #[test]
    fn test_child_keeps_source_kind() {
        let inner = Error::invalid_options("pkg cleanup", "missing field `repo`");
        let err = Error::in_child(3, "pkg cleanup", inner);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().starts_with("act #3 'pkg cleanup'"));

        let nested = Error::in_child(1, "outer", Error::in_child(2, "inner", Error::Cancelled));
        assert!(nested.is_cancelled());
    }
}
