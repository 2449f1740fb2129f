//! Core error taxonomy for deckhand.
//!
//! All errors are explicit and typed; no panics in library code.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod result;

pub use error::{Error, ErrorKind};
pub use result::{ErrorContext, Result};
