#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # deckhand
//!
//! Run deployment scripts made of composable actors.
//!
//! A script is a tree of actor specs in JSON or YAML. The whole tree is
//! assembled and validated before anything runs; see [`script`] for loading
//! and [`commands`] for the `run` and `validate` flows.

pub mod cli;
pub mod commands;
pub mod script;

pub use deckhand_actors;
pub use deckhand_core;
pub use deckhand_engine;
