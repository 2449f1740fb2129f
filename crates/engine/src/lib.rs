//! Actor execution and composition engine.
//!
//! An orchestration script is a tree of actors. This crate provides:
//!
//! - **The actor contract**: every action implements [`Actor`]; callers go
//!   through [`Actor::execute`], which emits start and finish notices.
//! - **A static registry**: type identifiers map to factories that validate
//!   options and build actors. The whole tree is assembled before anything
//!   runs.
//! - **Groups**: `group.Sync` runs children in order, `group.Async` runs them
//!   concurrently. Both report the logical AND of their children.
//! - **Poll loops**: [`poll_until`] waits for a [`Condition`] to hold.
//! - **Idempotent retries**: [`retry_idempotent`] retries transient failures
//!   with capped exponential backoff.
//! - **Cancellation and dry run**: a [`CancelToken`] reaches every suspension
//!   point, and the dry-run flag set at assembly reaches every descendant.
//!
//! # Example
//!
//! ```ignore
//! use deckhand_engine::{ActorRegistry, ActorSpec, ExecContext, run_tree};
//!
//! let registry = ActorRegistry::with_groups();
//! let spec: ActorSpec = serde_json::from_str(script)?;
//! let root = registry.build(&spec, true)?;
//! let report = run_tree(root.as_ref(), &ExecContext::default()).await;
//! std::process::exit(report.exit_code());
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod actor;
pub mod cancel;
pub mod group;
pub mod poll;
pub mod pool;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod threshold;

pub use actor::{Actor, ActorMeta, ActorSpec, BuildContext, ExecContext};
pub use cancel::CancelToken;
pub use group::{ChildOutcome, Group, GroupMode, GroupReport};
pub use poll::{poll_until, Condition, FnCondition, PollConfig, PollResult};
pub use pool::{BlockingPool, DEFAULT_POOL_SIZE};
pub use registry::{ActorFactory, ActorRegistry};
pub use retry::{retry_idempotent, RetryContext, RetryPolicy};
pub use runner::{run_tree, RunReport, RunStatus};
pub use threshold::Threshold;

pub use deckhand_core::{Error, ErrorContext, ErrorKind, Result};
