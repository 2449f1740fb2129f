//! Top-level execution of an assembled actor tree.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use deckhand_core::{Error, ErrorKind};

use crate::actor::{Actor, ExecContext};

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Process exit code for this status.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Succeeded => 0,
            Self::Failed => 1,
            Self::Cancelled => 130,
        }
    }
}

/// Summary of one run of an actor tree.
#[derive(Debug)]
pub struct RunReport {
    pub status: RunStatus,
    /// The error that ended the run, if the root raised one.
    pub error: Option<Error>,
    pub elapsed: Duration,
}

impl RunReport {
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

/// Execute `root` and classify the outcome.
pub async fn run_tree(root: &dyn Actor, ctx: &ExecContext) -> RunReport {
    let started = Instant::now();
    let meta = root.meta();
    info!(desc = %meta.description, dry_run = meta.dry_run, "Starting run");

    let result = root.execute(ctx).await;
    let elapsed = started.elapsed();

    let (status, error) = match result {
        Ok(true) => (RunStatus::Succeeded, None),
        Ok(false) => (RunStatus::Failed, None),
        Err(e) if e.kind() == ErrorKind::Cancelled => (RunStatus::Cancelled, Some(e)),
        Err(e) => (RunStatus::Failed, Some(e)),
    };

    match (&status, &error) {
        (RunStatus::Succeeded, _) => info!(elapsed_ms = elapsed.as_millis(), "Run succeeded"),
        (RunStatus::Cancelled, _) => warn!(elapsed_ms = elapsed.as_millis(), "Run cancelled"),
        (RunStatus::Failed, Some(e)) => {
            error!(elapsed_ms = elapsed.as_millis(), kind = %e.kind(), error = %e, "Run failed");
        }
        (RunStatus::Failed, None) => warn!(elapsed_ms = elapsed.as_millis(), "Run failed"),
    }

    RunReport {
        status,
        error,
        elapsed,
    }
}
