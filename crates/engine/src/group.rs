//! Composite actors: run a list of child actors sequentially or concurrently.
//!
//! A group is itself an [`Actor`]. Its result is the logical AND of its
//! children's results. Neither mode stops early on a child failure: a
//! sequential group still runs every later child, and a concurrent group
//! never cancels siblings. Only cancellation of the whole run stops a group.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, info, warn};

use deckhand_core::{Error, ErrorKind, Result};

use crate::actor::{Actor, ActorMeta, ActorSpec, BuildContext, ExecContext};

/// How a group schedules its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// One child at a time, in declaration order.
    Sequential,
    /// All children at once, joined before the result is computed.
    Concurrent,
}

impl GroupMode {
    /// Registered type identifier for this mode.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Sequential => "group.Sync",
            Self::Concurrent => "group.Async",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupOptions {
    acts: Vec<ActorSpec>,
}

/// Final state of one child after its group ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    /// Returned `true`.
    Succeeded,
    /// Returned `false`.
    Failed,
    /// Returned an error of the given kind.
    Errored(ErrorKind),
    /// Never started because the run was cancelled first.
    NotStarted,
}

impl ChildOutcome {
    fn from_result(result: &Result<bool>) -> Self {
        match result {
            Ok(true) => Self::Succeeded,
            Ok(false) => Self::Failed,
            Err(e) => Self::Errored(e.kind()),
        }
    }

    /// Check whether the child succeeded.
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }

    fn is_cancelled(self) -> bool {
        matches!(self, Self::Errored(ErrorKind::Cancelled) | Self::NotStarted)
    }
}

/// Per-child outcomes of one group execution, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupReport {
    /// Child description paired with its outcome.
    pub outcomes: Vec<(String, ChildOutcome)>,
}

impl GroupReport {
    /// Logical AND of every child's result.
    #[must_use]
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }

    /// Check whether any child was cancelled or never started.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.is_cancelled())
    }

    /// Descriptions of children that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> Vec<&str> {
        self.filter(|outcome| outcome.is_success())
    }

    /// Descriptions of children that failed or errored.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.filter(|outcome| !outcome.is_success() && !outcome.is_cancelled())
    }

    fn filter(&self, keep: impl Fn(ChildOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| keep(*outcome))
            .map(|(desc, _)| desc.as_str())
            .collect()
    }

    fn log(&self) {
        let succeeded = self.succeeded();
        let failed = self.failed();
        if failed.is_empty() {
            debug!(succeeded = ?succeeded, "All acts succeeded");
        } else {
            warn!(failed = ?failed, succeeded = ?succeeded, "Some acts failed");
        }
    }
}

/// A group of child actors.
pub struct Group {
    meta: ActorMeta,
    mode: GroupMode,
    children: Vec<Box<dyn Actor>>,
}

impl Group {
    /// Build a group from a spec whose `acts` option lists the children.
    ///
    /// Every child is built before this returns; the first child that fails
    /// to build aborts the whole group.
    pub fn build(spec: &ActorSpec, ctx: &BuildContext<'_>, mode: GroupMode) -> Result<Self> {
        let options: GroupOptions = spec.parse_options()?;

        let children = options
            .acts
            .iter()
            .enumerate()
            .map(|(index, act)| {
                ctx.build(act)
                    .map_err(|e| Error::in_child(index + 1, &act.desc, e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(ActorMeta::new(spec, ctx), mode, children))
    }

    /// Assemble a group from already constructed children.
    #[must_use]
    pub fn new(meta: ActorMeta, mode: GroupMode, children: Vec<Box<dyn Actor>>) -> Self {
        Self {
            meta,
            mode,
            children,
        }
    }

    /// Scheduling mode.
    #[must_use]
    pub const fn mode(&self) -> GroupMode {
        self.mode
    }

    /// Constructed children, in declaration order.
    #[must_use]
    pub fn children(&self) -> &[Box<dyn Actor>] {
        &self.children
    }

    /// Run every child and collect the outcomes.
    pub async fn run(&self, ctx: &ExecContext) -> GroupReport {
        match self.mode {
            GroupMode::Sequential => self.run_sequential(ctx).await,
            GroupMode::Concurrent => self.run_concurrent(ctx).await,
        }
    }

    async fn run_sequential(&self, ctx: &ExecContext) -> GroupReport {
        let mut report = GroupReport::default();

        for child in &self.children {
            let desc = child.meta().description.clone();

            if ctx.cancel.is_cancelled() {
                report.outcomes.push((desc, ChildOutcome::NotStarted));
                continue;
            }

            debug!(act = %desc, "Beginning act");
            let result = child.execute(ctx).await;
            let outcome = ChildOutcome::from_result(&result);
            debug!(act = %desc, outcome = ?outcome, "Finished act");

            report.outcomes.push((desc, outcome));
        }

        report
    }

    async fn run_concurrent(&self, ctx: &ExecContext) -> GroupReport {
        let results = join_all(self.children.iter().map(|child| child.execute(ctx))).await;

        let outcomes = self
            .children
            .iter()
            .zip(results.iter())
            .map(|(child, result)| {
                (
                    child.meta().description.clone(),
                    ChildOutcome::from_result(result),
                )
            })
            .collect();

        GroupReport { outcomes }
    }
}

#[async_trait]
impl Actor for Group {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, ctx: &ExecContext) -> Result<bool> {
        info!(acts = self.children.len(), mode = ?self.mode, "Running acts");

        let report = self.run(ctx).await;
        report.log();

        if report.cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(report.success())
    }
}
