//! The actor contract and the values threaded through construction and execution.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn, Instrument};

use deckhand_core::{Error, Result};

use crate::cancel::CancelToken;
use crate::pool::BlockingPool;
use crate::registry::ActorRegistry;

/// Declarative description of one actor in a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorSpec {
    /// Human-readable label.
    #[serde(alias = "description")]
    pub desc: String,
    /// Registered type identifier, e.g. `group.Sync`.
    pub actor: String,
    /// Actor-specific options, validated by the actor's factory.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl ActorSpec {
    /// Create a spec with no options.
    pub fn new(desc: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            desc: desc.into(),
            actor: actor.into(),
            options: serde_json::Map::new(),
        }
    }

    /// Add an option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Validate the options by deserializing them into `T`.
    ///
    /// Missing required options, wrongly typed values and unknown keys (when
    /// `T` denies them) all surface as [`Error::InvalidOptions`].
    pub fn parse_options<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(serde_json::Value::Object(self.options.clone()))
            .map_err(|e| Error::invalid_options(&self.desc, e.to_string()))
    }
}

/// Context available while an actor tree is being assembled.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    /// Registry used to resolve nested specs.
    pub registry: &'a ActorRegistry,
    /// Dry-run flag inherited by every actor built under this context.
    pub dry_run: bool,
}

impl<'a> BuildContext<'a> {
    /// Create a build context.
    #[must_use]
    pub const fn new(registry: &'a ActorRegistry, dry_run: bool) -> Self {
        Self { registry, dry_run }
    }

    /// Build a nested spec with the same registry and dry-run flag.
    pub fn build(&self, spec: &ActorSpec) -> Result<Box<dyn Actor>> {
        self.registry.build_with(spec, *self)
    }
}

/// Immutable identity of a constructed actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorMeta {
    /// Human-readable label.
    pub description: String,
    /// Registered type identifier.
    pub kind: String,
    /// Whether external mutations are suppressed.
    pub dry_run: bool,
}

impl ActorMeta {
    /// Derive the identity of the actor described by `spec`.
    #[must_use]
    pub fn new(spec: &ActorSpec, ctx: &BuildContext<'_>) -> Self {
        Self {
            description: spec.desc.clone(),
            kind: spec.actor.clone(),
            dry_run: ctx.dry_run,
        }
    }
}

/// Runtime resources shared by every actor of one run.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    /// Cancellation for the whole tree.
    pub cancel: CancelToken,
    /// Worker pool for blocking calls.
    pub pool: BlockingPool,
}

impl ExecContext {
    /// Create an execution context.
    #[must_use]
    pub const fn new(cancel: CancelToken, pool: BlockingPool) -> Self {
        Self { cancel, pool }
    }
}

/// A unit of orchestration work.
///
/// Implementors provide [`Actor::act`]; callers always go through
/// [`Actor::execute`], which adds the start/finish notices and the
/// cancellation check every actor must honor.
#[async_trait]
pub trait Actor: Send + Sync {
    /// Identity of this actor.
    fn meta(&self) -> &ActorMeta;

    /// Perform the work. When `meta().dry_run` is set, only read-only calls
    /// are allowed and mutations are logged instead of performed.
    async fn act(&self, ctx: &ExecContext) -> Result<bool>;

    /// Execute the actor and report whether it succeeded.
    async fn execute(&self, ctx: &ExecContext) -> Result<bool> {
        let meta = self.meta();
        let span = info_span!(
            "actor",
            desc = %meta.description,
            kind = %meta.kind,
            dry_run = meta.dry_run
        );

        async {
            ctx.cancel.check()?;
            info!("Beginning");

            match self.act(ctx).await {
                Ok(true) => {
                    info!("Finished successfully");
                    Ok(true)
                }
                Ok(false) => {
                    warn!("Finished with failure");
                    Ok(false)
                }
                Err(Error::Cancelled) => {
                    warn!("Cancelled before completion");
                    Err(Error::Cancelled)
                }
                Err(e) => {
                    error!(kind = %e.kind(), error = %e, "Failed");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}
