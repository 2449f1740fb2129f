//! Static registry mapping actor type identifiers to factories.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use deckhand_core::{Error, Result};

use crate::actor::{Actor, ActorSpec, BuildContext};
use crate::group::{Group, GroupMode};

/// Factory that validates a spec and builds the actor it describes.
pub type ActorFactory =
    Arc<dyn Fn(&ActorSpec, &BuildContext<'_>) -> Result<Box<dyn Actor>> + Send + Sync>;

/// Registry of actor factories, populated once at startup.
#[derive(Clone, Default)]
pub struct ActorRegistry {
    factories: BTreeMap<String, ActorFactory>,
}

impl ActorRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that already knows `group.Sync` and `group.Async`.
    #[must_use]
    pub fn with_groups() -> Self {
        let mut registry = Self::new();
        for mode in [GroupMode::Sequential, GroupMode::Concurrent] {
            registry.register(mode.kind(), move |spec, ctx| {
                Group::build(spec, ctx, mode).map(|g| Box::new(g) as Box<dyn Actor>)
            });
        }
        registry
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ActorSpec, &BuildContext<'_>) -> Result<Box<dyn Actor>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Check if a factory exists for the given identifier.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All registered identifiers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Get the number of registered factories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Assemble the actor tree rooted at `spec`.
    ///
    /// Every actor in the tree is constructed, and therefore validated,
    /// before this returns. Nothing executes.
    pub fn build(&self, spec: &ActorSpec, dry_run: bool) -> Result<Box<dyn Actor>> {
        self.build_with(spec, BuildContext::new(self, dry_run))
    }

    /// Build `spec` under an existing context.
    pub fn build_with(&self, spec: &ActorSpec, ctx: BuildContext<'_>) -> Result<Box<dyn Actor>> {
        let factory = self
            .factories
            .get(&spec.actor)
            .ok_or_else(|| Error::unknown_actor(&spec.actor))?;

        debug!(desc = %spec.desc, kind = %spec.actor, dry_run = ctx.dry_run, "Building actor");
        factory(spec, &ctx)
    }
}
