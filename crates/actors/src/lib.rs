//! Built-in deckhand actors.
//!
//! - `misc.Note`, `misc.Sleep`
//! - `aws.elb.WaitUntilHealthy`, `aws.elb.RegisterInstance`,
//!   `aws.elb.DeregisterInstance`
//! - `packagecloud.Delete`, `packagecloud.DeleteByDate`,
//!   `packagecloud.WaitForPackage`
//!
//! [`builtin_registry`] returns a registry holding these plus the two group
//! actors from the engine.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod elb;
pub mod misc;
pub mod packagecloud;
pub mod settings;

use std::sync::Arc;

use deckhand_engine::ActorRegistry;

pub use settings::{AwsCredentials, PackagecloudSettings, Settings};

use elb::{LoadBalancerProvider, UnconfiguredLoadBalancers};
use packagecloud::{HttpRepositories, RepositoryProvider};

/// External systems the built-in actors talk to.
#[derive(Clone)]
pub struct Backends {
    pub load_balancers: Arc<dyn LoadBalancerProvider>,
    pub repositories: Arc<dyn RepositoryProvider>,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            load_balancers: Arc::new(UnconfiguredLoadBalancers),
            repositories: Arc::new(HttpRepositories),
        }
    }
}

impl Backends {
    #[must_use]
    pub fn with_load_balancers(mut self, provider: Arc<dyn LoadBalancerProvider>) -> Self {
        self.load_balancers = provider;
        self
    }

    #[must_use]
    pub fn with_repositories(mut self, provider: Arc<dyn RepositoryProvider>) -> Self {
        self.repositories = provider;
        self
    }
}

/// Register every built-in actor.
pub fn register_builtin(registry: &mut ActorRegistry, settings: Settings, backends: &Backends) {
    let settings = Arc::new(settings);
    misc::register(registry);
    elb::register(registry, &settings, &backends.load_balancers);
    packagecloud::register(registry, &settings, &backends.repositories);
}

/// Groups plus every built-in actor.
#[must_use]
pub fn builtin_registry(settings: Settings, backends: &Backends) -> ActorRegistry {
    let mut registry = ActorRegistry::with_groups();
    register_builtin(&mut registry, settings, backends);
    registry
}
