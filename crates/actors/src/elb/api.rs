//! Blocking load-balancer API and the providers that hand out clients.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use deckhand_core::{Error, Result};

use crate::settings::AwsKeys;

/// Health state reported for healthy instances.
pub const IN_SERVICE: &str = "InService";

/// Health of one instance behind a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHealth {
    pub instance_id: String,
    /// `InService`, `OutOfService` or `Unknown`.
    pub state: String,
}

impl InstanceHealth {
    pub fn new(instance_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            state: state.into(),
        }
    }

    #[must_use]
    pub fn is_in_service(&self) -> bool {
        self.state == IN_SERVICE
    }
}

/// Client for the load balancers of one region.
///
/// Calls block the calling thread, so callers dispatch them through the
/// engine's blocking pool. A load balancer that does not exist is an
/// unrecoverable error; transport failures are operational. Registration
/// calls are idempotent.
pub trait LoadBalancerApi: Send + Sync {
    /// Check that exactly one load balancer is named `name`.
    fn find(&self, name: &str) -> Result<()>;

    /// Health of every instance registered with `name`.
    fn instance_health(&self, name: &str) -> Result<Vec<InstanceHealth>>;

    fn register_instances(&self, name: &str, instance_ids: &[String]) -> Result<()>;

    fn deregister_instances(&self, name: &str, instance_ids: &[String]) -> Result<()>;
}

/// Opens region-scoped clients.
pub trait LoadBalancerProvider: Send + Sync {
    fn connect(&self, region: &str, keys: &AwsKeys) -> Result<Arc<dyn LoadBalancerApi>>;
}

/// Provider used when no backend was configured; every connect fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredLoadBalancers;

impl LoadBalancerProvider for UnconfiguredLoadBalancers {
    fn connect(&self, region: &str, _keys: &AwsKeys) -> Result<Arc<dyn LoadBalancerApi>> {
        Err(Error::backend_unavailable(
            "load balancer",
            format!("cannot reach region {region}; provide an inventory file"),
        ))
    }
}

/// Regions a load balancer client can be opened in.
pub const KNOWN_REGIONS: &[&str] = &[
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ca-central-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-north-1",
    "eu-south-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "me-south-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// Resolve `name` to exactly one known region.
pub fn lookup_region(name: &str) -> Result<&'static str> {
    let matches: Vec<&'static str> = KNOWN_REGIONS.iter().copied().filter(|r| *r == name).collect();
    match matches.as_slice() {
        [region] => Ok(*region),
        _ => Err(Error::unrecoverable(format!(
            "expected exactly one region named '{name}', found {}",
            matches.len()
        ))),
    }
}
