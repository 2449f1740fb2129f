//! In-memory load balancers loaded from an inventory document.
//!
//! The inventory maps region to load balancer name to instance health:
//!
//! ```yaml
//! us-west-2:
//!   web-frontend:
//!     - { instance_id: i-0a1b, state: InService }
//!     - { instance_id: i-0c2d, state: OutOfService }
//! ```
//!
//! Registered instances are reported `InService` immediately.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::debug;

use deckhand_core::{Error, Result};

use super::api::{IN_SERVICE, InstanceHealth, LoadBalancerApi, LoadBalancerProvider};
use crate::settings::AwsKeys;

/// Region -> load balancer -> instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    regions: BTreeMap<String, BTreeMap<String, Vec<InstanceHealth>>>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one load balancer.
    #[must_use]
    pub fn with_load_balancer(
        mut self,
        region: impl Into<String>,
        name: impl Into<String>,
        instances: Vec<InstanceHealth>,
    ) -> Self {
        self.regions
            .entry(region.into())
            .or_default()
            .insert(name.into(), instances);
        self
    }

    /// Number of load balancers across all regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared, mutable inventory acting as a load-balancer backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoadBalancers {
    state: Arc<Mutex<Inventory>>,
}

impl InMemoryLoadBalancers {
    #[must_use]
    pub fn new(inventory: Inventory) -> Self {
        Self {
            state: Arc::new(Mutex::new(inventory)),
        }
    }

    /// Current instances of one load balancer.
    #[must_use]
    pub fn instances(&self, region: &str, name: &str) -> Option<Vec<InstanceHealth>> {
        self.state
            .lock()
            .ok()
            .and_then(|inventory| inventory.regions.get(region)?.get(name).cloned())
    }

    /// Change the reported state of one instance.
    pub fn set_state(&self, region: &str, name: &str, instance_id: &str, state: &str) -> Result<()> {
        let mut inventory = lock(&self.state)?;
        let instances = lookup_mut(&mut inventory, region, name)?;
        instances
            .iter_mut()
            .filter(|i| i.instance_id == instance_id)
            .for_each(|i| i.state = state.to_string());
        Ok(())
    }
}

impl LoadBalancerProvider for InMemoryLoadBalancers {
    fn connect(&self, region: &str, _keys: &AwsKeys) -> Result<Arc<dyn LoadBalancerApi>> {
        Ok(Arc::new(RegionClient {
            state: Arc::clone(&self.state),
            region: region.to_string(),
        }))
    }
}

struct RegionClient {
    state: Arc<Mutex<Inventory>>,
    region: String,
}

impl LoadBalancerApi for RegionClient {
    fn find(&self, name: &str) -> Result<()> {
        let mut inventory = lock(&self.state)?;
        lookup_mut(&mut inventory, &self.region, name).map(|_| ())
    }

    fn instance_health(&self, name: &str) -> Result<Vec<InstanceHealth>> {
        let mut inventory = lock(&self.state)?;
        lookup_mut(&mut inventory, &self.region, name).map(|instances| instances.clone())
    }

    fn register_instances(&self, name: &str, instance_ids: &[String]) -> Result<()> {
        let mut inventory = lock(&self.state)?;
        let instances = lookup_mut(&mut inventory, &self.region, name)?;
        for id in instance_ids {
            if !instances.iter().any(|i| &i.instance_id == id) {
                instances.push(InstanceHealth::new(id.clone(), IN_SERVICE));
            }
        }
        debug!(elb = name, count = instances.len(), "Registered instances");
        Ok(())
    }

    fn deregister_instances(&self, name: &str, instance_ids: &[String]) -> Result<()> {
        let mut inventory = lock(&self.state)?;
        let instances = lookup_mut(&mut inventory, &self.region, name)?;
        instances.retain(|i| !instance_ids.contains(&i.instance_id));
        debug!(elb = name, count = instances.len(), "Deregistered instances");
        Ok(())
    }
}

fn lock(state: &Mutex<Inventory>) -> Result<MutexGuard<'_, Inventory>> {
    state
        .lock()
        .map_err(|_| Error::unrecoverable("load balancer inventory is poisoned"))
}

fn lookup_mut<'a>(
    inventory: &'a mut Inventory,
    region: &str,
    name: &str,
) -> Result<&'a mut Vec<InstanceHealth>> {
    inventory
        .regions
        .get_mut(region)
        .and_then(|lbs| lbs.get_mut(name))
        .ok_or_else(|| {
            Error::unrecoverable(format!(
                "expected exactly one load balancer named '{name}' in {region}, found none"
            ))
        })
}
