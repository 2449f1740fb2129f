//! Load balancer actors: wait for healthy instances, register and
//! deregister instances.
//!
//! Every actor validates its region and credentials when it is built and
//! opens its own client. Client calls block, so they always run on the
//! engine's blocking pool.

mod api;
mod inventory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use deckhand_core::{Error, Result};
use deckhand_engine::{
    Actor, ActorMeta, ActorRegistry, ActorSpec, BuildContext, ExecContext, FnCondition,
    PollConfig, RetryPolicy, Threshold, poll_until, retry_idempotent,
};

pub use api::{
    IN_SERVICE, InstanceHealth, KNOWN_REGIONS, LoadBalancerApi, LoadBalancerProvider,
    UnconfiguredLoadBalancers, lookup_region,
};
pub use inventory::{InMemoryLoadBalancers, Inventory};

use crate::settings::Settings;

pub const WAIT_UNTIL_HEALTHY: &str = "aws.elb.WaitUntilHealthy";
pub const REGISTER_INSTANCE: &str = "aws.elb.RegisterInstance";
pub const DEREGISTER_INSTANCE: &str = "aws.elb.DeregisterInstance";

fn connect(
    region: &str,
    settings: &Settings,
    provider: &dyn LoadBalancerProvider,
) -> Result<Arc<dyn LoadBalancerApi>> {
    let region = lookup_region(region)?;
    let keys = settings.aws.require()?;
    provider.connect(region, &keys)
}

/// Run one client call on the blocking pool.
async fn call<T, F>(
    ctx: &ExecContext,
    api: &Arc<dyn LoadBalancerApi>,
    operation: &str,
    func: F,
) -> Result<T>
where
    F: FnOnce(&dyn LoadBalancerApi) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let api = Arc::clone(api);
    ctx.pool.run(operation, move || func(api.as_ref())).await
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HealthyOptions {
    name: String,
    count: Threshold,
    region: String,
}

/// Waits until enough instances behind a load balancer are `InService`.
pub struct WaitUntilHealthy {
    meta: ActorMeta,
    api: Arc<dyn LoadBalancerApi>,
    name: String,
    count: Threshold,
    poll: PollConfig,
}

impl WaitUntilHealthy {
    pub fn build(
        spec: &ActorSpec,
        ctx: &BuildContext<'_>,
        settings: &Settings,
        provider: &dyn LoadBalancerProvider,
    ) -> Result<Self> {
        let options: HealthyOptions = spec.parse_options()?;
        let api = connect(&options.region, settings, provider)?;
        let poll = PollConfig::new(format!(
            "Still waiting for {} to become healthy",
            options.name
        ));

        Ok(Self {
            meta: ActorMeta::new(spec, ctx),
            api,
            name: options.name,
            count: options.count,
            poll,
        })
    }

    /// Override the poll timings.
    #[must_use]
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    async fn is_healthy(&self, ctx: &ExecContext) -> Result<bool> {
        let name = self.name.clone();
        let instances = call(ctx, &self.api, "describe instance health", move |api| {
            api.instance_health(&name)
        })
        .await?;

        let total = u64::try_from(instances.len()).unwrap_or(u64::MAX);
        let in_service = u64::try_from(instances.iter().filter(|i| i.is_in_service()).count())
            .unwrap_or(u64::MAX);
        let expected = self.count.required(total);
        let healthy = in_service >= expected;

        debug!(elb = %self.name, in_service, total, expected, healthy, "Counted InService instances");
        Ok(healthy)
    }
}

#[async_trait]
impl Actor for WaitUntilHealthy {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, ctx: &ExecContext) -> Result<bool> {
        let name = self.name.clone();
        call(ctx, &self.api, "find load balancer", move |api| api.find(&name)).await?;

        let condition = FnCondition::new(|| self.is_healthy(ctx));
        let result = poll_until(&condition, &self.poll, self.meta.dry_run, &ctx.cancel)
            .await?
            .into_result()?;

        if !result.simulated {
            info!(elb = %self.name, count = %self.count, "ELB is healthy");
        }
        Ok(result.satisfied)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstanceIds {
    One(String),
    Many(Vec<String>),
}

impl From<InstanceIds> for Vec<String> {
    fn from(ids: InstanceIds) -> Self {
        match ids {
            InstanceIds::One(id) => vec![id],
            InstanceIds::Many(ids) => ids,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MembershipOptions {
    elb: String,
    region: String,
    instance_id: InstanceIds,
}

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Register,
    Deregister,
}

impl Change {
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::Register => REGISTER_INSTANCE,
            Self::Deregister => DEREGISTER_INSTANCE,
        }
    }

    const fn operation(self) -> &'static str {
        match self {
            Self::Register => "register instances",
            Self::Deregister => "deregister instances",
        }
    }

    fn apply(self, api: &dyn LoadBalancerApi, elb: &str, instance_ids: &[String]) -> Result<()> {
        match self {
            Self::Register => api.register_instances(elb, instance_ids),
            Self::Deregister => api.deregister_instances(elb, instance_ids),
        }
    }
}

/// Adds instances to, or removes them from, a load balancer.
pub struct InstanceMembership {
    meta: ActorMeta,
    api: Arc<dyn LoadBalancerApi>,
    change: Change,
    elb: String,
    instance_ids: Vec<String>,
    retry: RetryPolicy,
}

impl InstanceMembership {
    pub fn build(
        spec: &ActorSpec,
        ctx: &BuildContext<'_>,
        change: Change,
        settings: &Settings,
        provider: &dyn LoadBalancerProvider,
    ) -> Result<Self> {
        let options: MembershipOptions = spec.parse_options()?;
        let instance_ids: Vec<String> = options.instance_id.into();
        if instance_ids.is_empty() || instance_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::invalid_options(
                &spec.desc,
                "instance_id must name at least one instance",
            ));
        }
        let api = connect(&options.region, settings, provider)?;

        Ok(Self {
            meta: ActorMeta::new(spec, ctx),
            api,
            change,
            elb: options.elb,
            instance_ids,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy for the mutating call.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn instance_ids(&self) -> &[String] {
        &self.instance_ids
    }
}

#[async_trait]
impl Actor for InstanceMembership {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, ctx: &ExecContext) -> Result<bool> {
        let elb = self.elb.clone();
        call(ctx, &self.api, "find load balancer", move |api| api.find(&elb)).await?;

        let listed = self.instance_ids.join(", ");
        match self.change {
            Change::Register => info!(elb = %self.elb, "Adding the following instances to elb: {listed}"),
            Change::Deregister => {
                info!(elb = %self.elb, "Removing the following instances from elb: {listed}");
            }
        }

        if self.meta.dry_run {
            info!(operation = self.change.operation(), "Dry run, leaving the load balancer unchanged");
            return Ok(true);
        }

        let operation = self.change.operation();
        retry_idempotent(&self.retry, &ctx.cancel, operation, || {
            let elb = self.elb.clone();
            let instance_ids = self.instance_ids.clone();
            let change = self.change;
            call(ctx, &self.api, operation, move |api| {
                change.apply(api, &elb, &instance_ids)
            })
        })
        .await?;

        info!("Done");
        Ok(true)
    }
}

pub(crate) fn register(
    registry: &mut ActorRegistry,
    settings: &Arc<Settings>,
    provider: &Arc<dyn LoadBalancerProvider>,
) {
    {
        let settings = Arc::clone(settings);
        let provider = Arc::clone(provider);
        registry.register(WAIT_UNTIL_HEALTHY, move |spec, ctx| {
            WaitUntilHealthy::build(spec, ctx, &settings, provider.as_ref())
                .map(|a| Box::new(a) as Box<dyn Actor>)
        });
    }

    for change in [Change::Register, Change::Deregister] {
        let settings = Arc::clone(settings);
        let provider = Arc::clone(provider);
        registry.register(change.kind(), move |spec, ctx| {
            InstanceMembership::build(spec, ctx, change, &settings, provider.as_ref())
                .map(|a| Box::new(a) as Box<dyn Actor>)
        });
    }
}
