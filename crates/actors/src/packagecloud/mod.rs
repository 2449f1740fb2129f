//! Maintenance actors for packagecloud.io repositories.
//!
//! Require `PACKAGECLOUD_ACCOUNT` and `PACKAGECLOUD_TOKEN`. Name and version
//! patterns are regular expressions matched at the start of the value.

mod client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use deckhand_core::{Error, Result};
use deckhand_engine::{
    Actor, ActorMeta, ActorRegistry, ActorSpec, BuildContext, ExecContext, FnCondition,
    PollConfig, poll_until,
};

pub use client::{HttpRepositories, Package, PackageRepository, PackagecloudClient, RepositoryProvider};

use crate::settings::Settings;

pub const DELETE: &str = "packagecloud.Delete";
pub const DELETE_BY_DATE: &str = "packagecloud.DeleteByDate";
pub const WAIT_FOR_PACKAGE: &str = "packagecloud.WaitForPackage";

/// Compile `pattern` so it must match at the start of a value.
pub fn start_anchored(pattern: &str, option: &str, desc: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})"))
        .map_err(|e| Error::invalid_options(desc, format!("{option} is an invalid regex: {e}")))
}

/// Pick the package versions to delete, in deletion order.
///
/// For every distinct name matching `pattern`, versions are considered
/// oldest first and deleted while more than `number_to_keep` remain.
/// With `older_than`, versions not older than that age are kept.
#[must_use]
pub fn plan_deletions(
    packages: &[Package],
    pattern: &Regex,
    number_to_keep: usize,
    older_than: Option<TimeDelta>,
    now: DateTime<Utc>,
) -> Vec<Package> {
    let names = packages
        .iter()
        .map(|p| p.name.as_str())
        .filter(|name| pattern.is_match(name))
        .sorted()
        .dedup();

    let mut plan = Vec::new();
    for name in names {
        let versions = packages
            .iter()
            .filter(|p| p.name == name)
            .sorted_by_key(|p| p.created_at);

        let mut remaining = packages.iter().filter(|p| p.name == name).count();
        for package in versions {
            if remaining <= number_to_keep {
                break;
            }
            if older_than.is_some_and(|age| now.signed_duration_since(package.created_at) <= age) {
                continue;
            }
            plan.push(package.clone());
            remaining = remaining.saturating_sub(1);
        }
    }
    plan
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteOptions {
    packages_to_delete: String,
    repo: String,
    #[serde(default)]
    number_to_keep: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteByDateOptions {
    packages_to_delete: String,
    repo: String,
    #[serde(default)]
    number_to_keep: usize,
    /// Seconds.
    older_than: u64,
}

struct DeleteRule {
    packages_to_delete: String,
    repo: String,
    number_to_keep: usize,
    older_than: Option<TimeDelta>,
}

/// Deletes old versions of matching packages.
pub struct DeletePackages {
    meta: ActorMeta,
    repository: Arc<dyn PackageRepository>,
    repo: String,
    pattern: Regex,
    number_to_keep: usize,
    older_than: Option<TimeDelta>,
}

impl DeletePackages {
    /// Build `packagecloud.Delete`.
    pub fn build(
        spec: &ActorSpec,
        ctx: &BuildContext<'_>,
        settings: &Settings,
        provider: &dyn RepositoryProvider,
    ) -> Result<Self> {
        let options: DeleteOptions = spec.parse_options()?;
        Self::assemble(
            spec,
            ctx,
            settings,
            provider,
            DeleteRule {
                packages_to_delete: options.packages_to_delete,
                repo: options.repo,
                number_to_keep: options.number_to_keep,
                older_than: None,
            },
        )
    }

    /// Build `packagecloud.DeleteByDate`.
    pub fn build_by_date(
        spec: &ActorSpec,
        ctx: &BuildContext<'_>,
        settings: &Settings,
        provider: &dyn RepositoryProvider,
    ) -> Result<Self> {
        let options: DeleteByDateOptions = spec.parse_options()?;
        let older_than = i64::try_from(options.older_than)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| Error::invalid_options(&spec.desc, "older_than is too large"))?;
        Self::assemble(
            spec,
            ctx,
            settings,
            provider,
            DeleteRule {
                packages_to_delete: options.packages_to_delete,
                repo: options.repo,
                number_to_keep: options.number_to_keep,
                older_than: Some(older_than),
            },
        )
    }

    fn assemble(
        spec: &ActorSpec,
        ctx: &BuildContext<'_>,
        settings: &Settings,
        provider: &dyn RepositoryProvider,
        rule: DeleteRule,
    ) -> Result<Self> {
        let pattern = start_anchored(&rule.packages_to_delete, "packages_to_delete", &spec.desc)?;
        let keys = settings.packagecloud.require()?;
        let repository = provider.connect(&keys)?;

        Ok(Self {
            meta: ActorMeta::new(spec, ctx),
            repository,
            repo: rule.repo,
            pattern,
            number_to_keep: rule.number_to_keep,
            older_than: rule.older_than,
        })
    }
}

#[async_trait]
impl Actor for DeletePackages {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, ctx: &ExecContext) -> Result<bool> {
        let packages = self.repository.packages(&self.repo).await?;
        let plan = plan_deletions(
            &packages,
            &self.pattern,
            self.number_to_keep,
            self.older_than,
            Utc::now(),
        );
        debug!(listed = packages.len(), planned = plan.len(), "Planned deletions");

        for package in &plan {
            ctx.cancel.check()?;
            let target = format!("{}/{}/{}", self.repo, package.distro_version, package.filename());
            if self.meta.dry_run {
                info!("Would have deleted {target}");
            } else {
                info!("Deleting {target}");
                self.repository.delete(&self.repo, package).await?;
            }
        }

        info!(repo = %self.repo, count = plan.len(), "Finished deleting packages");
        Ok(true)
    }
}

const fn default_sleep() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WaitOptions {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    repo: String,
    /// Seconds between searches.
    #[serde(default = "default_sleep")]
    sleep: u64,
}

fn default_version() -> String {
    ".*".to_string()
}

/// Waits until a package matching a name and version appears.
pub struct WaitForPackage {
    meta: ActorMeta,
    repository: Arc<dyn PackageRepository>,
    repo: String,
    name: Regex,
    version: Regex,
    poll: PollConfig,
}

impl WaitForPackage {
    pub fn build(
        spec: &ActorSpec,
        ctx: &BuildContext<'_>,
        settings: &Settings,
        provider: &dyn RepositoryProvider,
    ) -> Result<Self> {
        let options: WaitOptions = spec.parse_options()?;
        let name = start_anchored(&options.name, "name", &spec.desc)?;
        let version = start_anchored(&options.version, "version", &spec.desc)?;
        let keys = settings.packagecloud.require()?;
        let repository = provider.connect(&keys)?;

        let poll = PollConfig::new(format!("Still waiting for {} {}", options.name, options.version))
            .with_interval(Duration::from_secs(options.sleep))
            .with_status_interval(None);

        Ok(Self {
            meta: ActorMeta::new(spec, ctx),
            repository,
            repo: options.repo,
            name,
            version,
            poll,
        })
    }

    async fn search(&self) -> Result<bool> {
        info!(name = %self.name, version = %self.version, "Searching for package");
        let packages = self.repository.packages(&self.repo).await?;
        let found = packages
            .iter()
            .any(|p| self.name.is_match(&p.name) && self.version.is_match(&p.version));
        if found {
            info!("Found it");
        }
        Ok(found)
    }
}

#[async_trait]
impl Actor for WaitForPackage {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, ctx: &ExecContext) -> Result<bool> {
        let condition = FnCondition::new(|| self.search());
        let result = poll_until(&condition, &self.poll, self.meta.dry_run, &ctx.cancel)
            .await?
            .into_result()?;
        Ok(result.satisfied)
    }
}

pub(crate) fn register(
    registry: &mut ActorRegistry,
    settings: &Arc<Settings>,
    provider: &Arc<dyn RepositoryProvider>,
) {
    type Build = fn(&ActorSpec, &BuildContext<'_>, &Settings, &dyn RepositoryProvider) -> Result<Box<dyn Actor>>;

    let builders: [(&str, Build); 3] = [
        (DELETE, |spec, ctx, settings, provider| {
            DeletePackages::build(spec, ctx, settings, provider).map(|a| Box::new(a) as Box<dyn Actor>)
        }),
        (DELETE_BY_DATE, |spec, ctx, settings, provider| {
            DeletePackages::build_by_date(spec, ctx, settings, provider)
                .map(|a| Box::new(a) as Box<dyn Actor>)
        }),
        (WAIT_FOR_PACKAGE, |spec, ctx, settings, provider| {
            WaitForPackage::build(spec, ctx, settings, provider).map(|a| Box::new(a) as Box<dyn Actor>)
        }),
    ];

    for (name, build) in builders {
        let settings = Arc::clone(settings);
        let provider = Arc::clone(provider);
        registry.register(name, move |spec, ctx| build(spec, ctx, &settings, provider.as_ref()));
    }
}
