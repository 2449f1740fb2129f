//! CLI command handlers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{info, warn};

use deckhand_actors::elb::InMemoryLoadBalancers;
use deckhand_actors::{Backends, Settings, builtin_registry};
use deckhand_engine::{ActorRegistry, BlockingPool, CancelToken, ExecContext, RunStatus, run_tree};

use crate::cli::{Cli, Commands};
use crate::script::{load_inventory, load_script};

/// Execute a CLI command and return the process exit code.
pub async fn execute_command(cli: Cli) -> Result<i32> {
    let settings = cli.credentials.into_settings();
    let backends = backends(cli.inventory.as_deref())?;

    match cli.command {
        Commands::Run { script, dry } => {
            let registry = builtin_registry(settings, &backends);
            cmd_run(&registry, &script, dry, cli.pool_size).await
        }
        Commands::Validate { script } => {
            let registry = builtin_registry(settings, &backends);
            cmd_validate(&registry, &script)
        }
        Commands::Actors => Ok(cmd_actors(settings, &backends)),
    }
}

/// Backends for this process; the ELB actors need an inventory file.
fn backends(inventory: Option<&Path>) -> Result<Backends> {
    let backends = Backends::default();
    match inventory {
        Some(path) => {
            let inventory = load_inventory(path)
                .with_context(|| format!("Failed to read inventory {}", path.display()))?;
            info!(load_balancers = inventory.len(), "Loaded inventory");
            Ok(backends.with_load_balancers(Arc::new(InMemoryLoadBalancers::new(inventory))))
        }
        None => Ok(backends),
    }
}

async fn cmd_run(registry: &ActorRegistry, script: &Path, dry: bool, pool_size: usize) -> Result<i32> {
    let spec = load_script(script)?;
    let root = registry
        .build(&spec, dry)
        .with_context(|| format!("Script {} is invalid", script.display()))?;

    let cancel = CancelToken::new();
    let ctx = ExecContext::new(cancel.clone(), BlockingPool::new(pool_size));

    let watcher = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let report = run_tree(root.as_ref(), &ctx).await;
    watcher.abort();

    match report.status {
        RunStatus::Succeeded => println!("✓ {} succeeded in {:.1?}", spec.desc, report.elapsed),
        RunStatus::Failed => println!("✗ {} failed after {:.1?}", spec.desc, report.elapsed),
        RunStatus::Cancelled => println!("✗ {} was cancelled after {:.1?}", spec.desc, report.elapsed),
    }
    if let Some(error) = &report.error {
        println!("  {error}");
    }

    Ok(report.exit_code())
}

fn cmd_validate(registry: &ActorRegistry, script: &Path) -> Result<i32> {
    let spec = load_script(script)?;
    registry
        .build(&spec, true)
        .with_context(|| format!("Script {} is invalid", script.display()))?;

    println!("✓ {} is valid", script.display());
    Ok(0)
}

fn cmd_actors(settings: Settings, backends: &Backends) -> i32 {
    let registry = builtin_registry(settings, backends);
    for name in registry.names() {
        println!("{name}");
    }
    0
}
