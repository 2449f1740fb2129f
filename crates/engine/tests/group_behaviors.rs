//! Behavioral tests for actor tree assembly and group execution.
//!
//! Test actors append to a shared event log so ordering between siblings
//! can be asserted after the run.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use serde::Deserialize;
use serde_json::json;

use deckhand_engine::{
    Actor, ActorMeta, ActorRegistry, ActorSpec, Error, ErrorKind, ExecContext, Result, RunStatus,
    run_tree,
};

type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepOptions {
    #[serde(default = "default_result")]
    result: bool,
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    unrecoverable: bool,
    #[serde(default)]
    cancel: bool,
}

const fn default_result() -> bool {
    true
}

struct Step {
    meta: ActorMeta,
    options: StepOptions,
    log: EventLog,
}

impl Step {
    fn record(&self, event: &str) {
        if let Ok(mut events) = self.log.lock() {
            events.push(format!("{event} {}", self.meta.description));
        }
    }
}

#[async_trait]
impl Actor for Step {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, ctx: &ExecContext) -> Result<bool> {
        self.record(if self.meta.dry_run { "start(dry)" } else { "start" });
        if self.options.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.options.delay_ms)).await;
        }
        if self.options.cancel {
            ctx.cancel.cancel();
        }
        self.record("end");
        if self.options.unrecoverable {
            return Err(Error::unrecoverable("step exploded"));
        }
        Ok(self.options.result)
    }
}

fn registry(log: &EventLog) -> ActorRegistry {
    let mut registry = ActorRegistry::with_groups();
    let log = Arc::clone(log);
    registry.register("test.Step", move |spec, ctx| {
        Ok(Box::new(Step {
            meta: ActorMeta::new(spec, ctx),
            options: spec.parse_options()?,
            log: Arc::clone(&log),
        }) as Box<dyn Actor>)
    });
    registry
}

fn events(log: &EventLog) -> Vec<String> {
    log.lock().map(|events| events.clone()).unwrap_or_default()
}

fn step(desc: &str, options: serde_json::Value) -> serde_json::Value {
    json!({ "desc": desc, "actor": "test.Step", "options": options })
}

fn group(kind: &str, acts: Vec<serde_json::Value>) -> Result<ActorSpec> {
    serde_json::from_value(json!({
        "desc": format!("{kind} group"),
        "actor": kind,
        "options": { "acts": acts },
    }))
    .map_err(|e| Error::script_load("inline", e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSEMBLY BEHAVIORS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn given_third_child_invalid_when_assembling_then_nothing_runs() -> Result<()> {
    let log = EventLog::default();
    let spec = group(
        "group.Sync",
        vec![
            step("a", json!({})),
            step("b", json!({})),
            step("c", json!({ "result": "definitely" })),
        ],
    )?;

    let err = registry(&log).build(&spec, false).err();

    assert!(matches!(err, Some(Error::Child { position: 3, .. })));
    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Configuration));
    assert!(events(&log).is_empty());
    Ok(())
}

#[test]
fn given_unknown_nested_actor_when_assembling_then_configuration_error() -> Result<()> {
    let log = EventLog::default();
    let inner = json!({
        "desc": "inner",
        "actor": "group.Async",
        "options": { "acts": [{ "desc": "x", "actor": "nope.Nothing" }] },
    });
    let spec = group("group.Sync", vec![step("a", json!({})), inner])?;

    let err = registry(&log).build(&spec, false).err();

    assert_eq!(err.map(|e| e.kind()), Some(ErrorKind::Configuration));
    Ok(())
}

#[test]
fn given_group_without_acts_when_assembling_then_invalid_options() -> Result<()> {
    let log = EventLog::default();
    let spec = ActorSpec::new("empty", "group.Sync");
    let err = registry(&log).build(&spec, false).err();
    assert!(matches!(err, Some(Error::InvalidOptions { .. })));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEQUENTIAL BEHAVIORS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn given_sync_group_when_executed_then_children_never_overlap() -> Result<()> {
    let log = EventLog::default();
    let spec = group(
        "group.Sync",
        vec![
            step("a", json!({ "delay_ms": 50 })),
            step("b", json!({ "delay_ms": 10 })),
            step("c", json!({})),
        ],
    )?;
    let root = registry(&log).build(&spec, false)?;

    let result = root.execute(&ExecContext::default()).await?;

    assert!(result);
    assert_eq!(
        events(&log),
        vec!["start a", "end a", "start b", "end b", "start c", "end c"]
    );
    Ok(())
}

#[tokio::test]
async fn given_sync_group_with_failing_child_when_executed_then_later_children_still_run() -> Result<()> {
    let log = EventLog::default();
    let spec = group(
        "group.Sync",
        vec![step("a", json!({ "result": false })), step("b", json!({}))],
    )?;
    let root = registry(&log).build(&spec, false)?;

    let result = root.execute(&ExecContext::default()).await?;

    assert!(!result);
    assert_eq!(events(&log), vec!["start a", "end a", "start b", "end b"]);
    Ok(())
}

#[tokio::test]
async fn given_child_raises_unrecoverable_when_executed_then_group_reports_failure() -> Result<()> {
    let log = EventLog::default();
    let spec = group(
        "group.Sync",
        vec![step("a", json!({ "unrecoverable": true })), step("b", json!({}))],
    )?;
    let root = registry(&log).build(&spec, false)?;

    let result = root.execute(&ExecContext::default()).await;

    assert!(matches!(result, Ok(false)));
    assert_eq!(events(&log).len(), 4);
    Ok(())
}

#[tokio::test]
async fn given_child_cancels_run_when_executed_then_later_children_do_not_start() -> Result<()> {
    let log = EventLog::default();
    let spec = group(
        "group.Sync",
        vec![step("a", json!({ "cancel": true })), step("b", json!({}))],
    )?;
    let root = registry(&log).build(&spec, false)?;
    let ctx = ExecContext::default();

    let report = run_tree(root.as_ref(), &ctx).await;

    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(events(&log), vec!["start a", "end a"]);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONCURRENT BEHAVIORS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn given_async_group_when_executed_then_all_start_before_any_finishes() -> Result<()> {
    let log = EventLog::default();
    let spec = group(
        "group.Async",
        vec![
            step("a", json!({ "delay_ms": 100 })),
            step("b", json!({ "delay_ms": 100 })),
            step("c", json!({ "delay_ms": 100 })),
        ],
    )?;
    let root = registry(&log).build(&spec, false)?;

    let started = tokio::time::Instant::now();
    let result = root.execute(&ExecContext::default()).await?;
    let elapsed = started.elapsed();

    assert!(result);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(150));

    let recorded = events(&log);
    let last_start = recorded.iter().rposition(|e| e.starts_with("start"));
    let first_end = recorded.iter().position(|e| e.starts_with("end"));
    assert!(last_start < first_end);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn given_async_group_with_failing_child_when_executed_then_siblings_finish() -> Result<()> {
    let log = EventLog::default();
    let spec = group(
        "group.Async",
        vec![
            step("fast-fail", json!({ "result": false })),
            step("slow", json!({ "delay_ms": 500 })),
        ],
    )?;
    let root = registry(&log).build(&spec, false)?;

    let result = root.execute(&ExecContext::default()).await?;

    assert!(!result);
    assert!(events(&log).contains(&"end slow".to_string()));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// DRY RUN BEHAVIORS
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn given_dry_run_when_assembling_nested_groups_then_every_descendant_is_dry() -> Result<()> {
    let log = EventLog::default();
    let inner = json!({
        "desc": "inner",
        "actor": "group.Async",
        "options": { "acts": [step("b", json!({})), step("c", json!({}))] },
    });
    let spec = group("group.Sync", vec![step("a", json!({})), inner])?;
    let root = registry(&log).build(&spec, true)?;

    assert!(root.meta().dry_run);
    root.execute(&ExecContext::default()).await?;

    let starts: Vec<String> = events(&log)
        .into_iter()
        .filter(|e| e.starts_with("start"))
        .collect();
    assert_eq!(starts.len(), 3);
    assert!(starts.iter().all(|e| e.starts_with("start(dry)")));
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// AGGREGATION PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

fn run_group(kind: &str, results: &[bool]) -> Result<bool> {
    let log = EventLog::default();
    let acts = results
        .iter()
        .enumerate()
        .map(|(i, result)| step(&format!("child-{i}"), json!({ "result": result })))
        .collect();
    let spec = group(kind, acts)?;
    let root = registry(&log).build(&spec, false)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| Error::operational("runtime", e.to_string()))?;
    runtime.block_on(root.execute(&ExecContext::default()))
}

proptest! {
    #[test]
    fn prop_group_result_is_and_of_children(results in prop::collection::vec(any::<bool>(), 0..8)) {
        let expected = results.iter().all(|r| *r);
        for kind in ["group.Sync", "group.Async"] {
            let outcome = run_group(kind, &results);
            prop_assert_eq!(outcome.ok(), Some(expected));
        }
    }
}
