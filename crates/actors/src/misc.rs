//! Small utility actors.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use deckhand_core::{Error, Result};
use deckhand_engine::{Actor, ActorMeta, ActorRegistry, ActorSpec, BuildContext, ExecContext};

pub const NOTE: &str = "misc.Note";
pub const SLEEP: &str = "misc.Sleep";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoteOptions {
    message: String,
}

/// Logs a message.
pub struct Note {
    meta: ActorMeta,
    message: String,
}

impl Note {
    pub fn build(spec: &ActorSpec, ctx: &BuildContext<'_>) -> Result<Self> {
        let options: NoteOptions = spec.parse_options()?;
        Ok(Self {
            meta: ActorMeta::new(spec, ctx),
            message: options.message,
        })
    }
}

#[async_trait]
impl Actor for Note {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, _ctx: &ExecContext) -> Result<bool> {
        info!("{}", self.message);
        Ok(true)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SleepOptions {
    /// Seconds, fractions allowed.
    sleep: f64,
}

/// Waits a fixed time. Skipped in dry run.
pub struct Sleep {
    meta: ActorMeta,
    duration: Duration,
}

impl Sleep {
    pub fn build(spec: &ActorSpec, ctx: &BuildContext<'_>) -> Result<Self> {
        let options: SleepOptions = spec.parse_options()?;
        let duration = Duration::try_from_secs_f64(options.sleep).map_err(|_| {
            Error::invalid_options(
                &spec.desc,
                format!("sleep must be a non-negative number of seconds, got {}", options.sleep),
            )
        })?;
        Ok(Self {
            meta: ActorMeta::new(spec, ctx),
            duration,
        })
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }
}

#[async_trait]
impl Actor for Sleep {
    fn meta(&self) -> &ActorMeta {
        &self.meta
    }

    async fn act(&self, ctx: &ExecContext) -> Result<bool> {
        if self.meta.dry_run {
            info!(secs = self.duration.as_secs_f64(), "Would have slept");
            return Ok(true);
        }
        info!(secs = self.duration.as_secs_f64(), "Sleeping");
        ctx.cancel.sleep(self.duration).await?;
        Ok(true)
    }
}

pub(crate) fn register(registry: &mut ActorRegistry) {
    registry.register(NOTE, |spec, ctx| {
        Note::build(spec, ctx).map(|a| Box::new(a) as Box<dyn Actor>)
    });
    registry.register(SLEEP, |spec, ctx| {
        Sleep::build(spec, ctx).map(|a| Box::new(a) as Box<dyn Actor>)
    });
}
