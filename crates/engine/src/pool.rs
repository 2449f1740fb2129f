//! Bounded worker pool for blocking external calls.
//!
//! Synchronous client libraries must not stall the cooperative scheduler.
//! Calls submitted here run on tokio's blocking threads, and at most `size`
//! of them run at once across the whole process.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use deckhand_core::{Error, Result};

/// Default number of concurrent blocking calls.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Process-wide pool for blocking calls. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BlockingPool {
    /// Create a pool allowing `size` concurrent calls (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Maximum number of concurrent calls.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Run a blocking call on the pool and await its result.
    ///
    /// The call is an atomic unit: once started it runs to completion even if
    /// the surrounding run is cancelled.
    pub async fn run<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::operational(operation, e.to_string()))?;

        debug!(operation, available = self.permits.available_permits(), "Dispatching blocking call");

        tokio::task::spawn_blocking(move || {
            let result = call();
            drop(permit);
            result
        })
        .await
        .map_err(|e| Error::operational(operation, format!("worker task failed: {e}")))?
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
