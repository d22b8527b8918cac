//! Tokio-backed single-shot timers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::core::error::{PrintfError, Result};
use crate::core::traits::{TimerCallback, TimerFacility, TimerHandle};

type TaskMap = Arc<Mutex<HashMap<u64, JoinHandle<()>>>>;

/// [`TimerFacility`] that runs each timer as a tokio task.
///
/// Cancelling aborts the sleeping task. A callback that has already started
/// runs to completion.
pub struct TokioTimer {
    runtime: Option<Handle>,
    next_id: AtomicU64,
    tasks: TaskMap,
}

impl TokioTimer {
    /// Create a timer that spawns on the runtime current at scheduling time.
    pub fn new() -> Self {
        Self {
            runtime: None,
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a timer bound to a specific runtime.
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timers scheduled and not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn runtime(&self) -> Result<Handle> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current()
                .map_err(|e| PrintfError::timer(format!("no tokio runtime: {}", e))),
        }
    }
}

impl Default for TokioTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerFacility for TokioTimer {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerHandle> {
        let runtime = self.runtime()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);

        // Hold the map lock across spawn so the task cannot remove its entry
        // before it has been inserted.
        let mut map = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let still_pending = tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id)
                .is_some();
            if still_pending {
                callback();
            }
        });
        map.insert(id, handle);

        #[cfg(feature = "tracing-support")]
        tracing::trace!("Scheduled timer#{} in {:?}", id, delay);

        Ok(TimerHandle::new(id))
    }

    fn cancel(&self, handle: TimerHandle) {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());

        if let Some(task) = task {
            task.abort();

            #[cfg(feature = "tracing-support")]
            tracing::trace!("Cancelled {}", handle);
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        let mut map = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in map.drain() {
            task.abort();
        }
    }
}
