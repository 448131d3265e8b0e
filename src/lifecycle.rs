//! Session issue, close, statistics and background expiry sweeps.

use crate::store::{token_prefix, ImageSession, SessionStore, StoreStats};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Issues and closes sessions and schedules the periodic sweep.
pub struct SessionLifecycle {
    store: Arc<SessionStore>,
    sweep_interval: Duration,
    sweeper: Mutex<Option<SweeperHandle>>,
}

impl SessionLifecycle {
    pub fn new(store: Arc<SessionStore>, sweep_interval: Duration) -> Self {
        Self {
            store,
            sweep_interval,
            sweeper: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn issue(&self, session: ImageSession) -> String {
        self.store.put(session)
    }

    /// Close a session early. Returns whether a live session was closed.
    pub fn close(&self, token: &str) -> bool {
        let closed = self.store.delete(token);
        debug!(token = token_prefix(token), closed, "session close requested");
        closed
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Start the background sweep on the ambient tokio runtime. Returns false when there is no
    /// runtime to spawn on; sessions then expire lazily on read only.
    pub fn start_sweeper(&self) -> bool {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return true;
        }

        if Handle::try_current().is_err() {
            warn!("no tokio runtime available, expired sessions are only evicted on read");
            return false;
        }

        *sweeper = Some(spawn_sweeper(&self.store, self.sweep_interval));
        true
    }

    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.stop();
        }
    }

    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

/// Owns the sweep task. Dropping the handle stops the sweeps.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task that evicts expired sessions every `interval` on the current tokio runtime.
///
/// The task only holds a weak reference, so it never keeps the store alive and exits on its own
/// once the store is dropped. Must be called from within a runtime.
pub fn spawn_sweeper(store: &Arc<SessionStore>, interval: Duration) -> SweeperHandle {
    let store: Weak<SessionStore> = Arc::downgrade(store);
    let interval = interval.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        info!(interval_ms = interval.as_millis() as u64, "session sweeper started");

        loop {
            ticker.tick().await;

            let Some(store) = store.upgrade() else {
                break;
            };

            let evicted = store.sweep();
            if evicted > 0 {
                info!(evicted, remaining = store.len(), "expired sessions swept");
            } else {
                debug!(remaining = store.len(), "sweep found nothing to evict");
            }
        }

        info!("session sweeper stopped");
    });

    SweeperHandle { task }
}
