//! Debounced zero-count record cleanup
//!
//! Deleting an app leaves the store in a state worth compacting, but app
//! deletions tend to arrive in bursts. The scheduler waits for a quiet period
//! after the most recent trigger and then removes every record whose count
//! is zero, once.
//!
//! A scheduled run can be superseded or cancelled until it starts writing.
//! Once its write scope is requested it runs to completion or fails; a
//! failure is logged and the scheduler stays armed for the next trigger.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::database::{IngestStore, MutationObserver, RecordPredicate, StoreResult};

/// Counters describing scheduler activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceStats {
    /// Runs scheduled by triggers
    pub scheduled: u64,
    /// Scheduled runs replaced by a later trigger before starting
    pub superseded: u64,
    /// Cleanups that committed
    pub runs: u64,
    /// Cleanups that failed
    pub failures: u64,
    /// Records removed across all runs
    pub rows_removed: u64,
}

struct PendingRun {
    generation: u64,
    started: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    closed: bool,
    pending: Option<PendingRun>,
}

struct Inner<S> {
    store: Arc<S>,
    delay: Duration,
    runtime: Handle,
    slot: Mutex<Slot>,
    /// Held for the whole of a cleanup so two runs never write concurrently
    run_lock: tokio::sync::Mutex<()>,
    scheduled: AtomicU64,
    superseded: AtomicU64,
    runs: AtomicU64,
    failures: AtomicU64,
    rows_removed: AtomicU64,
}

impl<S: IngestStore + 'static> Inner<S> {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        // Slot is never left half-updated.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_scheduled(self: Arc<Self>, generation: u64, started: Arc<AtomicBool>) {
        tokio::time::sleep(self.delay).await;
        let _running = self.run_lock.lock().await;

        {
            let slot = self.slot();
            if slot.closed || slot.generation != generation {
                return;
            }
            started.store(true, Ordering::SeqCst);
        }

        // Failures are logged and counted inside.
        let _ = self.execute().await;

        let mut slot = self.slot();
        if slot
            .pending
            .as_ref()
            .is_some_and(|run| run.generation == generation)
        {
            slot.pending = None;
        }
    }

    async fn execute(&self) -> StoreResult<usize> {
        match remove_zero_count_records(self.store.as_ref()).await {
            Ok(removed) => {
                self.runs.fetch_add(1, Ordering::Relaxed);
                self.rows_removed
                    .fetch_add(removed as u64, Ordering::Relaxed);
                info!(removed, "Removed zero-count records");
                Ok(removed)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Zero-count cleanup failed");
                Err(e)
            }
        }
    }
}

/// Delete every record whose count is zero in one write scope
pub async fn remove_zero_count_records<S: IngestStore + ?Sized>(store: &S) -> StoreResult<usize> {
    let mut scope = store.begin_write().await?;
    match store
        .delete_records(&mut scope, RecordPredicate::CountEquals(0))
        .await
    {
        Ok(removed) => {
            store.commit(scope).await?;
            Ok(removed)
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback(scope).await {
                warn!(error = %rollback_err, "Rollback after failed cleanup failed");
            }
            Err(e)
        }
    }
}

/// Debounced cleanup scheduler
///
/// Owns at most one pending run. Each [`trigger`](Self::trigger) replaces the
/// pending run with a new one scheduled `delay` from now.
pub struct MaintenanceScheduler<S: IngestStore + 'static> {
    inner: Arc<Inner<S>>,
}

impl<S: IngestStore + 'static> MaintenanceScheduler<S> {
    /// Create a scheduler that spawns onto the current Tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(store: Arc<S>, delay: Duration) -> Self {
        Self::with_runtime(store, delay, Handle::current())
    }

    /// Create a scheduler that spawns onto the given runtime
    pub fn with_runtime(store: Arc<S>, delay: Duration, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                delay,
                runtime,
                slot: Mutex::new(Slot::default()),
                run_lock: tokio::sync::Mutex::new(()),
                scheduled: AtomicU64::new(0),
                superseded: AtomicU64::new(0),
                runs: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                rows_removed: AtomicU64::new(0),
            }),
        }
    }

    /// Create a scheduler and register it with the store's app deletions
    ///
    /// The store only keeps a weak reference; dropping the returned `Arc`
    /// unregisters it.
    pub fn attach(store: Arc<S>, delay: Duration) -> Arc<Self> {
        let scheduler = Arc::new(Self::new(Arc::clone(&store), delay));
        let observer: Arc<dyn MutationObserver> = scheduler.clone();
        store.register_observer(Arc::downgrade(&observer));
        scheduler
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Schedule a cleanup after the quiet period, superseding any pending one
    ///
    /// # Returns
    ///
    /// False if the scheduler has been shut down
    pub fn trigger(&self) -> bool {
        let inner = &self.inner;
        let mut slot = inner.slot();
        if slot.closed {
            debug!("Maintenance scheduler is shut down, ignoring trigger");
            return false;
        }

        if let Some(previous) = slot.pending.take()
            && !previous.started.load(Ordering::SeqCst)
        {
            previous.handle.abort();
            inner.superseded.fetch_add(1, Ordering::Relaxed);
            debug!(generation = previous.generation, "Superseded pending cleanup");
        }

        slot.generation += 1;
        let generation = slot.generation;
        let started = Arc::new(AtomicBool::new(false));
        let handle = inner
            .runtime
            .spawn(Arc::clone(inner).run_scheduled(generation, Arc::clone(&started)));
        slot.pending = Some(PendingRun {
            generation,
            started,
            handle,
        });
        inner.scheduled.fetch_add(1, Ordering::Relaxed);
        debug!(generation, delay_ms = inner.delay.as_millis() as u64, "Scheduled cleanup");
        true
    }

    /// Run the cleanup now, waiting for any cleanup already writing
    pub async fn run_now(&self) -> StoreResult<usize> {
        let _running = self.inner.run_lock.lock().await;
        self.inner.execute().await
    }

    /// Wait for the pending run, if any, to finish
    ///
    /// A trigger arriving while waiting schedules a new run that is not
    /// waited for.
    pub async fn flush(&self) {
        let pending = self.inner.slot().pending.take();
        if let Some(run) = pending
            && let Err(e) = run.handle.await
            && !e.is_cancelled()
        {
            error!(error = %e, "Cleanup task failed");
        }
    }

    /// Stop accepting triggers and cancel a run that has not started
    ///
    /// A run that has started writing is left to finish.
    pub fn shutdown(&self) {
        let mut slot = self.inner.slot();
        if slot.closed {
            return;
        }
        slot.closed = true;
        if let Some(pending) = slot.pending.take()
            && !pending.started.load(Ordering::SeqCst)
        {
            pending.handle.abort();
            debug!("Cancelled pending cleanup on shutdown");
        }
    }

    /// Check if a run is scheduled or in progress
    pub fn is_pending(&self) -> bool {
        self.inner.slot().pending.is_some()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.slot().closed
    }

    pub fn stats(&self) -> MaintenanceStats {
        let inner = &self.inner;
        MaintenanceStats {
            scheduled: inner.scheduled.load(Ordering::Relaxed),
            superseded: inner.superseded.load(Ordering::Relaxed),
            runs: inner.runs.load(Ordering::Relaxed),
            failures: inner.failures.load(Ordering::Relaxed),
            rows_removed: inner.rows_removed.load(Ordering::Relaxed),
        }
    }
}

impl<S: IngestStore + 'static> MutationObserver for MaintenanceScheduler<S> {
    fn entity_deleted(&self, id: Uuid) {
        debug!(%id, "App deleted, scheduling cleanup");
        self.trigger();
    }
}

impl<S: IngestStore + 'static> Drop for MaintenanceScheduler<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
