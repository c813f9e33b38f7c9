//! Deferred deletion scheduler.
//!
//! A soft delete flags the file and records a [`ScheduledDeletion`] row in one
//! store transaction, then arms a one-shot timer. When the timer fires the
//! blob is deleted (with bounded retry) and only then are the record, its
//! favorites, its index entries and the row removed together. A restore
//! before the timer fires removes the row, clears the flag and disarms the
//! timer.
//!
//! Every operation on a file runs under that file's lock ([`FileLocks`]), so
//! a restore racing a purge is decided by whichever takes the lock first; the
//! loser finds the row gone and does nothing.
//!
//! Rows are durable while timers are not. [`DeletionScheduler::sweep`] runs at
//! startup and then periodically to re-arm rows without a live timer and to
//! repair flag/row mismatches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use stash_core::defaults::{
    DELETION_DELAY_SECS, DELETION_SWEEP_INTERVAL_SECS, EVENT_BUS_CAPACITY, PURGE_BACKOFF_MS,
    PURGE_MAX_ATTEMPTS,
};
use stash_core::{
    DeletionRepository, Error, FileRecord, FileRepository, Result, ScheduleDeletionRequest,
    ScheduledDeletion, SemanticIndex, SweepReport,
};
use stash_db::StorageBackend;

use crate::locks::FileLocks;
use crate::retry::RetryPolicy;

/// Configuration for the deletion scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between a soft delete and its purge.
    pub delay: Duration,
    /// Interval between reconciliation sweeps.
    pub sweep_interval: Duration,
    /// Retry policy for blob deletion during a purge.
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(DELETION_DELAY_SECS),
            sweep_interval: Duration::from_secs(DELETION_SWEEP_INTERVAL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DELETION_DELAY_SECS` | `15` | Delay before a deleted file is purged |
    /// | `DELETION_SWEEP_INTERVAL_SECS` | `60` | Reconciliation sweep interval |
    /// | `PURGE_MAX_ATTEMPTS` | `5` | Blob delete attempts per purge |
    /// | `PURGE_BACKOFF_MS` | `200` | Initial backoff between attempts |
    pub fn from_env() -> Self {
        let delay = env_u64("DELETION_DELAY_SECS").unwrap_or(DELETION_DELAY_SECS);
        let sweep_interval = env_u64("DELETION_SWEEP_INTERVAL_SECS")
            .unwrap_or(DELETION_SWEEP_INTERVAL_SECS)
            .max(1);
        let max_attempts = env_u64("PURGE_MAX_ATTEMPTS")
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(PURGE_MAX_ATTEMPTS);
        let backoff_ms = env_u64("PURGE_BACKOFF_MS").unwrap_or(PURGE_BACKOFF_MS);

        Self {
            delay: Duration::from_secs(delay),
            sweep_interval: Duration::from_secs(sweep_interval),
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(backoff_ms)),
        }
    }

    /// Set the purge delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the blob deletion retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

/// Event emitted by the deletion scheduler.
#[derive(Debug, Clone)]
pub enum DeletionEvent {
    /// A file was soft-deleted and its purge armed.
    Scheduled {
        file_id: i64,
        job_token: Uuid,
        fire_at: DateTime<Utc>,
    },
    /// A pending deletion was cancelled (file restored).
    Cancelled { file_id: i64 },
    /// A file was purged.
    Purged { file_id: i64 },
    /// A purge gave up; the row stays for the next sweep.
    PurgeFailed {
        file_id: i64,
        /// Blob-delete tries made in this run.
        attempts: u32,
        error: String,
    },
    /// A reconciliation sweep finished.
    SweepCompleted(SweepReport),
    /// Background loop started.
    SchedulerStarted,
    /// Background loop stopped.
    SchedulerStopped,
}

/// Outcome of a purge attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// The file and everything attached to it is gone.
    Purged,
    /// No row with the given token exists (restored, rescheduled or already
    /// purged); nothing was touched.
    Stale,
}

/// Handle for controlling a running scheduler loop.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<DeletionEvent>,
}

impl SchedulerHandle {
    /// Signal the sweep loop to stop and disarm every timer.
    ///
    /// Rows stay in the store; the next process re-arms them on startup.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<DeletionEvent> {
        self.event_rx.resubscribe()
    }
}

struct ArmedTimer {
    job_token: Uuid,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    config: SchedulerConfig,
    files: Arc<dyn FileRepository>,
    deletions: Arc<dyn DeletionRepository>,
    blobs: Arc<dyn StorageBackend>,
    index: Arc<dyn SemanticIndex>,
    locks: FileLocks,
    timers: Mutex<HashMap<i64, ArmedTimer>>,
    event_tx: broadcast::Sender<DeletionEvent>,
}

/// Owns the soft-delete, purge and restore state machine.
///
/// Cheap to clone; clones share the timer registry and lock table.
#[derive(Clone)]
pub struct DeletionScheduler {
    inner: Arc<SchedulerInner>,
}

impl DeletionScheduler {
    /// Create a scheduler. Nothing is armed until [`schedule`](Self::schedule)
    /// or [`sweep`](Self::sweep) runs.
    pub fn new(
        config: SchedulerConfig,
        files: Arc<dyn FileRepository>,
        deletions: Arc<dyn DeletionRepository>,
        blobs: Arc<dyn StorageBackend>,
        index: Arc<dyn SemanticIndex>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                files,
                deletions,
                blobs,
                index,
                locks: FileLocks::new(),
                timers: Mutex::new(HashMap::new()),
                event_tx,
            }),
        }
    }

    /// Settings this scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Delay applied by [`schedule_default`](Self::schedule_default).
    pub fn default_delay(&self) -> Duration {
        self.inner.config.delay
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<DeletionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Whether a live timer is armed for the file.
    pub fn is_armed(&self, file_id: i64) -> bool {
        self.timers()
            .get(&file_id)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Number of live timers.
    pub fn armed_count(&self) -> usize {
        self.timers()
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    /// Soft-delete a file with the configured delay.
    pub async fn schedule_default(&self, file_id: i64) -> Result<ScheduledDeletion> {
        self.schedule(file_id, self.inner.config.delay).await
    }

    /// Soft-delete a file: flag it, record the row and arm a purge after `delay`.
    ///
    /// Fails with [`Error::AlreadyScheduled`] if a row exists and with
    /// [`Error::FileNotFound`] if the file does not.
    #[instrument(
        skip(self),
        fields(subsystem = "jobs", component = "scheduler", op = "schedule")
    )]
    pub async fn schedule(&self, file_id: i64, delay: Duration) -> Result<ScheduledDeletion> {
        let _lock = self.inner.locks.acquire(file_id).await;

        let job_token = Uuid::now_v7();
        let fire_at = Utc::now()
            + chrono::Duration::from_std(delay)
                .map_err(|e| Error::InvalidInput(format!("Deletion delay out of range: {}", e)))?;

        let row = self
            .inner
            .deletions
            .schedule(ScheduleDeletionRequest {
                file_id,
                job_token,
                fire_at,
            })
            .await?
            .ok_or(Error::AlreadyScheduled(file_id))?;

        self.arm(file_id, row.job_token, delay);

        info!(
            file_id,
            job_token = %row.job_token,
            delay_ms = delay.as_millis() as u64,
            "Deletion scheduled"
        );
        self.emit(DeletionEvent::Scheduled {
            file_id,
            job_token: row.job_token,
            fire_at: row.fire_at,
        });
        Ok(row)
    }

    /// Restore a file pending deletion.
    ///
    /// Removes the row and clears the flag, then disarms the timer. Fails with
    /// [`Error::NotScheduled`] if the file is active and with
    /// [`Error::FileNotFound`] if it does not exist (including when the purge
    /// already won).
    #[instrument(
        skip(self),
        fields(subsystem = "jobs", component = "scheduler", op = "cancel")
    )]
    pub async fn cancel(&self, file_id: i64) -> Result<FileRecord> {
        let _lock = self.inner.locks.acquire(file_id).await;

        if !self.inner.deletions.cancel(file_id).await? {
            return match self.inner.files.get(file_id).await? {
                Some(_) => Err(Error::NotScheduled(file_id)),
                None => Err(Error::FileNotFound(file_id)),
            };
        }

        if let Some(timer) = self.timers().remove(&file_id) {
            timer.handle.abort();
            debug!(file_id, job_token = %timer.job_token, "Timer disarmed");
        }

        let file = self
            .inner
            .files
            .get(file_id)
            .await?
            .ok_or(Error::FileNotFound(file_id))?;

        info!(file_id, "Deletion cancelled, file restored");
        self.emit(DeletionEvent::Cancelled { file_id });
        Ok(file)
    }

    /// Purge a file if `job_token` still names its pending deletion.
    ///
    /// Re-entrant: running it for a file that is already gone, or with a
    /// token that was superseded, is a no-op returning [`PurgeOutcome::Stale`].
    #[instrument(
        skip(self),
        fields(subsystem = "jobs", component = "scheduler", op = "purge")
    )]
    pub async fn purge(&self, file_id: i64, job_token: Uuid) -> Result<PurgeOutcome> {
        let _lock = self.inner.locks.acquire(file_id).await;
        let start = Instant::now();

        let result = self.purge_locked(file_id, job_token).await;
        self.release_timer(file_id, job_token);

        match &result {
            Ok(PurgeOutcome::Purged) => {
                info!(
                    file_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "File purged"
                );
                self.emit(DeletionEvent::Purged { file_id });
            }
            Ok(PurgeOutcome::Stale) => {
                debug!(file_id, job_token = %job_token, "Purge skipped, no matching row");
            }
            Err(e) => {
                error!(file_id, error = %e, "Purge failed, row left for next sweep");
            }
        }
        result
    }

    async fn purge_locked(&self, file_id: i64, job_token: Uuid) -> Result<PurgeOutcome> {
        let inner = &self.inner;
        let Some(row) = inner.deletions.get(file_id).await? else {
            return Ok(PurgeOutcome::Stale);
        };
        if row.job_token != job_token {
            return Ok(PurgeOutcome::Stale);
        }

        if let Some(file) = inner.files.get(file_id).await? {
            let key = file.storage_key.as_str();
            let blobs = &inner.blobs;
            let (deleted, attempts) = inner
                .config
                .retry
                .run("blob_delete", move || blobs.delete(key))
                .await;
            if let Err(e) = deleted {
                let message = e.to_string();
                inner.deletions.record_failure(file_id, &message).await?;
                self.emit(DeletionEvent::PurgeFailed {
                    file_id,
                    attempts,
                    error: message,
                });
                return Err(e);
            }
        }

        inner.deletions.purge(file_id).await?;

        // Postgres cascades index rows with the file; other indexes need the call.
        if let Err(e) = inner.index.remove(file_id).await {
            warn!(file_id, error = %e, "Index cleanup after purge failed");
        }
        Ok(PurgeOutcome::Purged)
    }

    /// Reconcile rows, flags and timers.
    ///
    /// - a row without a live timer is re-armed with its remaining delay
    ///   (zero if already due);
    /// - a row whose file is gone is removed;
    /// - a row whose file lost its flag gets the flag back;
    /// - a flag without a row is cleared.
    #[instrument(
        skip(self),
        fields(subsystem = "jobs", component = "scheduler", op = "sweep")
    )]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let start = Instant::now();
        let mut report = SweepReport::default();

        for row in self.inner.deletions.list_all().await? {
            let file_id = row.file_id;
            if let Err(e) = self.sweep_row(file_id, &mut report).await {
                report.errors += 1;
                warn!(file_id, error = %e, "Sweep could not reconcile row");
            }
        }

        for file_id in self.inner.deletions.list_orphan_flags().await? {
            let _lock = self.inner.locks.acquire(file_id).await;
            match self.inner.deletions.clear_orphan_flag(file_id).await {
                Ok(true) => {
                    warn!(file_id, "Cleared pending flag without a scheduled deletion");
                    report.flags_cleared += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    report.errors += 1;
                    warn!(file_id, error = %e, "Sweep could not clear orphan flag");
                }
            }
        }

        let pruned = self.inner.locks.prune();
        if pruned > 0 {
            debug!(pruned, "Pruned abandoned lock entries");
        }

        debug!(
            rearmed = report.rearmed,
            already_armed = report.already_armed,
            flags_repaired = report.flags_repaired,
            flags_cleared = report.flags_cleared,
            orphan_rows_purged = report.orphan_rows_purged,
            errors = report.errors,
            duration_ms = start.elapsed().as_millis() as u64,
            "Sweep completed"
        );
        self.emit(DeletionEvent::SweepCompleted(report.clone()));
        Ok(report)
    }

    async fn sweep_row(&self, file_id: i64, report: &mut SweepReport) -> Result<()> {
        let _lock = self.inner.locks.acquire(file_id).await;

        // Re-read under the lock; the listing may be stale.
        let Some(row) = self.inner.deletions.get(file_id).await? else {
            return Ok(());
        };
        trace!(file_id, job_token = %row.job_token, "Sweeping row");

        let live = self
            .timers()
            .get(&file_id)
            .is_some_and(|t| t.job_token == row.job_token && !t.handle.is_finished());
        if live {
            report.already_armed += 1;
            return Ok(());
        }

        match self.inner.files.get(file_id).await? {
            None => {
                self.inner.deletions.purge(file_id).await?;
                if let Err(e) = self.inner.index.remove(file_id).await {
                    warn!(file_id, error = %e, "Index cleanup for orphan row failed");
                }
                warn!(file_id, "Removed scheduled deletion whose file is gone");
                report.orphan_rows_purged += 1;
                return Ok(());
            }
            Some(file) if !file.pending_deletion => {
                if self.inner.deletions.repair_flag(file_id).await? {
                    warn!(file_id, "Restored pending flag from scheduled deletion");
                    report.flags_repaired += 1;
                }
            }
            Some(_) => {}
        }

        let remaining = row.remaining(Utc::now());
        self.arm(file_id, row.job_token, remaining);
        debug!(
            file_id,
            job_token = %row.job_token,
            delay_ms = remaining.as_millis() as u64,
            attempts = row.attempts,
            "Re-armed scheduled deletion"
        );
        report.rearmed += 1;
        Ok(())
    }

    /// Start the sweep loop: one sweep immediately, then every
    /// `sweep_interval` until shutdown.
    pub fn start(&self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.inner.event_tx.subscribe();

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run(&mut shutdown_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "scheduler"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            delay_secs = self.inner.config.delay.as_secs(),
            sweep_interval_secs = self.inner.config.sweep_interval.as_secs(),
            "Deletion scheduler started"
        );
        self.emit(DeletionEvent::SchedulerStarted);

        let mut ticker = tokio::time::interval(self.inner.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Deletion scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Sweep failed");
                    }
                }
            }
        }

        self.disarm_all();
        self.emit(DeletionEvent::SchedulerStopped);
        info!("Deletion scheduler stopped");
    }

    /// Arm a one-shot purge timer. Callers hold the file's lock.
    fn arm(&self, file_id: i64, job_token: Uuid, delay: Duration) {
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Errors are recorded on the row and reported as events.
            let _ = scheduler.purge(file_id, job_token).await;
        });

        if let Some(previous) = self
            .timers()
            .insert(file_id, ArmedTimer { job_token, handle })
        {
            previous.handle.abort();
        }
    }

    /// Drop the registry entry if it still belongs to `job_token`.
    fn release_timer(&self, file_id: i64, job_token: Uuid) {
        let mut timers = self.timers();
        if timers
            .get(&file_id)
            .is_some_and(|t| t.job_token == job_token)
        {
            timers.remove(&file_id);
        }
    }

    fn disarm_all(&self) {
        let mut timers = self.timers();
        for (_, timer) in timers.drain() {
            timer.handle.abort();
        }
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<i64, ArmedTimer>> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: DeletionEvent) {
        let _ = self.inner.event_tx.send(event);
    }
}
