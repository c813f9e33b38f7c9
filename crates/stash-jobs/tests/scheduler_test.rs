//! Deletion scheduler behavior against the in-memory stores, on a paused clock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use stash_db::{generate_storage_key, MemoryBackend, MemorySemanticIndex, MemoryStore, StorageBackend};
use stash_inference::mock::MockEmbeddingBackend;
use stash_jobs::{
    Chunker, CreateFileRequest, DeletionEvent, DeletionRepository, DeletionScheduler, Error,
    FavoriteRepository, FileRecord, FileRepository, ListFilesRequest, PurgeOutcome, RetryPolicy,
    ScheduledDeletion, SchedulerConfig, SemanticIndex, SlidingWindowChunker,
};

const OWNER: i64 = 1;
const DELAY: Duration = Duration::from_secs(15);

struct Harness {
    store: MemoryStore,
    blobs: MemoryBackend,
    index: MemorySemanticIndex,
    scheduler: DeletionScheduler,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(
            SchedulerConfig::default()
                .with_delay(DELAY)
                .with_retry(RetryPolicy::new(3, Duration::from_millis(100))),
        )
    }

    fn with_config(config: SchedulerConfig) -> Self {
        let store = MemoryStore::new();
        let blobs = MemoryBackend::new();
        let index = MemorySemanticIndex::new(Arc::new(MockEmbeddingBackend::new()), store.clone());
        let scheduler = Self::scheduler_over(config, &store, &blobs, &index);
        Self {
            store,
            blobs,
            index,
            scheduler,
        }
    }

    fn scheduler_over(
        config: SchedulerConfig,
        store: &MemoryStore,
        blobs: &MemoryBackend,
        index: &MemorySemanticIndex,
    ) -> DeletionScheduler {
        DeletionScheduler::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(blobs.clone()),
            Arc::new(index.clone()),
        )
    }

    async fn upload(&self, name: &str) -> FileRecord {
        let key = generate_storage_key("txt");
        self.blobs.write(&key, name.as_bytes()).await.unwrap();
        let file = self
            .store
            .insert(CreateFileRequest {
                display_name: name.to_string(),
                storage_key: key,
                owner_id: OWNER,
                format: "txt".to_string(),
            })
            .await
            .unwrap();
        let chunks = SlidingWindowChunker::default().chunk(&format!("contents of {name}"));
        self.index.upsert(file.id, &chunks).await.unwrap();
        file
    }

    async fn file(&self, id: i64) -> Option<FileRecord> {
        FileRepository::get(&self.store, id).await.unwrap()
    }

    async fn row(&self, id: i64) -> Option<ScheduledDeletion> {
        DeletionRepository::get(&self.store, id).await.unwrap()
    }

    /// pending_deletion is set exactly when a row exists.
    async fn assert_flag_matches_row(&self, id: i64) {
        if let Some(file) = self.file(id).await {
            assert_eq!(
                file.pending_deletion,
                self.row(id).await.is_some(),
                "flag and row disagree for file {id}"
            );
        }
    }

    async fn assert_purged(&self, file: &FileRecord) {
        assert!(self.file(file.id).await.is_none(), "record still present");
        assert!(self.row(file.id).await.is_none(), "row still present");
        assert!(!self.blobs.contains(&file.storage_key), "blob still present");
        assert!(!self.index.contains(file.id), "index entries still present");
    }

    async fn assert_intact(&self, file: &FileRecord) {
        assert!(self.file(file.id).await.is_some(), "record gone");
        assert!(self.blobs.contains(&file.storage_key), "blob gone");
        assert!(self.index.contains(file.id), "index entries gone");
    }
}

fn past_row(file_id: i64, fire_in_secs: i64) -> ScheduledDeletion {
    let now = Utc::now();
    ScheduledDeletion {
        id: 1000 + file_id,
        file_id,
        job_token: Uuid::now_v7(),
        created_at: now,
        fire_at: now + chrono::Duration::seconds(fire_in_secs),
        attempts: 0,
        last_error: None,
    }
}

async fn next_event<F>(rx: &mut broadcast::Receiver<DeletionEvent>, pred: F) -> DeletionEvent
where
    F: Fn(&DeletionEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for scheduler event")
}

// =============================================================================
// SCHEDULE / CANCEL
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_schedule_twice_is_already_scheduled() {
    let h = Harness::new();
    let file = h.upload("report").await;

    h.scheduler.schedule(file.id, DELAY).await.unwrap();
    let err = h.scheduler.schedule(file.id, DELAY).await.unwrap_err();

    assert!(matches!(err, Error::AlreadyScheduled(id) if id == file.id));
    assert!(err.is_state_conflict());
    assert_eq!(h.store.deletion_count(), 1);
    h.assert_flag_matches_row(file.id).await;
}

#[tokio::test(start_paused = true)]
async fn test_schedule_cancel_schedule_succeeds() {
    let h = Harness::new();
    let file = h.upload("report").await;

    let first = h.scheduler.schedule(file.id, DELAY).await.unwrap();
    let restored = h.scheduler.cancel(file.id).await.unwrap();
    assert!(!restored.pending_deletion);
    h.assert_flag_matches_row(file.id).await;

    let second = h.scheduler.schedule(file.id, DELAY).await.unwrap();
    assert_ne!(first.job_token, second.job_token);
    assert!(h.file(file.id).await.unwrap().pending_deletion);
    assert!(h.scheduler.is_armed(file.id));
    h.assert_flag_matches_row(file.id).await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_without_schedule_is_not_scheduled() {
    let h = Harness::new();
    let file = h.upload("report").await;

    let err = h.scheduler.cancel(file.id).await.unwrap_err();
    assert!(matches!(err, Error::NotScheduled(id) if id == file.id));
    h.assert_intact(&file).await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_file_is_not_found() {
    let h = Harness::new();

    let err = h.scheduler.schedule(404, DELAY).await.unwrap_err();
    assert!(matches!(err, Error::FileNotFound(404)));

    let err = h.scheduler.cancel(404).await.unwrap_err();
    assert!(matches!(err, Error::FileNotFound(404)));
    assert_eq!(h.store.deletion_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_sets_fire_at_from_delay() {
    let h = Harness::new();
    let file = h.upload("report").await;

    let before = Utc::now();
    let row = h.scheduler.schedule(file.id, DELAY).await.unwrap();
    let lead = row.fire_at - before;
    assert!(lead >= chrono::Duration::seconds(15));
    assert!(lead < chrono::Duration::seconds(16));
    assert_eq!(row.attempts, 0);
}

// =============================================================================
// TIMED PURGE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_restore_within_delay_keeps_file_listed() {
    let h = Harness::new();
    let file = h.upload("keep me").await;

    h.scheduler.schedule(file.id, DELAY).await.unwrap();
    let deleted = h
        .store
        .list(ListFilesRequest::new(OWNER).with_filter(stash_jobs::FileFilter::Deleted))
        .await
        .unwrap();
    assert_eq!(deleted.len(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    h.scheduler.cancel(file.id).await.unwrap();
    assert!(!h.scheduler.is_armed(file.id));

    // Well past the original deadline.
    tokio::time::sleep(Duration::from_secs(60)).await;

    h.assert_intact(&file).await;
    let listed = h.store.list(ListFilesRequest::new(OWNER)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].data.id, file.id);
    assert_eq!(h.store.deletion_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_restore_purges_row_and_blob() {
    let h = Harness::new();
    let file = h.upload("doomed").await;
    h.store.toggle(OWNER, file.id).await.unwrap();
    let mut events = h.scheduler.events();

    h.scheduler.schedule(file.id, DELAY).await.unwrap();

    tokio::time::sleep(Duration::from_secs(14)).await;
    h.assert_intact(&file).await;

    let event = next_event(&mut events, |e| matches!(e, DeletionEvent::Purged { .. })).await;
    assert!(matches!(event, DeletionEvent::Purged { file_id } if file_id == file.id));

    h.assert_purged(&file).await;
    assert!(h.store.list_for_owner(OWNER).await.unwrap().is_empty());
    assert!(!h.scheduler.is_armed(file.id));

    // A restore that lost the race reports the file as gone.
    let err = h.scheduler.cancel(file.id).await.unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_purges_of_different_files_are_independent() {
    let h = Harness::new();
    let early = h.upload("early").await;
    let late = h.upload("late").await;

    h.scheduler.schedule(early.id, Duration::from_secs(5)).await.unwrap();
    h.scheduler.schedule(late.id, Duration::from_secs(30)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    h.assert_purged(&early).await;
    h.assert_intact(&late).await;
    h.assert_flag_matches_row(late.id).await;

    tokio::time::sleep(Duration::from_secs(25)).await;
    h.assert_purged(&late).await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_delay_race_has_exactly_one_winner() {
    let h = Harness::new();

    for round in 0..12 {
        let file = h.upload(&format!("race {round}")).await;
        h.scheduler.schedule(file.id, Duration::ZERO).await.unwrap();

        for _ in 0..(round % 4) {
            tokio::task::yield_now().await;
        }
        let cancelled = h.scheduler.cancel(file.id).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        match cancelled {
            Ok(restored) => {
                assert!(!restored.pending_deletion);
                h.assert_intact(&file).await;
                assert!(h.row(file.id).await.is_none());
            }
            Err(Error::FileNotFound(_)) => h.assert_purged(&file).await,
            Err(other) => panic!("unexpected cancel error: {other}"),
        }
        h.assert_flag_matches_row(file.id).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_purge_with_stale_token_is_noop() {
    let h = Harness::new();
    let file = h.upload("report").await;
    h.scheduler.schedule(file.id, DELAY).await.unwrap();

    let outcome = h.scheduler.purge(file.id, Uuid::now_v7()).await.unwrap();
    assert_eq!(outcome, PurgeOutcome::Stale);
    h.assert_intact(&file).await;
    assert!(h.row(file.id).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_purge_is_reentrant() {
    let h = Harness::new();
    let file = h.upload("report").await;
    let row = h.scheduler.schedule(file.id, DELAY).await.unwrap();

    let first = h.scheduler.purge(file.id, row.job_token).await.unwrap();
    assert_eq!(first, PurgeOutcome::Purged);
    h.assert_purged(&file).await;

    let again = h.scheduler.purge(file.id, row.job_token).await.unwrap();
    assert_eq!(again, PurgeOutcome::Stale);

    // The armed timer finds nothing to do either.
    tokio::time::sleep(Duration::from_secs(20)).await;
    h.assert_purged(&file).await;
}

// =============================================================================
// BLOB FAILURES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_blob_failure_retried_then_purged() {
    let h = Harness::new();
    let file = h.upload("flaky").await;
    h.blobs.fail_next_deletes(2);

    h.scheduler.schedule(file.id, Duration::from_secs(1)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    h.assert_purged(&file).await;
}

#[tokio::test(start_paused = true)]
async fn test_retry_exhaustion_leaves_row_for_sweep() {
    let h = Harness::new();
    let file = h.upload("stuck").await;
    h.blobs.fail_next_deletes(3);
    let mut events = h.scheduler.events();

    h.scheduler.schedule(file.id, Duration::from_secs(1)).await.unwrap();

    let failed = next_event(&mut events, |e| matches!(e, DeletionEvent::PurgeFailed { .. })).await;
    match failed {
        DeletionEvent::PurgeFailed {
            file_id, attempts, ..
        } => {
            assert_eq!(file_id, file.id);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let row = h.row(file.id).await.expect("row kept after failure");
    assert_eq!(row.attempts, 1);
    assert!(row.last_error.as_deref().unwrap().contains("injected delete failure"));
    h.assert_intact(&file).await;
    assert!(h.file(file.id).await.unwrap().pending_deletion);
    assert!(!h.scheduler.is_armed(file.id));

    // The next sweep re-arms the row.
    let report = h.scheduler.sweep().await.unwrap();
    assert_eq!(report.rearmed, 1);
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.assert_purged(&file).await;
}

#[tokio::test(start_paused = true)]
async fn test_row_attempts_count_runs_not_blob_tries() {
    let h = Harness::new();
    let file = h.upload("stubborn").await;
    h.blobs.fail_next_deletes(6);
    let mut events = h.scheduler.events();
    assert_eq!(h.scheduler.config().retry.max_attempts, 3);

    h.scheduler.schedule(file.id, Duration::from_secs(1)).await.unwrap();
    next_event(&mut events, |e| matches!(e, DeletionEvent::PurgeFailed { .. })).await;
    assert_eq!(h.row(file.id).await.unwrap().attempts, 1);

    h.scheduler.sweep().await.unwrap();
    let failed = next_event(&mut events, |e| matches!(e, DeletionEvent::PurgeFailed { .. })).await;
    assert!(matches!(failed, DeletionEvent::PurgeFailed { attempts: 3, .. }));
    assert_eq!(h.row(file.id).await.unwrap().attempts, 2);
    h.assert_flag_matches_row(file.id).await;

    h.scheduler.sweep().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.assert_purged(&file).await;
}

// =============================================================================
// SWEEP
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_startup_sweep_purges_elapsed_row() {
    let h = Harness::new();
    let file = h.upload("left over").await;
    h.store.force_deletion_row(past_row(file.id, -60));
    h.store.force_pending_flag(file.id, true);
    let mut events = h.scheduler.events();

    let handle = h.scheduler.start();

    let sweep = next_event(&mut events, |e| matches!(e, DeletionEvent::SweepCompleted(_))).await;
    match sweep {
        DeletionEvent::SweepCompleted(report) => assert_eq!(report.rearmed, 1),
        other => panic!("unexpected event: {other:?}"),
    }
    next_event(&mut events, |e| matches!(e, DeletionEvent::Purged { .. })).await;
    h.assert_purged(&file).await;

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sweep_rearms_with_remaining_delay() {
    let h = Harness::new();
    let file = h.upload("pending").await;
    h.store.force_deletion_row(past_row(file.id, 10));
    h.store.force_pending_flag(file.id, true);

    let report = h.scheduler.sweep().await.unwrap();
    assert_eq!(report.rearmed, 1);
    assert!(h.scheduler.is_armed(file.id));

    tokio::time::sleep(Duration::from_secs(5)).await;
    h.assert_intact(&file).await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    h.assert_purged(&file).await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_leaves_live_timers_alone() {
    let h = Harness::new();
    let file = h.upload("report").await;
    h.scheduler.schedule(file.id, DELAY).await.unwrap();

    let report = h.scheduler.sweep().await.unwrap();
    assert_eq!(report.already_armed, 1);
    assert_eq!(report.rearmed, 0);
    assert_eq!(h.scheduler.armed_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_clears_flag_without_row() {
    let h = Harness::new();
    let file = h.upload("report").await;
    h.store.force_pending_flag(file.id, true);

    let report = h.scheduler.sweep().await.unwrap();
    assert_eq!(report.flags_cleared, 1);
    assert!(!h.file(file.id).await.unwrap().pending_deletion);
    h.assert_flag_matches_row(file.id).await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_restores_flag_from_row() {
    let h = Harness::new();
    let file = h.upload("report").await;
    h.store.force_deletion_row(past_row(file.id, 30));

    let report = h.scheduler.sweep().await.unwrap();
    assert_eq!(report.flags_repaired, 1);
    assert_eq!(report.rearmed, 1);
    assert!(h.file(file.id).await.unwrap().pending_deletion);
    h.assert_flag_matches_row(file.id).await;
}

#[tokio::test(start_paused = true)]
async fn test_sweep_removes_row_of_missing_file() {
    let h = Harness::new();
    h.store.force_deletion_row(past_row(999, 30));

    let report = h.scheduler.sweep().await.unwrap();
    assert_eq!(report.orphan_rows_purged, 1);
    assert_eq!(report.rearmed, 0);
    assert_eq!(h.store.deletion_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_keeps_rows_for_next_process() {
    let h = Harness::new();
    let file = h.upload("survivor").await;
    let mut events = h.scheduler.events();

    let handle = h.scheduler.start();
    h.scheduler.schedule(file.id, DELAY).await.unwrap();
    handle.shutdown().await.unwrap();
    next_event(&mut events, |e| matches!(e, DeletionEvent::SchedulerStopped)).await;

    assert_eq!(h.scheduler.armed_count(), 0);
    tokio::time::sleep(Duration::from_secs(30)).await;
    h.assert_intact(&file).await;
    assert!(h.row(file.id).await.is_some());

    // A fresh scheduler over the same stores picks the row up.
    let restarted = Harness::scheduler_over(
        SchedulerConfig::default(),
        &h.store,
        &h.blobs,
        &h.index,
    );
    let report = restarted.sweep().await.unwrap();
    assert_eq!(report.rearmed, 1);
    tokio::time::sleep(Duration::from_secs(20)).await;
    h.assert_purged(&file).await;
}
