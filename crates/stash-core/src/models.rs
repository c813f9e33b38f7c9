//! Data models for stash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// FILE TYPES
// =============================================================================

/// Metadata of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    /// Uploaded filename without its extension.
    pub display_name: String,
    /// Key of the blob in the storage backend.
    pub storage_key: String,
    pub owner_id: i64,
    /// Lowercase extension without the leading dot (e.g. "pdf").
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set while a purge is scheduled for this file.
    pub pending_deletion: bool,
}

impl FileRecord {
    /// Lifecycle state derived from the pending-deletion flag.
    pub fn state(&self) -> FileState {
        if self.pending_deletion {
            FileState::PendingDeletion
        } else {
            FileState::Active
        }
    }

    /// Original filename as uploaded (display name plus extension).
    pub fn filename(&self) -> String {
        if self.format.is_empty() {
            self.display_name.clone()
        } else {
            format!("{}.{}", self.display_name, self.format)
        }
    }
}

/// Lifecycle state of a file that still has a record.
///
/// The terminal `Purged` state has no record, so it is not represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Active,
    PendingDeletion,
}

/// Request for creating a new file record.
#[derive(Debug, Clone)]
pub struct CreateFileRequest {
    pub display_name: String,
    pub storage_key: String,
    pub owner_id: i64,
    pub format: String,
}

/// Which slice of an owner's files a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFilter {
    /// Files not pending deletion.
    #[default]
    Active,
    /// Active files the owner marked as favorite.
    Favorites,
    /// Files pending deletion (restorable).
    Deleted,
}

/// Request for listing files.
#[derive(Debug, Clone, Default)]
pub struct ListFilesRequest {
    pub owner_id: i64,
    pub filter: FileFilter,
    /// Case-insensitive substring match on the display name.
    pub query: Option<String>,
}

impl ListFilesRequest {
    /// Create a listing request for the owner's active files.
    pub fn new(owner_id: i64) -> Self {
        Self {
            owner_id,
            ..Default::default()
        }
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: FileFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the name query. Blank queries are ignored.
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        self
    }

    /// Whether a record belongs in this listing (ignores the favorite join).
    pub fn matches(&self, file: &FileRecord) -> bool {
        if file.owner_id != self.owner_id {
            return false;
        }
        let pending_ok = match self.filter {
            FileFilter::Active | FileFilter::Favorites => !file.pending_deletion,
            FileFilter::Deleted => file.pending_deletion,
        };
        let query_ok = self
            .query
            .as_deref()
            .map(|q| file.display_name.to_lowercase().contains(q))
            .unwrap_or(true);
        pending_ok && query_ok
    }
}

/// A file in a listing, joined with the caller's favorite (if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedFile {
    pub data: FileRecord,
    /// Id of the caller's favorite row for this file.
    pub fav: Option<i64>,
}

// =============================================================================
// FAVORITE TYPES
// =============================================================================

/// A file marked as favorite by an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: i64,
    pub owner_id: i64,
    pub file_id: i64,
}

/// Outcome of toggling a favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "favorite", rename_all = "snake_case")]
pub enum FavoriteToggle {
    Added(Favorite),
    Removed(Favorite),
}

impl FavoriteToggle {
    /// The favorite row that was added or removed.
    pub fn favorite(&self) -> &Favorite {
        match self {
            FavoriteToggle::Added(f) | FavoriteToggle::Removed(f) => f,
        }
    }
}

// =============================================================================
// DELETION TYPES
// =============================================================================

/// Durable bookkeeping for a file on its way to being purged.
///
/// At most one row exists per file. The row is created together with the
/// file's pending-deletion flag and destroyed either by the purge or by a
/// restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDeletion {
    pub id: i64,
    pub file_id: i64,
    /// Handle of the armed timer. A timer only purges while its token matches.
    pub job_token: Uuid,
    pub created_at: DateTime<Utc>,
    /// When the purge is due; used to re-arm after a restart.
    pub fire_at: DateTime<Utc>,
    /// Failed purge runs so far. Each run retries the blob delete per the
    /// retry policy before counting once.
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl ScheduledDeletion {
    /// Time left until the purge is due, zero if already elapsed.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.fire_at - now).to_std().unwrap_or_default()
    }
}

/// Request for scheduling a deletion.
#[derive(Debug, Clone)]
pub struct ScheduleDeletionRequest {
    pub file_id: i64,
    pub job_token: Uuid,
    pub fire_at: DateTime<Utc>,
}

/// Result of a reconciliation pass over the deletion bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Rows re-armed with a live timer.
    pub rearmed: usize,
    /// Rows whose file had its flag cleared; the flag was set again.
    pub flags_repaired: usize,
    /// Files flagged pending without a row; the flag was cleared.
    pub flags_cleared: usize,
    /// Rows whose file no longer existed; the row was removed.
    pub orphan_rows_purged: usize,
    /// Rows that could not be processed this pass.
    pub errors: usize,
    /// Rows that already had a live timer.
    pub already_armed: usize,
}

// =============================================================================
// SEARCH TYPES
// =============================================================================

/// A ranked hit from the semantic index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub file_id: i64,
    pub score: f32,
    /// Best matching chunk text.
    pub snippet: Option<String>,
}

/// A semantic hit resolved against the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub data: FileRecord,
    pub score: f32,
    pub snippet: Option<String>,
}

// =============================================================================
// EXTRACTION TYPES
// =============================================================================

/// Result of text extraction from an uploaded file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Extracted text content, if any.
    pub extracted_text: Option<String>,
    /// Metadata about the extraction (format-specific).
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn file(owner_id: i64, name: &str, pending: bool) -> FileRecord {
        FileRecord {
            id: 1,
            display_name: name.to_string(),
            storage_key: "files/aa/bb/x.pdf".to_string(),
            owner_id,
            format: "pdf".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            pending_deletion: pending,
        }
    }

    #[test]
    fn test_file_state_follows_flag() {
        assert_eq!(file(1, "a", false).state(), FileState::Active);
        assert_eq!(file(1, "a", true).state(), FileState::PendingDeletion);
    }

    #[test]
    fn test_filename_rejoins_extension() {
        assert_eq!(file(1, "report", false).filename(), "report.pdf");
        let mut bare = file(1, "README", false);
        bare.format.clear();
        assert_eq!(bare.filename(), "README");
    }

    #[test]
    fn test_list_request_filters_by_owner_and_flag() {
        let active = ListFilesRequest::new(1);
        assert!(active.matches(&file(1, "a", false)));
        assert!(!active.matches(&file(1, "a", true)));
        assert!(!active.matches(&file(2, "a", false)));

        let deleted = ListFilesRequest::new(1).with_filter(FileFilter::Deleted);
        assert!(deleted.matches(&file(1, "a", true)));
        assert!(!deleted.matches(&file(1, "a", false)));
    }

    #[test]
    fn test_list_request_query_is_case_insensitive() {
        let req = ListFilesRequest::new(1).with_query(Some("  RePoRt ".to_string()));
        assert_eq!(req.query.as_deref(), Some("report"));
        assert!(req.matches(&file(1, "Quarterly Report", false)));
        assert!(!req.matches(&file(1, "invoice", false)));
    }

    #[test]
    fn test_list_request_blank_query_ignored() {
        let req = ListFilesRequest::new(1).with_query(Some("   ".to_string()));
        assert!(req.query.is_none());
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let now = Utc::now();
        let row = ScheduledDeletion {
            id: 1,
            file_id: 1,
            job_token: Uuid::now_v7(),
            created_at: now,
            fire_at: now - Duration::seconds(5),
            attempts: 0,
            last_error: None,
        };
        assert_eq!(row.remaining(now), std::time::Duration::ZERO);

        let later = ScheduledDeletion {
            fire_at: now + Duration::seconds(10),
            ..row
        };
        assert_eq!(later.remaining(now), std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_favorite_toggle_serialization() {
        let toggle = FavoriteToggle::Removed(Favorite {
            id: 3,
            owner_id: 1,
            file_id: 9,
        });
        let json = serde_json::to_value(&toggle).unwrap();
        assert_eq!(json["action"], "removed");
        assert_eq!(json["favorite"]["file_id"], 9);
        assert_eq!(toggle.favorite().id, 3);
    }
}
