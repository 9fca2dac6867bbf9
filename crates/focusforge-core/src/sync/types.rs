//! Core types for session reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;
use crate::session::Session;
use crate::storage::Database;

/// Result of inserting one session into an authoritative store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The session is now durably present.
    Inserted,
    /// A session with the same (owner, id) already existed. Not an error:
    /// this is what makes retries and overlapping device batches safe.
    AlreadyApplied,
}

/// Seam between the reconciler and an authoritative store. The local
/// SQLite store and the HTTP remote store both sit behind this.
pub trait SessionSink {
    /// Idempotent insert keyed by (owner, client-generated id).
    ///
    /// # Errors
    /// Returns an error for rejected sessions and transport failures;
    /// duplicates are the `AlreadyApplied` outcome, never an error.
    fn insert(&self, session: &Session) -> Result<InsertOutcome, SyncError>;
}

impl SessionSink for Database {
    fn insert(&self, session: &Session) -> Result<InsertOutcome, SyncError> {
        if self.insert_session(session)? {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyApplied)
        }
    }
}

/// Per-session outcome surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SyncOutcome {
    Accepted,
    AlreadyApplied,
    /// Left pending locally for a later retry.
    Rejected { reason: String },
}

/// One session's reconciliation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSyncResult {
    pub id: Uuid,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Whole-batch report. The batch tolerates partial success: one rejected
/// session never blocks the others.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub results: Vec<SessionSyncResult>,
}

impl SyncReport {
    pub fn accepted(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == SyncOutcome::Accepted)
            .count()
    }

    pub fn already_applied(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == SyncOutcome::AlreadyApplied)
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, SyncOutcome::Rejected { .. }))
            .count()
    }
}

/// Current sync status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Last successful reconciliation.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Sessions still waiting in the local queue.
    pub pending_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_by_outcome() {
        let report = SyncReport {
            results: vec![
                SessionSyncResult { id: Uuid::new_v4(), outcome: SyncOutcome::Accepted },
                SessionSyncResult { id: Uuid::new_v4(), outcome: SyncOutcome::AlreadyApplied },
                SessionSyncResult {
                    id: Uuid::new_v4(),
                    outcome: SyncOutcome::Rejected { reason: "owner mismatch".into() },
                },
            ],
        };
        assert_eq!(report.accepted(), 1);
        assert_eq!(report.already_applied(), 1);
        assert_eq!(report.rejected(), 1);
    }
}
