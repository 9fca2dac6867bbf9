//! Reconciliation of the local pending queue into an authoritative store.
//!
//! The reconciler is the only writer to the authoritative store. Each
//! session is merged independently: acceptance is all-or-nothing per
//! session, the batch tolerates partial failure, and a duplicate
//! (owner, id) is already-applied rather than an error. Transient
//! failures get a bounded retry with exponential backoff; no lock is held
//! across a retry because every insert is independently idempotent, so
//! concurrent batches from racing devices are safe.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, SyncError};
use crate::session::Session;
use crate::storage::SyncConfig;
use crate::sync::queue::PendingQueue;
use crate::sync::types::{InsertOutcome, SessionSink, SessionSyncResult, SyncOutcome, SyncReport};

/// Merges pending sessions into an authoritative store exactly once.
pub struct Reconciler<'a, S: SessionSink> {
    store: &'a S,
    /// Externally verified owner identity; client-supplied owners on the
    /// sessions themselves are never trusted for writes.
    owner: String,
    max_attempts: u32,
    base_backoff: Duration,
}

impl<'a, S: SessionSink> Reconciler<'a, S> {
    pub fn new(store: &'a S, owner: impl Into<String>, config: &SyncConfig) -> Self {
        Self {
            store,
            owner: owner.into(),
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
        }
    }

    /// Reconcile everything pending in `queue`. Accepted sessions are
    /// removed from the queue (marked synced by client id); rejected ones
    /// stay pending for a later retry and are reported to the caller.
    pub fn reconcile(&self, queue: &mut PendingQueue) -> SyncReport {
        let batch = queue.pending();
        info!(count = batch.len(), owner = %self.owner, "reconciling pending sessions");

        let mut report = SyncReport::default();
        let mut synced: Vec<Uuid> = Vec::new();

        for session in &batch {
            let outcome = self.reconcile_one(session);
            if !matches!(outcome, SyncOutcome::Rejected { .. }) {
                synced.push(session.id);
            }
            report.results.push(SessionSyncResult {
                id: session.id,
                outcome,
            });
        }

        queue.mark_synced(&synced);
        if let Err(e) = queue.persist() {
            warn!(error = %e, "failed to persist pending queue");
        }

        info!(
            accepted = report.accepted(),
            already_applied = report.already_applied(),
            rejected = report.rejected(),
            "reconciliation finished"
        );
        report
    }

    fn reconcile_one(&self, session: &Session) -> SyncOutcome {
        if session.owner != self.owner {
            warn!(id = %session.id, "session owner does not match verified identity");
            return SyncOutcome::Rejected {
                reason: format!(
                    "owner '{}' does not match verified identity '{}'",
                    session.owner, self.owner
                ),
            };
        }

        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match self.store.insert(session) {
                Ok(InsertOutcome::Inserted) => {
                    debug!(id = %session.id, attempt, "session accepted");
                    return SyncOutcome::Accepted;
                }
                Ok(InsertOutcome::AlreadyApplied) => {
                    debug!(id = %session.id, "session already applied");
                    return SyncOutcome::AlreadyApplied;
                }
                Err(e) if is_transient(&e) && attempt < self.max_attempts => {
                    let backoff = self.base_backoff * 2u32.saturating_pow(attempt - 1);
                    debug!(id = %session.id, attempt, error = %e, backoff_ms = backoff.as_millis() as u64, "transient failure, backing off");
                    std::thread::sleep(backoff);
                    last_error = e.to_string();
                }
                Err(e) if is_transient(&e) => {
                    last_error = e.to_string();
                }
                Err(e) => {
                    warn!(id = %session.id, error = %e, "session rejected");
                    return SyncOutcome::Rejected {
                        reason: e.to_string(),
                    };
                }
            }
        }

        SyncOutcome::Rejected {
            reason: SyncError::RetriesExhausted {
                attempts: self.max_attempts,
                last_error,
            }
            .to_string(),
        }
    }
}

/// Failures worth retrying: the network, a busy server, a locked local
/// database. Everything else is a terminal per-session rejection.
fn is_transient(error: &SyncError) -> bool {
    matches!(
        error,
        SyncError::Network(_)
            | SyncError::RemoteApi(_)
            | SyncError::Database(DatabaseError::Locked)
    )
}
