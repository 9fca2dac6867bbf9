//! Local pending queue for offline-created sessions.
//!
//! Sessions land here the moment a timer completes and stay until the
//! reconciler has durably merged them into the authoritative store.
//! Derived aggregates never read from this queue. The queue is keyed by
//! the client-generated session id, so re-enqueueing the same session is
//! a no-op and a retry of a half-synced batch cannot double-insert.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{Session, SyncState};
use crate::storage::data_dir;

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    pending: HashMap<Uuid, Session>,
}

/// Persistent queue of sessions awaiting reconciliation.
pub struct PendingQueue {
    pending: HashMap<Uuid, Session>,
    queue_file: PathBuf,
}

impl PendingQueue {
    /// Create a queue backed by the default data directory.
    pub fn new() -> Self {
        let dir = data_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new_with_path(dir.join("pending_sessions.json"))
    }

    /// Create a queue with a specific backing file (for testing).
    pub fn new_with_path(path: PathBuf) -> Self {
        Self {
            pending: HashMap::new(),
            queue_file: path,
        }
    }

    /// Enqueue a locally completed session. Idempotent by session id.
    pub fn enqueue(&mut self, mut session: Session) {
        session.sync_state = SyncState::Pending;
        self.pending.entry(session.id).or_insert(session);
    }

    /// Snapshot of everything still pending.
    pub fn pending(&self) -> Vec<Session> {
        self.pending.values().cloned().collect()
    }

    /// Drop sessions the store has accepted, correlated by client id.
    pub fn mark_synced(&mut self, ids: &[Uuid]) {
        for id in ids {
            self.pending.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Persist the queue to disk.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn persist(&self) -> Result<(), std::io::Error> {
        let file = QueueFile {
            pending: self.pending.clone(),
        };
        let data = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.queue_file, data)?;
        Ok(())
    }

    /// Load the queue from disk; a missing file is an empty queue.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&mut self) -> Result<(), std::io::Error> {
        if !self.queue_file.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.queue_file)?;
        let file: QueueFile = serde_json::from_str(&content)?;
        self.pending = file.pending;
        Ok(())
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMode;
    use chrono::Utc;

    fn session() -> Session {
        Session::new("alice", SessionMode::Focus, 1500, None, Utc::now()).unwrap()
    }

    #[test]
    fn enqueue_is_idempotent_by_id() {
        let mut queue = PendingQueue::new_with_path(PathBuf::from("/tmp/unused.json"));
        let s = session();
        queue.enqueue(s.clone());
        queue.enqueue(s.clone());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn mark_synced_removes_by_id() {
        let mut queue = PendingQueue::new_with_path(PathBuf::from("/tmp/unused.json"));
        let a = session();
        let b = session();
        queue.enqueue(a.clone());
        queue.enqueue(b.clone());
        queue.mark_synced(&[a.id]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pending()[0].id, b.id);
    }

    #[test]
    fn persist_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        let mut queue = PendingQueue::new_with_path(path.clone());
        let s = session();
        queue.enqueue(s.clone());
        queue.persist().unwrap();

        let mut loaded = PendingQueue::new_with_path(path);
        loaded.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.pending()[0].id, s.id);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = PendingQueue::new_with_path(dir.path().join("absent.json"));
        queue.load().unwrap();
        assert!(queue.is_empty());
    }
}
