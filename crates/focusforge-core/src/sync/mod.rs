//! Local-to-authoritative session reconciliation.
//!
//! Two stores sit behind one seam: the local [`PendingQueue`] holds
//! sessions created offline, and a [`SessionSink`] (the SQLite database
//! or the HTTP [`RemoteStore`]) is the authoritative side. The
//! [`Reconciler`] is the explicit step between them and the only writer
//! to the authoritative store.

pub mod queue;
pub mod reconciler;
pub mod remote;
pub mod types;

pub use queue::PendingQueue;
pub use reconciler::Reconciler;
pub use remote::RemoteStore;
pub use types::{
    InsertOutcome, SessionSink, SessionSyncResult, SyncOutcome, SyncReport, SyncStatus,
};
