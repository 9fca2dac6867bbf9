use chrono::Utc;
use clap::Subcommand;
use focusforge_core::storage::{Config, Database};
use focusforge_core::sync::SyncStatus;
use focusforge_core::{PendingQueue, Reconciler, RemoteStore};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Reconcile the pending queue into the authoritative store
    Run {
        #[arg(long, default_value = "local")]
        owner: String,
        /// Sync against a remote server instead of the local database
        #[arg(long)]
        server: Option<String>,
    },
    /// Show pending-queue status and the last reconciliation time
    Status {
        #[arg(long, default_value = "local")]
        owner: String,
    },
}

pub fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SyncAction::Run { owner, server } => {
            let config = Config::load_or_default();
            let mut queue = PendingQueue::new();
            queue.load()?;

            let db = Database::open()?;
            let report = match server {
                Some(url) => {
                    // The remote store blocks on an ambient tokio runtime.
                    let runtime = tokio::runtime::Runtime::new()?;
                    let _guard = runtime.enter();
                    let store = RemoteStore::new(url);
                    Reconciler::new(&store, &owner, &config.sync).reconcile(&mut queue)
                }
                None => Reconciler::new(&db, &owner, &config.sync).reconcile(&mut queue),
            };
            db.record_last_sync(&owner, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        SyncAction::Status { owner } => {
            let mut queue = PendingQueue::new();
            queue.load()?;
            let db = Database::open()?;
            let status = SyncStatus {
                last_sync_at: db.last_sync(&owner)?,
                pending_count: queue.len(),
            };
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}
