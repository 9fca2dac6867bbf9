use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusforge_core::storage::Database;
use focusforge_core::{PendingQueue, Session, SessionMode};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Record a completed session into the local pending queue
    Log {
        #[arg(long, default_value = "local")]
        owner: String,
        /// "focus" or "break"
        #[arg(long, default_value = "focus")]
        mode: String,
        /// Duration in seconds
        #[arg(long)]
        duration_secs: u32,
        #[arg(long)]
        tag: Option<String>,
        /// Completion time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// List durably stored sessions
    List {
        #[arg(long, default_value = "local")]
        owner: String,
    },
    /// Administrative bulk clear; cascades into cached aggregates
    Clear {
        #[arg(long, default_value = "local")]
        owner: String,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Log {
            owner,
            mode,
            duration_secs,
            tag,
            at,
        } => {
            let completed_at = match at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc),
                None => Utc::now(),
            };
            let session = Session::new(
                owner,
                SessionMode::parse(&mode)?,
                duration_secs,
                tag,
                completed_at,
            )?;
            let mut queue = PendingQueue::new();
            queue.load()?;
            queue.enqueue(session.clone());
            queue.persist()?;
            println!("Session queued: {} ({} pending)", session.id, queue.len());
        }
        SessionAction::List { owner } => {
            let db = Database::open()?;
            let sessions = db.sessions_for(&owner)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Clear { owner } => {
            let mut db = Database::open()?;
            db.clear_owner(&owner)?;
            println!("Cleared all sessions and cached aggregates for '{owner}'");
        }
    }
    Ok(())
}
