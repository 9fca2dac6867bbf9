use chrono::Utc;
use clap::Subcommand;
use focusforge_core::storage::{Config, Database};
use focusforge_core::{backfill, derive_profile};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Full aggregated profile for one owner
    Show {
        #[arg(long, default_value = "local")]
        owner: String,
    },
    /// Pre-populate cached aggregates for a set of owners
    Backfill {
        #[arg(long, required = true)]
        owner: Vec<String>,
    },
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;
    let config = Config::load_or_default();

    match action {
        ProfileAction::Show { owner } => {
            let profile = derive_profile(&mut db, &owner, Utc::now(), &config)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileAction::Backfill { owner } => {
            let count = backfill(&mut db, &owner, Utc::now(), &config)?;
            println!("Backfilled {count} owner(s)");
        }
    }
    Ok(())
}
