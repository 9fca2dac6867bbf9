use chrono::Utc;
use clap::Subcommand;
use focusforge_core::storage::{Config, Database};
use focusforge_core::StreakCalculator;

#[derive(Subcommand)]
pub enum StreakAction {
    /// Current daily/weekly and best daily streaks
    Show {
        #[arg(long, default_value = "local")]
        owner: String,
    },
}

pub fn run(action: StreakAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        StreakAction::Show { owner } => {
            let db = Database::open()?;
            let config = Config::load_or_default();
            let sessions = db.sessions_for(&owner)?;
            let cached = db.cached_best_streak(&owner)?;
            let summary = StreakCalculator::new(config.streak.weekly_threshold)
                .summarize(&sessions, Utc::now(), cached);
            db.record_best_streak(&owner, summary.best_daily)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
