use chrono::Utc;
use clap::Subcommand;
use focusforge_core::fitness::fitness_series;
use focusforge_core::storage::{Config, Database};

#[derive(Subcommand)]
pub enum FitnessAction {
    /// Daily focus-fitness series over the trailing window
    Show {
        #[arg(long, default_value = "local")]
        owner: String,
        /// Override the configured window length
        #[arg(long)]
        days: Option<u32>,
    },
}

pub fn run(action: FitnessAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        FitnessAction::Show { owner, days } => {
            let db = Database::open()?;
            let mut fitness_config = Config::load_or_default().fitness;
            if let Some(days) = days {
                fitness_config.window_days = days;
            }
            let sessions = db.sessions_for(&owner)?;
            let series = fitness_series(&sessions, Utc::now(), &fitness_config);
            println!("{}", serde_json::to_string_pretty(&series)?);
        }
    }
    Ok(())
}
