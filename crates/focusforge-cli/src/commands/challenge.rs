use chrono::Utc;
use clap::Subcommand;
use focusforge_core::storage::{Config, Database};
use focusforge_core::{derive_profile, ChallengeDef, ChallengeKind};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Add a challenge to the catalog
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// total | streak | daily | weekly | monthly | recurring_monthly
        #[arg(long)]
        kind: String,
        #[arg(long)]
        target: u32,
        /// Calendar month 1-12; required for recurring_monthly
        #[arg(long)]
        month: Option<u32>,
    },
    /// List the catalog, inactive entries included
    List,
    /// Toggle a challenge's active flag
    Toggle {
        id: Uuid,
        #[arg(long)]
        active: bool,
    },
    /// Evaluate and print an owner's challenge progress
    Progress {
        #[arg(long, default_value = "local")]
        owner: String,
    },
}

pub fn run(action: ChallengeAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;

    match action {
        ChallengeAction::Add {
            name,
            description,
            kind,
            target,
            month,
        } => {
            let def =
                ChallengeDef::new(name, description, ChallengeKind::parse(&kind)?, target, month)?;
            db.upsert_challenge_def(&def)?;
            println!("Challenge created: {}", def.id);
        }
        ChallengeAction::List => {
            let defs = db.list_challenge_defs()?;
            println!("{}", serde_json::to_string_pretty(&defs)?);
        }
        ChallengeAction::Toggle { id, active } => {
            db.set_challenge_active(id, active)?;
            println!("Challenge {id} active = {active}");
        }
        ChallengeAction::Progress { owner } => {
            let config = Config::load_or_default();
            let profile = derive_profile(&mut db, &owner, Utc::now(), &config)?;
            let out = serde_json::json!({
                "active": profile.active_challenges,
                "completed": profile.completed_challenges,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
