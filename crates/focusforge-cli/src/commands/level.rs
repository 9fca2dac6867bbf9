use clap::Subcommand;
use focusforge_core::storage::Database;
use focusforge_core::{LevelCurve, LevelTier};

#[derive(Subcommand)]
pub enum LevelAction {
    /// Level, title and progress for an owner's lifetime count
    Show {
        #[arg(long, default_value = "local")]
        owner: String,
    },
    /// Print the effective level table
    Table,
    /// Replace the admin level table from a JSON file of tiers
    Replace {
        /// Path to a JSON array of {level, title, threshold}
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// Remove the admin table and fall back to the built-in curve
    Reset,
}

pub fn run(action: LevelAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;

    match action {
        LevelAction::Show { owner } => {
            let curve = db.load_level_config()?.unwrap_or_else(LevelCurve::builtin);
            let count = db.lifetime_focus_count(&owner)?;
            let info = curve.level_for(count);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        LevelAction::Table => {
            let curve = db.load_level_config()?.unwrap_or_else(LevelCurve::builtin);
            println!("{}", serde_json::to_string_pretty(curve.tiers())?);
        }
        LevelAction::Replace { file } => {
            let content = std::fs::read_to_string(&file)?;
            let tiers: Vec<LevelTier> = serde_json::from_str(&content)?;
            let curve = LevelCurve::from_tiers(tiers)?;
            db.replace_level_config(&curve)?;
            println!("Level table replaced ({} tiers)", curve.tiers().len());
        }
        LevelAction::Reset => {
            db.clear_level_config()?;
            println!("Level table reset to the built-in curve");
        }
    }
    Ok(())
}
