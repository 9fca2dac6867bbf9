use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "focusforge-cli", version, about = "Focusforge CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and inspect completed sessions
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Aggregated profile view
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Streak values
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Level and level-table administration
    Level {
        #[command(subcommand)]
        action: commands::level::LevelAction,
    },
    /// Focus fitness time series
    Fitness {
        #[command(subcommand)]
        action: commands::fitness::FitnessAction,
    },
    /// Challenge catalog and progress
    Challenge {
        #[command(subcommand)]
        action: commands::challenge::ChallengeAction,
    },
    /// Reconcile pending sessions into the authoritative store
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Engine configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action),
        Commands::Profile { action } => commands::profile::run(action),
        Commands::Streak { action } => commands::streak::run(action),
        Commands::Level { action } => commands::level::run(action),
        Commands::Fitness { action } => commands::fitness::run(action),
        Commands::Challenge { action } => commands::challenge::run(action),
        Commands::Sync { action } => commands::sync::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
