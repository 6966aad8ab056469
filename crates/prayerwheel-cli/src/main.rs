use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "prayerwheel-cli", version, about = "Digital prayer wheel CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spin, pause, suspend and resume the wheel
    Wheel {
        #[command(subcommand)]
        action: commands::wheel::WheelAction,
    },
    /// Daily and lifetime counters
    Counter {
        #[command(subcommand)]
        action: commands::counter::CounterAction,
    },
    /// Practice history and statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Devotion type selection
    Devotion {
        #[command(subcommand)]
        action: commands::devotion::DevotionAction,
    },
    /// Rotation speed
    Speed {
        #[command(subcommand)]
        action: commands::speed::SpeedAction,
    },
    /// Companion store sync
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PRAYERWHEEL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Wheel { action } => commands::wheel::run(action),
        Commands::Counter { action } => commands::counter::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Devotion { action } => commands::devotion::run(action),
        Commands::Speed { action } => commands::speed::run(action),
        Commands::Sync { action } => commands::sync::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
