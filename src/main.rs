use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bracket_engine::api::state::AppState;
use bracket_engine::config::AppConfig;
use bracket_engine::engine::bracket::SeedOptions;
use bracket_engine::engine::roster::RosterImport;
use bracket_engine::engine::schedule::ScheduleRequest;
use bracket_engine::engine::Engine;
use bracket_engine::models::TournamentId;
use bracket_engine::storage::{StorageConfig, Store};

#[derive(Parser)]
#[command(name = "bracket-engine")]
#[command(about = "Tournament progression and scheduling engine")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Import a tournament roster from a JSON file
    Import {
        /// Roster file: tournament, categories, registrations, users
        file: PathBuf,
    },

    /// Generate the bracket of a tournament
    Generate {
        tournament: String,

        /// Generate groups plus the knockout skeleton (GROUPS_KO)
        #[arg(long)]
        groups: bool,
    },

    /// Seed the knockout base round
    Seed {
        tournament: String,

        /// Replace pairings already in the base round
        #[arg(long)]
        overwrite: bool,
    },

    /// Print group standings as JSON
    Standings { tournament: String },

    /// Assign times and courts to unscheduled matches
    Schedule {
        tournament: String,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start_day: NaiveDate,

        #[arg(long)]
        courts: Option<u32>,

        #[arg(long)]
        referees: Option<u32>,

        /// Slot length in minutes
        #[arg(long)]
        duration: Option<u32>,

        /// Reschedule matches that already have a time
        #[arg(long)]
        overwrite: bool,

        /// Put the 3rd-place match ahead of the final
        #[arg(long)]
        bronze_first: bool,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        AppConfig::from_file(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        AppConfig::default()
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting bracket-engine v{}", env!("CARGO_PKG_VERSION"));

    let store = Store::open(StorageConfig::new(config.data_dir.clone()))
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    let engine = Engine::new(Arc::new(store));

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = AppState::new(engine, config);
            let app = bracket_engine::api::build_router(state);
            let addr = format!("{}:{}", host, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Import { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let roster: RosterImport = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", file.display()))?;
            print_json(&engine.import_roster(roster)?)?;
        }
        Commands::Generate { tournament, groups } => {
            let id = TournamentId::from(tournament);
            if groups {
                print_json(&engine.generate_groups_and_knockout_skeleton(&id)?)?;
            } else {
                print_json(&engine.generate_direct_knockout(&id)?)?;
            }
        }
        Commands::Seed {
            tournament,
            overwrite,
        } => {
            let options = SeedOptions {
                overwrite,
                ..SeedOptions::default()
            };
            print_json(&engine.seed_knockout(&TournamentId::from(tournament), options)?)?;
        }
        Commands::Standings { tournament } => {
            print_json(&engine.compute_standings(&TournamentId::from(tournament))?)?;
        }
        Commands::Schedule {
            tournament,
            start_day,
            courts,
            referees,
            duration,
            overwrite,
            bronze_first,
        } => {
            let request = ScheduleRequest {
                start_day: Some(start_day),
                courts,
                referees,
                duration_min: duration,
                overwrite_existing: overwrite,
                place_bronze_before_final: bronze_first,
                ..ScheduleRequest::default()
            };
            let options = request.resolve(&config.scheduling)?;
            print_json(&engine.auto_schedule(&TournamentId::from(tournament), options)?)?;
        }
    }

    Ok(())
}
