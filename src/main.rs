use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eventlens::config::{AppConfig, LoggingConfig};
use eventlens::events::{seed, EventFilter, EventService, EventStore};

#[derive(Parser)]
#[command(
    name = "eventlens",
    about = "Security event read API: anomaly findings, detail views and summary statistics",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true, env = "EVENTLENS_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,

        /// Do not load sample events into an empty store
        #[arg(long)]
        no_seed: bool,
    },

    /// Load the sample events if the store is empty
    Seed,

    /// List stored events
    List {
        /// Only events with exactly this label
        #[arg(long)]
        label: Option<String>,

        /// Only events whose user contains this text
        #[arg(long)]
        user: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show one event in detail
    Show {
        /// Event id
        id: i64,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print summary statistics
    Stats {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Mark an event as resolved
    Resolve {
        /// Event id
        id: i64,

        /// Who resolved it
        #[arg(long)]
        by: String,
    },
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::resolve(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }

    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind, no_seed } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if no_seed {
                config.seed.enabled = false;
            }
            tracing::info!(bind = %config.server.bind, "Starting eventlens daemon");
            eventlens::serve(&config).await?;
        }
        Commands::Seed => {
            let store = eventlens::open_store(&config)?;
            let inserted = seed::seed_if_empty(&store)?;
            if inserted == 0 {
                println!("Store already holds events; nothing seeded.");
            } else {
                println!("Seeded {} sample events.", inserted);
            }
        }
        Commands::List { label, user, json } => {
            let service = EventService::new(Arc::new(eventlens::open_store(&config)?));
            let list = service.search_events(&EventFilter { label, user })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if list.is_empty() {
                println!("No events found.");
            } else {
                println!(
                    "{:<6} | {:<16} | {:<12} | {:<7} | {:<8} | Event",
                    "ID", "Timestamp", "User", "Score", "Label"
                );
                println!("{:-<6}-|-{:-<16}-|-{:-<12}-|-{:-<7}-|-{:-<8}-|-{:-<10}", "", "", "", "", "", "");
                for e in list {
                    println!(
                        "{:<6} | {:<16} | {:<12} | {:<7.2} | {:<8} | {}",
                        e.id, e.timestamp, e.user, e.anomaly_score, e.label, e.event_name
                    );
                }
            }
        }
        Commands::Show { id, json } => {
            let service = EventService::new(Arc::new(eventlens::open_store(&config)?));
            let detail = service
                .get_event_detail(id)?
                .with_context(|| format!("event {} not found", id))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                println!("\n=== Event {} ===", detail.id);
                println!("Date:     {}", detail.date);
                println!("Score:    {:.2}", detail.anomaly_score);
                println!("Incident: {}", detail.incident);
                for (key, value) in &detail.context_fields {
                    println!("  {:<10} : {}", key, value);
                }
                println!();
            }
        }
        Commands::Stats { json } => {
            let service = EventService::new(Arc::new(eventlens::open_store(&config)?));
            let stats = service.get_stats()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("\n=== Event Statistics ===");
                println!("Total events:  {}", stats.total_events);
                println!("Anomalies:     {}", stats.anomalies);
                println!("Average score: {:.2}", stats.avg_anomaly);
                println!("Highest score: {:.2}", stats.highest_score);
                println!();
            }
        }
        Commands::Resolve { id, by } => {
            let store = eventlens::open_store(&config)?;
            let now = chrono::Utc::now().naive_utc();
            let event = store
                .mark_resolved(id, &by, now)?
                .with_context(|| format!("event {} not found", id))?;
            tracing::info!(id, resolved_by = %by, "event resolved");
            println!(
                "Event {} resolved by {} at {}.",
                id,
                by,
                event
                    .resolved_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}
