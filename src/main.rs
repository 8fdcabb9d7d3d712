//! Chronos all-in-one service
//!
//! Runs ingest, the indexer and the search coordinator in one process,
//! connected by the in-process bus:
//!
//! ```text
//! POST /ingest ──► bus ──► Indexer ──► MemTable ──► segments ◄── GET /search
//! ```
//!
//! Run with: cargo run --bin chronos -- --config config.toml
//!
//! On Ctrl+C / SIGTERM the HTTP server drains, the bus closes, and the
//! indexer consumes what is left and writes a final segment.

use chronos::api::{serve, shutdown_signal, AppState};
use chronos::bus;
use chronos::config::{generate_default_config, Config, ConfigError, LoggingConfig};
use chronos::indexer::Indexer;
use chronos::storage::open_backend;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "chronos")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log-event storage and search service")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a commented default config and exit
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    // Until the configured subscriber exists, config diagnostics go to a
    // plain stderr one
    let config = tracing::subscriber::with_default(bootstrap_subscriber(), || {
        let config = match &args.config {
            Some(path) => Config::load_with_env(path)?,
            None => Config::load_default()?.0,
        };
        config.validate()?;
        Ok::<_, ConfigError>(config)
    })?;

    init_logging(&config.logging);

    tracing::info!("Chronos v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Segment store: {}", config.storage.backend.describe());

    // Storage
    let backend = open_backend(&config.storage.backend)?;
    backend.ensure_container().await?;

    // Indexer fed by the in-process bus
    let (producer, mut consumer) = bus::channel(config.indexer.bus_capacity);
    let mut indexer = Indexer::new(
        Arc::clone(&backend),
        config.storage.key_generator()?,
        config.indexer.policy()?,
    )
    .flush_on_shutdown(config.indexer.flush_on_shutdown);

    let state = AppState::new(Arc::clone(&backend), config.api.clone())
        .with_ingest(Arc::new(producer))
        .with_indexer_stats(indexer.stats());

    // Runs until every producer is gone, i.e. after the server has drained
    let indexer_task =
        tokio::spawn(async move { indexer.run(&mut consumer, std::future::pending()).await });

    serve(state, &config.api, shutdown_signal()).await?;

    let stats = indexer_task.await??;
    tracing::info!(
        events = stats.events_indexed,
        flushes = stats.flushes,
        flush_failures = stats.flush_failures,
        malformed = stats.malformed_payloads,
        "Chronos stopped"
    );

    Ok(())
}

fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chronos=info")),
        )
        .with_writer(std::io::stderr)
        .finish()
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chronos={},tower_http=info", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
