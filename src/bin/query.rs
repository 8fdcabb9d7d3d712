//! Chronos query tool
//!
//! Scans a segment store directly, without a running coordinator.
//!
//! ```text
//! chronos-query --source web --contains failure --data ./data
//! chronos-query --contains timeout --endpoint http://localhost:9000 --bucket chronos-segments
//! ```
//!
//! Without `--data` or `--endpoint` the backend comes from the config file.

use anyhow::{Context, Result};
use chronos::api::dto::SearchResponse;
use chronos::config::Config;
use chronos::query::Coordinator;
use chronos::storage::{open_backend, BackendConfig, RemoteConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chronos-query")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search Chronos segments from the command line")]
struct Cli {
    /// Filter by source (exact match)
    #[arg(short, long)]
    source: Option<String>,

    /// Filter by message content (substring)
    #[arg(long)]
    contains: Option<String>,

    /// Directory containing segments
    #[arg(short, long, conflicts_with = "endpoint")]
    data: Option<PathBuf>,

    /// Object store endpoint, e.g. http://localhost:9000
    #[arg(long)]
    endpoint: Option<String>,

    /// Object store bucket
    #[arg(long, default_value = "chronos-segments")]
    bucket: String,

    /// Config file used when no backend flag is given
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Segments fetched and decoded in parallel
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Print the search response as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn backend_config(&self) -> Result<BackendConfig> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(BackendConfig::Remote(RemoteConfig::new(
                endpoint.clone(),
                self.bucket.clone(),
            )));
        }
        if let Some(dir) = &self.data {
            return Ok(BackendConfig::local(dir));
        }

        let config = match &self.config {
            Some(path) => Config::load_with_env(path)?,
            None => Config::load_default()?.0,
        };
        Ok(config.storage.backend)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chronos=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let backend_config = cli.backend_config()?;
    let backend = open_backend(&backend_config)
        .with_context(|| format!("Failed to open {}", backend_config.describe()))?;

    let coordinator = Coordinator::new(backend, cli.concurrency);
    let result = coordinator
        .query(cli.source.clone(), cli.contains.clone())
        .await
        .context("Search failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&SearchResponse::from(result))?);
        return Ok(());
    }

    for m in &result.matches {
        println!("[{}] {}: {}", m.timestamp, m.source, m.message);
    }

    let stats = &result.stats;
    println!(
        "\nScanned {} events in {} segments in {:?}. Found {} matches.",
        stats.scanned_events, stats.scanned_segments, stats.duration, stats.match_count
    );
    for key in &result.unreadable {
        eprintln!("warning: skipped unreadable segment {}", key);
    }

    Ok(())
}
