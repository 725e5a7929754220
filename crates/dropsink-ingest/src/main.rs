//! Dropsink Ingest - watched-directory batch ingestion daemon

use anyhow::Result;
use clap::Parser;
use dropsink_common::logging::{init_logging, LogConfig, LogLevel};
use dropsink_ingest::config::Config;
use dropsink_ingest::entities;
use dropsink_ingest::pool::IngestPool;
use dropsink_ingest::processor::EntityProcessor;
use dropsink_ingest::watcher::Dispatcher;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "dropsink-ingest")]
#[command(author, version, about = "Watched-directory batch ingestion daemon")]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("dropsink-ingest".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting dropsink ingestion daemon");

    let config = Config::load()?;
    let pool = IngestPool::connect(&config.database).await?;

    let shutdown = CancellationToken::new();
    let mut dispatchers = Vec::new();

    for watcher in &config.watchers {
        let entity = entities::by_name(&watcher.entity)
            .ok_or_else(|| anyhow::anyhow!("unknown entity '{}'", watcher.entity))?;

        info!(
            entity = entity.entity_name,
            directory = %watcher.watch_directory.display(),
            pattern = %watcher.file_pattern,
            "starting dispatcher"
        );

        let dispatcher = Dispatcher::new(
            pool.clone(),
            EntityProcessor::new(entity),
            watcher.watch_directory.clone(),
            &watcher.file_pattern,
        )?;
        dispatchers.push(dispatcher.spawn(shutdown.clone()));
    }

    // Block until externally interrupted.
    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");

    shutdown.cancel();
    for handle in dispatchers {
        if let Err(error) = handle.await {
            error!(%error, "dispatcher task panicked");
        }
    }
    pool.close().await;

    info!("shutdown complete");
    Ok(())
}
