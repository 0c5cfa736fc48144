use anyhow::Context;
use clap::Parser;
use packmark_client::UpstreamClient;
use packmark_indexer::sync::{SyncError, SyncOrchestrator, SyncState, Trigger};
use packmark_indexer::{Config, IndexStorage, init_logger_with_file};
use std::time::Duration;

/// Local order index for marking-code workflows
#[derive(Debug, Parser)]
#[command(name = "packmark-indexer", version, about)]
struct Args {
    /// Run a single sync pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!("packmark-indexer starting...");

    if config.upstream_token.trim().is_empty() {
        anyhow::bail!("UPSTREAM_TOKEN is not set");
    }

    let storage = IndexStorage::open(&config.index_path)
        .with_context(|| format!("failed to open index at {}", config.index_path))?;
    let stats = storage.stats()?;
    tracing::info!(
        orders = stats.orders,
        open_orders = stats.open_orders,
        position_rows = stats.position_rows,
        path = %config.index_path,
        "index opened"
    );

    let client = UpstreamClient::new(config.client_config())?;
    let orchestrator = SyncOrchestrator::new(&client, &storage, config.sync_options());
    let mut state = SyncState::default();

    if args.once {
        let report = orchestrator.run(&mut state, Trigger::Manual).await?;
        for warning in &report.warnings {
            tracing::warn!("{warning}");
        }
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sync_interval_secs));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                match orchestrator.run(&mut state, Trigger::Automatic).await {
                    Ok(report) => {
                        for warning in &report.warnings {
                            tracing::warn!("{warning}");
                        }
                    }
                    Err(SyncError::CoolingDown { remaining_secs }) => {
                        tracing::debug!(remaining_secs, "sync still cooling down");
                    }
                    Err(e) => {
                        tracing::error!("sync run failed: {e}");
                    }
                }
            }
        }
    }

    tracing::info!(
        runs = state.runs,
        orders_indexed = state.orders_indexed,
        "packmark-indexer stopped"
    );
    Ok(())
}
