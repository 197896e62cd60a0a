use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

/// Guild bot core: per-guild stores, scheduled jobs, and feature modules.
#[derive(Parser, Debug)]
#[command(name = "scrib-bot", version)]
struct Args {
    /// Path to scrib.toml (default: ~/.scrib/scrib.toml).
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    // load config: explicit path > SCRIB_CONFIG env > ~/.scrib/scrib.toml
    let config_path = args
        .config
        .or_else(|| std::env::var("SCRIB_CONFIG").ok());
    let config = scrib_core::ScribConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({e}), using defaults");
        scrib_core::ScribConfig::default()
    });

    if config.bot.token.is_none() {
        info!("no bot token configured; running without a chat transport");
    }

    let stores = Arc::new(scrib_store::StoreManager::new(
        config.storage.guild_data_root.clone(),
    )?);
    let scheduler = Arc::new(scrib_scheduler::Scheduler::new());
    let notifier: Arc<dyn scrib_modules::Notifier> = Arc::new(scrib_modules::LogNotifier);

    let modules = scrib_modules::Modules::new(Arc::clone(&stores), Arc::clone(&scheduler), notifier);
    modules.rebuild_all_guilds()?;
    info!(jobs = scheduler.len(), "job rebuild complete, scheduler running");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    scheduler.clear();
    Ok(())
}
