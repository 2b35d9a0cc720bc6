use cue_ledger::{
    config,
    core::{BackupScheduler, LedgerStore, records},
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load settings (config file, then environment overrides)
    let app_config = config::load_app_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Open the ledger store
    let store = LedgerStore::open(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to open ledger store: {}", e))?
        .with_default_operator(&app_config.default_operator);

    let stats = records::ledger_stats(store.connection()).await?;
    info!(
        members = stats.member_count,
        recharges = stats.recharge_count,
        consumes = stats.consume_count,
        "Ledger ready"
    );

    // 5. Start periodic backups; the first one runs immediately
    let scheduler = BackupScheduler::new(store.clone(), &app_config.backup);
    scheduler.start().await;

    // 6. Run until Ctrl-C
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");

    scheduler.stop().await;
    drop(scheduler);
    store.close().await?;
    Ok(())
}
