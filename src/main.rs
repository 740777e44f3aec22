//! Arbitrage engine entry point
//!
//! 1. Loads `.env` and configuration
//! 2. Connects the store and validates every exchange credential (fatal on failure)
//! 3. Runs trading cycles and the daily summary until Ctrl+C or a fatal halt

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use arb_bot::adapters::ExchangeRegistry;
use arb_bot::config::{self, constants, AppConfig, StoreBackend, SupabaseConfig};
use arb_bot::core::logging::{init_logging, sanitize};
use arb_bot::core::{runtime, CycleCoordinator};
use arb_bot::notify::{DiscordNotifier, LogNotifier, Notifier};
use arb_bot::store::{MemoryStore, Store, SupabaseStore};
use arb_bot::AppError;

async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Supabase => {
            let supabase = SupabaseConfig::from_env().context("Supabase configuration")?;
            Arc::new(SupabaseStore::new(supabase).context("Supabase client")?)
        }
        StoreBackend::Memory => {
            warn!("[STORE] In-memory store selected; nothing survives a restart");
            Arc::new(MemoryStore::new())
        }
    };
    store.ping().await.context("Store unreachable")?;
    Ok(store)
}

fn build_notifier(config: &AppConfig) -> Arc<dyn Notifier> {
    match &config.discord {
        Some(discord) => match DiscordNotifier::new(discord) {
            Ok(notifier) => {
                info!(channel = %discord.channel_id, token = %sanitize(&discord.token), "[NOTIFY] Discord sink ready");
                Arc::new(notifier)
            }
            Err(e) => {
                warn!(error = %e, "[NOTIFY] Discord sink unavailable, logging messages instead");
                Arc::new(LogNotifier)
            }
        },
        None => {
            info!("[NOTIFY] No Discord credentials, logging messages instead");
            Arc::new(LogNotifier)
        }
    }
}

async fn start() -> anyhow::Result<()> {
    let config = config::load_config_from_env().context("Configuration failed")?;
    info!(
        tokens = ?config.token_symbols(),
        threshold = config.percent_threshold,
        notify_threshold = config.notify_threshold,
        asset = %config.settlement_asset,
        "[CONFIG] Loaded"
    );
    for exchange in &config.exchanges {
        info!(
            exchange = %exchange.kind,
            url = %exchange.base_url,
            api_key = %sanitize(&exchange.api_key),
            fee = exchange.withdrawal_fee,
            "[CONFIG] Exchange enabled"
        );
    }
    constants::log_configuration();

    let store = connect_store(&config).await?;
    info!("[STORE] Connected");

    let registry = ExchangeRegistry::from_config(&config).context("Exchange adapter setup failed")?;
    registry
        .validate_all()
        .await
        .context("Exchange credential validation failed")?;

    let notifier = build_notifier(&config);
    let coordinator = CycleCoordinator::new(config.into_shared(), registry, store, notifier);

    info!("Arbitrage engine running. Press Ctrl+C to stop.");
    runtime::run(coordinator).await?;
    info!("[SHUTDOWN] Clean exit");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    info!("Arbitrage engine starting...");

    if let Err(e) = start().await {
        error!(error = %format!("{:#}", e), "[FATAL] Engine stopped");
        if e.downcast_ref::<AppError>().is_some_and(AppError::requires_operator) {
            error!("[FATAL] Review and clear the flags collection before restarting");
        }
        std::process::exit(1);
    }
    Ok(())
}
