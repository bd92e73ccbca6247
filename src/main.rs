use std::sync::Arc;

use tracing_subscriber::fmt::writer::MakeWriterExt;

use rollkeeper::bot::{Bot, BotDeps};
use rollkeeper::commands::{Dispatcher, ThreadRngRoller};
use rollkeeper::config::BotConfig;
use rollkeeper::locks::LockRegistry;
use rollkeeper::network::MastodonClient;
use rollkeeper::pacing::PacingScheduler;
use rollkeeper::store::game::{BAG, GameStoreOptions};
use rollkeeper::store::{GameStore, ResilientTables, SheetsBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr and a daily-rolling file.
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let file_appender = tracing_appender::rolling::daily(&log_dir, "rollkeeper.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🎲 Rollkeeper v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Instance: {}", config.instance_url);
    eprintln!("   Sheet: {}", config.spreadsheet_id);
    eprintln!(
        "   Workers: {} / gaps: {:?} global, {:?} per account",
        config.workers, config.gap_global, config.gap_per_account
    );

    // ── Store ───────────────────────────────────────────────────────
    let mut backend = SheetsBackend::new(
        config.sheets_api_base.clone(),
        config.sheets_token.clone(),
        config.spreadsheet_id.clone(),
    );
    if let Some(ref bag_sheet) = config.bag_spreadsheet_id {
        backend = backend.with_route(BAG, bag_sheet.clone());
        eprintln!("   Inventory sheet: {bag_sheet}");
    } else {
        eprintln!("   Inventory sheet: disabled");
    }
    let tables = ResilientTables::new(Arc::new(backend), config.table_cache_ttl);
    let store = Arc::new(GameStore::new(
        tables,
        GameStoreOptions {
            timezone: config.timezone,
            config_ttl: config.config_cache_ttl,
            ledger_enabled: config.bag_spreadsheet_id.is_some(),
            user_column_with_at: config.user_column_with_at,
        },
    ));

    // ── Network ─────────────────────────────────────────────────────
    let network = Arc::new(MastodonClient::new(
        config.instance_url.clone(),
        config.access_token.clone(),
    ));

    // ── Pipeline ────────────────────────────────────────────────────
    let deps = BotDeps {
        pacing: PacingScheduler::new(config.gap_global, config.gap_per_account),
        store,
        network,
        locks: Arc::new(LockRegistry::new()),
        dispatcher: Arc::new(Dispatcher::new()),
        roller: Arc::new(ThreadRngRoller),
        config,
    };

    Bot::new(deps).run().await?;
    Ok(())
}
