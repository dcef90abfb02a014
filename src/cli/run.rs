use super::config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use timegate::clock::{Clock, SystemClock};
use timegate::gatekeeper::ExpirationSweeper;
use timegate::keepalive::{run_keepalive_server, KeepAliveState};
use timegate::store::{JsonFileBackend, Store};
use timegate::telegram::{AccessBot, BotApiClient};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Run the bot service
///
/// ## Configuration Loading
///
/// Configuration is loaded from `--config` if given, otherwise from
/// `~/.config/timegate/config.toml` when it exists, otherwise defaults.
/// Environment variables are applied on top before validation.
///
/// ## Tasks
///
/// - Telegram long-poll loop handling commands, wizards and callbacks
/// - Expiration sweeper revoking access when grants run out
/// - Optional keep-alive HTTP endpoint
///
/// Ctrl-C stops the service. The data file is written on every change, so
/// there is nothing to flush on shutdown.
pub async fn execute(config_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path.map(PathBuf::from);
    let mut config = AppConfig::load_or_default(config_path.as_deref())?;
    config.apply_env()?;

    init_tracing(&config.logging.level);
    config.validate()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(Store::new(
        JsonFileBackend::new(&config.storage.data_file),
        config.document_seed(clock.now()),
    ));

    // Fail fast on an unreadable data file rather than on the first update
    let doc = store.load().await?;
    info!(
        data_file = %config.storage.data_file.display(),
        channels = doc.channels.len(),
        members = doc.member_count(),
        pending = doc.pending_count(),
        "Loaded access document"
    );
    if doc.global_admins.is_empty() {
        warn!("No global admins configured; only channel admins can manage channels");
    }

    let gateway = BotApiClient::new(
        &config.telegram.api_url,
        &config.telegram.token,
        config.telegram.poll_timeout_secs,
    );
    let bot_name = gateway.get_me().await.map_err(|e| {
        error!(error = %e, "Bot token rejected by the Bot API");
        e
    })?;
    info!(bot = %bot_name, "Connected to Telegram");

    let sweep_interval = config.sweep_interval()?;
    let sweeper = ExpirationSweeper::new(store.clone(), gateway.clone(), clock.clone(), sweep_interval);
    let sweeper_task = tokio::spawn(async move { sweeper.run().await });

    let keepalive_task = config.keepalive.port.map(|port| {
        let state = KeepAliveState {
            store: store.clone(),
            bot_name: bot_name.clone(),
        };
        tokio::spawn(run_keepalive_server(port, state))
    });

    let mut bot = AccessBot::new(gateway, store, clock, config.access_policy());

    tokio::select! {
        _ = bot.run() => {}
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    }

    sweeper_task.abort();
    if let Some(task) = keepalive_task {
        task.abort();
    }
    info!("Timegate stopped");
    Ok(())
}

/// Initialize tracing; RUST_LOG takes precedence over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
