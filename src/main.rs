use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use relay_bridge::bridge::{Bridge, BridgeDeps, BridgeSettings};
use relay_bridge::channels::{
    ConsoleSource, ControlNetwork, GatewaySource, SourceNetwork, TelegramControl,
};
use relay_bridge::config::{BridgeConfig, ConfigPatch, ConfigStore, JsonFileConfigStore};

/// Stderr logging, plus a daily-rolling file when `log_dir` is set.
///
/// The returned guard must live as long as the process or buffered file
/// output is lost.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "relay-bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BridgeConfig::from_env().context("Invalid environment configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("📨 Relay Bridge v{}", env!("CARGO_PKG_VERSION"));

    // ── Persisted settings ──────────────────────────────────────────────
    let store = Arc::new(JsonFileConfigStore::new(&config.config_path));
    let mut persisted = store
        .load()
        .await
        .with_context(|| format!("Failed to load {}", store.path().display()))?;

    if persisted.control_channel_id.is_none() {
        if let Some(chat_id) = &config.control_chat_id {
            let patch = ConfigPatch {
                control_channel_id: Some(chat_id.clone()),
                ..Default::default()
            };
            persisted.apply(&patch);
            if let Err(e) = store.save(&persisted).await {
                tracing::warn!(error = %e, "Could not persist control channel from TELEGRAM_CHAT_ID");
            }
        }
    }

    eprintln!("   Config: {}", store.path().display());
    eprintln!(
        "   Control channel: {}",
        persisted
            .control_channel_id
            .as_deref()
            .unwrap_or("(none yet, send /start to the bot)")
    );
    eprintln!(
        "   Auto-reply: {}",
        if persisted.auto_reply.enabled { "on" } else { "off" }
    );

    // ── Source network ──────────────────────────────────────────────────
    let source: Arc<dyn SourceNetwork> = match &config.gateway_url {
        Some(url) => {
            eprintln!("   Source: gateway ({url})");
            Arc::new(GatewaySource::new(url, config.gateway_token.clone()))
        }
        None => {
            eprintln!("   Source: console (set RELAY_GATEWAY_URL for a real gateway)");
            Arc::new(ConsoleSource::new())
        }
    };

    // ── Control network ─────────────────────────────────────────────────
    eprintln!(
        "   Telegram: allowed {}\n",
        if config.allowed_users.iter().any(|u| u == "*") {
            "everyone".to_string()
        } else {
            config.allowed_users.join(", ")
        }
    );
    let control = Arc::new(TelegramControl::new(
        config.telegram_token.clone(),
        config.allowed_users.clone(),
    ));
    control
        .health_check()
        .await
        .context("Telegram bot token rejected")?;

    let bridge = Arc::new(Bridge::new(
        BridgeDeps {
            source,
            control,
            config_store: store,
        },
        BridgeSettings::from(&config),
        persisted,
    ));

    bridge.run().await?;
    Ok(())
}
