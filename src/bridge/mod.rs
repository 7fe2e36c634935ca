//! Bridge orchestrator.
//!
//! Owns the caches and the conversation tracker, and connects the two
//! networks:
//!
//! - `inbound` forwards source-network messages to the control channel
//!   (cooldown-gated auto-reply first, then correlation + notification).
//! - `operator` handles commands, button taps and free text from operators,
//!   resolving each to at most one outbound send.
//!
//! Every failure is turned into a single acknowledgement at this boundary;
//! nothing here ends the process.

pub mod action;
pub mod format;
mod inbound;
mod operator;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::RwLock;

use crate::cache::{CooldownGate, CorrelationCache, Sweep, spawn_sweep_task};
use crate::channels::{ControlNetwork, Keyboard, SourceNetwork};
use crate::config::{BridgeConfig, ConfigPatch, ConfigStore, PersistedConfig};
use crate::conversation::{Conversations, DEFAULT_COUNTRY_CODE};
use crate::error::{BridgeError, ChannelError, Error};

pub use action::{ButtonAction, MenuAction};

/// How often expired cache entries are purged in the background.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Number of entries shown by `/list`.
pub const RECENT_LIMIT: usize = 10;

/// Tunables taken from the process configuration.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub auto_reply_cooldown: Duration,
    pub send_timeout: Duration,
    pub contacts_page_size: usize,
    pub default_country_code: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            auto_reply_cooldown: Duration::from_secs(60),
            send_timeout: Duration::from_secs(30),
            contacts_page_size: 8,
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
        }
    }
}

impl From<&BridgeConfig> for BridgeSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            auto_reply_cooldown: config.auto_reply_cooldown,
            send_timeout: config.send_timeout,
            contacts_page_size: config.contacts_page_size,
            default_country_code: config.default_country_code.clone(),
        }
    }
}

/// External collaborators of the bridge.
pub struct BridgeDeps {
    pub source: Arc<dyn SourceNetwork>,
    pub control: Arc<dyn ControlNetwork>,
    pub config_store: Arc<dyn ConfigStore>,
}

/// The relay between the source network and the operators.
pub struct Bridge {
    pub(crate) deps: BridgeDeps,
    pub(crate) settings: BridgeSettings,
    /// Authoritative copy of the persisted settings.
    pub(crate) config: RwLock<PersistedConfig>,
    pub(crate) correlations: Arc<CorrelationCache>,
    pub(crate) cooldown: Arc<CooldownGate>,
    pub(crate) conversations: Arc<Conversations>,
}

impl Bridge {
    pub fn new(deps: BridgeDeps, settings: BridgeSettings, config: PersistedConfig) -> Self {
        let conversations = Conversations::new(settings.default_country_code.clone());
        Self {
            deps,
            settings,
            config: RwLock::new(config),
            correlations: Arc::new(CorrelationCache::new()),
            cooldown: Arc::new(CooldownGate::new()),
            conversations: Arc::new(conversations),
        }
    }

    pub fn correlations(&self) -> &CorrelationCache {
        &self.correlations
    }

    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    /// Snapshot of the current persisted settings.
    pub async fn config(&self) -> PersistedConfig {
        self.config.read().await.clone()
    }

    /// Caches purged by the background sweep.
    pub fn sweep_targets(&self) -> Vec<Arc<dyn Sweep>> {
        vec![
            Arc::clone(&self.correlations) as Arc<dyn Sweep>,
            Arc::clone(&self.cooldown) as Arc<dyn Sweep>,
            Arc::clone(&self.conversations) as Arc<dyn Sweep>,
        ]
    }

    /// Run until Ctrl+C or until either network's event stream ends.
    ///
    /// Each stream is consumed by its own task, so the two run concurrently,
    /// while events on the same stream are handled one at a time.
    pub async fn run(self: Arc<Self>) -> Result<(), Error> {
        let mut source_events = self.deps.source.start().await?;
        let mut control_events = self.deps.control.start().await?;

        let sweeper = spawn_sweep_task(self.sweep_targets(), SWEEP_PERIOD);

        let bridge = Arc::clone(&self);
        let mut inbound = tokio::spawn(async move {
            while let Some(event) = source_events.next().await {
                bridge.handle_source_event(event).await;
            }
        });

        let bridge = Arc::clone(&self);
        let mut operator = tokio::spawn(async move {
            while let Some(event) = control_events.next().await {
                bridge.handle_control(event).await;
            }
        });

        tracing::info!(
            source = self.deps.source.name(),
            control = self.deps.control.name(),
            "Bridge ready and listening"
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down...");
            }
            _ = &mut inbound => {
                tracing::info!("Source event stream ended, shutting down...");
            }
            _ = &mut operator => {
                tracing::info!("Control event stream ended, shutting down...");
            }
        }

        inbound.abort();
        operator.abort();
        sweeper.abort();
        Ok(())
    }

    // ── Shared helpers ──────────────────────────────────────────────

    pub(crate) async fn control_channel(&self) -> Option<String> {
        self.config.read().await.control_channel_id.clone()
    }

    /// One bounded send attempt on the source network.
    pub(crate) async fn send_to_source(&self, address: &str, text: &str) -> Result<(), ChannelError> {
        let timeout = self.settings.send_timeout;
        match tokio::time::timeout(timeout, self.deps.source.send(address, text)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout {
                name: self.deps.source.name().to_string(),
                timeout,
            }),
        }
    }

    /// Relay operator text to a source-network chat.
    pub(crate) async fn relay(
        &self,
        destination_address: &str,
        display_name: &str,
        text: &str,
    ) -> Result<(), BridgeError> {
        let address = self.deps.source.direct_address(destination_address);
        match self.send_to_source(&address, text).await {
            Ok(()) => {
                tracing::info!(destination = %address, "Operator message relayed");
                Ok(())
            }
            Err(source) => {
                tracing::warn!(destination = %address, error = %source, "Relay failed");
                Err(BridgeError::SendFailure {
                    destination: display_name.to_string(),
                    source,
                })
            }
        }
    }

    /// Message the operator; delivery failures can only be logged.
    pub(crate) async fn reply(&self, chat_id: &str, text: &str, buttons: Option<Keyboard>) {
        if let Err(e) = self.deps.control.notify(chat_id, text, buttons).await {
            tracing::error!(chat_id, error = %e, "Failed to deliver message to operator");
        }
    }

    /// Apply `patch` in memory, then persist the whole in-memory config.
    ///
    /// The in-memory copy keeps the change even when the write fails, and
    /// the next successful write carries it to the store.
    pub(crate) async fn update_config(&self, patch: ConfigPatch) -> Result<(), BridgeError> {
        let mut config = self.config.write().await;
        config.apply(&patch);
        match self.deps.config_store.save(&config).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist configuration; keeping in-memory copy");
                Err(BridgeError::ConfigWriteFailure(e))
            }
        }
    }
}
