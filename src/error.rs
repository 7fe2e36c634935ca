//! Error types for the relay bridge.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by either network client.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Send on channel {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Failures surfaced to the operator while handling a single event.
///
/// None of these are fatal; the orchestrator converts each one into a single
/// acknowledgement and moves on to the next event.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{what} {id} not found or expired")]
    NotFound { what: &'static str, id: String },

    #[error("Send to {destination} failed: {source}")]
    SendFailure {
        destination: String,
        #[source]
        source: ChannelError,
    },

    #[error("Failed to save configuration: {0}")]
    ConfigWriteFailure(#[source] ConfigError),

    #[error("Source network not connected (state: {state})")]
    Disconnected { state: String },
}

impl BridgeError {
    /// Short text shown to the operator on the control network.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { what, id } => format!(
                "❌ {what} `{id}` not found or already expired.\nUse /list to see recent messages."
            ),
            Self::SendFailure { destination, .. } => format!(
                "❌ Failed to send to {destination}. Make sure the source network is still connected."
            ),
            Self::ConfigWriteFailure(_) => {
                "⚠️ Setting applied, but it could not be saved to disk.".to_string()
            }
            Self::Disconnected { state } => {
                format!("❌ Source network is disconnected (state: {state}).")
            }
        }
    }
}

/// Result type alias for the bridge.
pub type Result<T> = std::result::Result<T, Error>;
