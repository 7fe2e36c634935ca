//! Collaborator interfaces for the two networks the bridge sits between.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Stable identity of a human operator on the control network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperatorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OperatorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Source network ──────────────────────────────────────────────────

/// A message received on the source network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Chat the message arrived in (the contact, or the group).
    pub source_address: String,
    pub is_group: bool,
    /// Group name for group chats, otherwise the contact's name.
    pub display_name: String,
    pub body: String,
    /// Opaque handle for [`SourceNetwork::fetch_media`], when media is attached.
    pub media_ref: Option<String>,
}

impl InboundMessage {
    pub fn new(source_address: &str, display_name: &str, body: &str) -> Self {
        Self {
            source_address: source_address.to_string(),
            is_group: false,
            display_name: display_name.to_string(),
            body: body.to_string(),
            media_ref: None,
        }
    }

    pub fn in_group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn with_media(mut self, media_ref: &str) -> Self {
        self.media_ref = Some(media_ref.to_string());
        self
    }

    pub fn has_media(&self) -> bool {
        self.media_ref.is_some()
    }
}

/// Connection state reported by the source network client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Connecting,
    Disconnected(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "CONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Disconnected(reason) if reason.is_empty() => write!(f, "DISCONNECTED"),
            Self::Disconnected(reason) => write!(f, "DISCONNECTED ({reason})"),
        }
    }
}

/// Something that happened on the source network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Message(InboundMessage),
    StateChanged(ConnectionState),
}

/// A chat the operator can pick in the contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub is_group: bool,
}

/// Downloaded attachment bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

/// How an attachment is presented on the control network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Photo
        } else if mime_type.starts_with("video/") {
            Self::Video
        } else if mime_type.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Document
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Photo => "📷",
            Self::Video => "🎥",
            Self::Audio => "🎵",
            Self::Document => "📎",
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            Self::Photo => "photo.jpg",
            Self::Video => "video.mp4",
            Self::Audio => "audio.mp3",
            Self::Document => "file",
        }
    }
}

pub type SourceStream = Pin<Box<dyn Stream<Item = SourceEvent> + Send>>;

/// The network inbound messages come from.
#[async_trait]
pub trait SourceNetwork: Send + Sync {
    fn name(&self) -> &str;

    /// Start receiving. Messages sent by the bridge's own account are not emitted.
    async fn start(&self) -> Result<SourceStream, ChannelError>;

    /// Single best-effort send.
    async fn send(&self, address: &str, text: &str) -> Result<(), ChannelError>;

    async fn list_contacts(&self) -> Result<Vec<Contact>, ChannelError>;

    async fn connection_state(&self) -> ConnectionState;

    async fn fetch_media(&self, media_ref: &str) -> Result<Media, ChannelError>;

    /// Turn a bare phone number into a direct-chat address. Must leave
    /// already-complete addresses unchanged.
    fn direct_address(&self, number: &str) -> String {
        number.to_string()
    }
}

// ── Control network ─────────────────────────────────────────────────

/// An inline button: label plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub payload: String,
}

impl Button {
    pub fn new(text: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of inline buttons.
pub type Keyboard = Vec<Vec<Button>>;

/// What the operator did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    /// `/name args…`
    Command { name: String, args: String },
    /// Inline button tap. `callback_id` is used to acknowledge the tap.
    ButtonPress { callback_id: String, payload: String },
    FreeText { text: String },
}

/// An operator action together with who did it and where to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    pub operator: OperatorId,
    /// Chat the action came from; acknowledgements go back here.
    pub chat_id: String,
    pub action: ControlAction,
}

pub type ControlStream = Pin<Box<dyn Stream<Item = ControlEvent> + Send>>;

/// The network the operator works from.
#[async_trait]
pub trait ControlNetwork: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<ControlStream, ChannelError>;

    /// Send a text message, optionally with inline buttons.
    async fn notify(
        &self,
        chat_id: &str,
        text: &str,
        buttons: Option<Keyboard>,
    ) -> Result<(), ChannelError>;

    async fn send_media(
        &self,
        chat_id: &str,
        kind: MediaKind,
        data: Vec<u8>,
        file_name: &str,
        caption: &str,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button tap, optionally with a toast or alert.
    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
