//! Conversation state: what the operator's next plain-text message means.

use crate::cache::CorrelationId;

/// Per-operator conversation state.
///
/// `Idle` is never stored; an absent (or expired) entry reads as `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    /// Next text is a reply to the forwarded message `target`.
    AwaitingReplyText { target: CorrelationId },
    /// Next text is a new message to `destination_address`.
    AwaitingSendText {
        destination_address: String,
        display_name: String,
    },
    /// Next text is a phone number to send to.
    AwaitingManualAddress,
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingReplyText { target } => write!(f, "awaiting_reply_text({target})"),
            Self::AwaitingSendText {
                destination_address,
                ..
            } => write!(f, "awaiting_send_text({destination_address})"),
            Self::AwaitingManualAddress => write!(f, "awaiting_manual_address"),
        }
    }
}

/// What the orchestrator should do with a plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOutcome {
    /// No conversation in progress; drop the text silently.
    Ignored,
    /// Send `text` to `destination_address`. The state is already cleared.
    Relay {
        destination_address: String,
        display_name: String,
        text: String,
    },
    /// The reply target expired; nothing is sent and the state is cleared.
    TargetExpired { target: CorrelationId },
    /// A typed address was accepted; now awaiting the message text.
    AddressAccepted {
        destination_address: String,
        display_name: String,
    },
    /// The typed address had no digits; still awaiting an address.
    InvalidAddress,
}

/// Result of an explicit cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    NothingToCancel,
    Cancelled(ConversationState),
}
