//! Per-operator conversation tracking.
//!
//! Decides whether an operator's plain-text message is a reply to a forwarded
//! message, a new message to a chosen contact, or a typed phone number.

pub mod address;
pub mod state;

use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{CorrelationCache, CorrelationId, ExpiringStore, Sweep};
use crate::channels::OperatorId;

pub use address::{DEFAULT_COUNTRY_CODE, normalize_number};
pub use state::{CancelOutcome, ConversationState, TextOutcome};

/// Pending conversations are forgotten after this much inactivity.
pub const CONVERSATION_TTL: Duration = Duration::from_secs(10 * 60);

/// At most one [`ConversationState`] per operator, each expiring after
/// [`CONVERSATION_TTL`].
pub struct Conversations {
    states: ExpiringStore<OperatorId, ConversationState>,
    ttl: Duration,
    country_code: String,
}

impl Conversations {
    pub fn new(country_code: impl Into<String>) -> Self {
        Self::with_ttl(country_code, CONVERSATION_TTL)
    }

    pub fn with_ttl(country_code: impl Into<String>, ttl: Duration) -> Self {
        Self {
            states: ExpiringStore::new("conversation"),
            ttl,
            country_code: country_code.into(),
        }
    }

    /// Current state; `Idle` when none is stored or it expired.
    pub fn current(&self, operator: &OperatorId) -> ConversationState {
        self.states.get(operator).unwrap_or_default()
    }

    /// Operator tapped "reply" on a forwarded message.
    pub fn begin_reply(&self, operator: &OperatorId, target: CorrelationId) {
        self.set(operator, ConversationState::AwaitingReplyText { target });
    }

    /// Operator picked a contact to write to.
    pub fn begin_send(&self, operator: &OperatorId, destination_address: &str, display_name: &str) {
        self.set(
            operator,
            ConversationState::AwaitingSendText {
                destination_address: destination_address.to_string(),
                display_name: display_name.to_string(),
            },
        );
    }

    /// Operator chose to type a phone number.
    pub fn begin_manual_address(&self, operator: &OperatorId) {
        self.set(operator, ConversationState::AwaitingManualAddress);
    }

    /// A reply to `target` was sent some other way (e.g. a quick reply);
    /// drop the pending reply for it. Other states are left alone.
    pub fn finish_reply(&self, operator: &OperatorId, target: CorrelationId) -> bool {
        let finished = self
            .states
            .take_if(operator, |state| {
                matches!(state, ConversationState::AwaitingReplyText { target: t } if *t == target)
            })
            .is_some();
        if finished {
            debug!(operator = %operator, correlation_id = %target, "Pending reply completed");
        }
        finished
    }

    /// Explicit cancel.
    pub fn cancel(&self, operator: &OperatorId) -> CancelOutcome {
        match self.states.take(operator) {
            Some(previous) => {
                info!(operator = %operator, state = %previous, "Conversation cancelled");
                CancelOutcome::Cancelled(previous)
            }
            None => CancelOutcome::NothingToCancel,
        }
    }

    /// Interpret a plain-text message from `operator`.
    ///
    /// Reply and send states are consumed here whatever the later relay
    /// outcome is; a reply whose target expired fails closed.
    pub fn on_text(
        &self,
        operator: &OperatorId,
        text: &str,
        correlations: &CorrelationCache,
    ) -> TextOutcome {
        let Some(state) = self.states.take(operator) else {
            return TextOutcome::Ignored;
        };
        debug!(operator = %operator, state = %state, "Consuming conversation state");

        match state {
            ConversationState::Idle => TextOutcome::Ignored,
            ConversationState::AwaitingReplyText { target } => match correlations.resolve(target) {
                Some(entry) => TextOutcome::Relay {
                    destination_address: entry.destination_address,
                    display_name: entry.display_name,
                    text: text.to_string(),
                },
                None => TextOutcome::TargetExpired { target },
            },
            ConversationState::AwaitingSendText {
                destination_address,
                display_name,
            } => TextOutcome::Relay {
                destination_address,
                display_name,
                text: text.to_string(),
            },
            ConversationState::AwaitingManualAddress => {
                match normalize_number(text, &self.country_code) {
                    Some(number) => {
                        self.begin_send(operator, &number, &number);
                        TextOutcome::AddressAccepted {
                            destination_address: number.clone(),
                            display_name: number,
                        }
                    }
                    None => {
                        self.begin_manual_address(operator);
                        TextOutcome::InvalidAddress
                    }
                }
            }
        }
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    fn set(&self, operator: &OperatorId, state: ConversationState) {
        debug!(operator = %operator, state = %state, "Conversation state set");
        self.states.put(operator.clone(), state, self.ttl);
    }
}

impl Sweep for Conversations {
    fn sweep(&self) -> usize {
        self.states.purge_expired()
    }
}
