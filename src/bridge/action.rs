//! Inline-button payloads, decoded once at the boundary.

use crate::cache::CorrelationId;

/// Main-menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Status,
    List,
    Send,
    Contacts,
    Help,
}

impl MenuAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::List => "list",
            Self::Send => "send",
            Self::Contacts => "contacts",
            Self::Help => "help",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "status" => Some(Self::Status),
            "list" => Some(Self::List),
            "send" => Some(Self::Send),
            "contacts" => Some(Self::Contacts),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Everything an inline button can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Start replying to a forwarded message.
    Reply(CorrelationId),
    /// Show the sender's details.
    Info(CorrelationId),
    /// Send the sender as a vCard.
    Share(CorrelationId),
    /// Send a canned reply right away.
    QuickReply { target: CorrelationId, text: String },
    /// Explain the `/reply` command for this message.
    Custom(CorrelationId),
    Menu(MenuAction),
    /// Show page `n` of the contact picker.
    ContactsPage(usize),
    /// Contact picked from the list.
    SelectContact(String),
    /// Type a phone number instead of picking a contact.
    ManualAddress,
    Cancel,
}

impl ButtonAction {
    /// Payload string carried by the button (Telegram allows 64 bytes).
    pub fn encode(&self) -> String {
        match self {
            Self::Reply(id) => format!("reply:{id}"),
            Self::Info(id) => format!("info:{id}"),
            Self::Share(id) => format!("share:{id}"),
            Self::QuickReply { target, text } => format!("quick:{target}:{text}"),
            Self::Custom(id) => format!("custom:{id}"),
            Self::Menu(menu) => format!("menu:{}", menu.as_str()),
            Self::ContactsPage(n) => format!("page:{n}"),
            Self::SelectContact(address) => format!("contact:{address}"),
            Self::ManualAddress => "manual".to_string(),
            Self::Cancel => "cancel".to_string(),
        }
    }

    /// Whether handling this tap sends on the source network.
    pub fn relays_to_source(&self) -> bool {
        matches!(self, Self::QuickReply { .. })
    }

    /// Parse a payload; `None` for anything unrecognised.
    pub fn decode(payload: &str) -> Option<Self> {
        match payload {
            "manual" => return Some(Self::ManualAddress),
            "cancel" => return Some(Self::Cancel),
            _ => {}
        }

        let (tag, rest) = payload.split_once(':')?;
        let id = || rest.parse::<CorrelationId>().ok();

        match tag {
            "reply" => id().map(Self::Reply),
            "info" => id().map(Self::Info),
            "share" => id().map(Self::Share),
            "custom" => id().map(Self::Custom),
            "quick" => {
                let (target, text) = rest.split_once(':')?;
                let target = target.parse().ok()?;
                (!text.is_empty()).then(|| Self::QuickReply {
                    target,
                    text: text.to_string(),
                })
            }
            "menu" => MenuAction::parse(rest).map(Self::Menu),
            "page" => rest.parse().ok().map(Self::ContactsPage),
            "contact" if !rest.is_empty() => Some(Self::SelectContact(rest.to_string())),
            _ => None,
        }
    }
}
