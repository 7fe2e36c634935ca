//! Operator-facing text and keyboards.

use chrono::{DateTime, Utc};

use super::action::{ButtonAction, MenuAction};
use crate::cache::{CorrelationId, RoutingEntry};
use crate::channels::{Button, ConnectionState, Contact, InboundMessage, Keyboard};
use crate::config::PersistedConfig;
use crate::pagination::Page;

const SEPARATOR: &str = "─────────────────";

fn button(text: &str, action: ButtonAction) -> Button {
    Button::new(text, action.encode())
}

pub fn inbound_notification(msg: &InboundMessage, id: CorrelationId) -> String {
    let body = if msg.body.trim().is_empty() {
        "[Media/File]"
    } else {
        msg.body.as_str()
    };
    let icon = if msg.is_group { "👥" } else { "📨" };
    format!("{icon} *{}*\n🆔 `{id}`\n{SEPARATOR}\n{body}", msg.display_name)
}

pub fn inbound_keyboard(id: CorrelationId) -> Keyboard {
    vec![vec![
        button("💬 Reply", ButtonAction::Reply(id)),
        button("📇 Info", ButtonAction::Info(id)),
    ]]
}

pub fn media_caption(icon: &str, display_name: &str, id: CorrelationId) -> String {
    format!("{icon} {display_name} | {id}")
}

pub fn main_menu() -> Keyboard {
    vec![
        vec![
            button("📊 Status", ButtonAction::Menu(MenuAction::Status)),
            button("📋 Recent", ButtonAction::Menu(MenuAction::List)),
        ],
        vec![
            button("📤 New message", ButtonAction::Menu(MenuAction::Send)),
            button("👥 Contacts", ButtonAction::Menu(MenuAction::Contacts)),
        ],
        vec![button("❓ Help", ButtonAction::Menu(MenuAction::Help))],
    ]
}

pub fn welcome() -> String {
    "🤖 *Message Relay*\n\n\
     Every incoming message is forwarded here.\n\
     Use the buttons below for quick access:"
        .to_string()
}

pub fn help() -> String {
    "📖 *Help*\n\n\
     *Replying*\n\
     Tap 💬 *Reply* under a forwarded message, then type your answer.\n\
     Or: `/reply <msg_id> <text>`\n\n\
     *New message*\n\
     `/send <number> <text>` (e.g. `/send 0812345678 Hello!`)\n\
     or /contacts to pick a chat.\n\n\
     *Other commands*\n\
     /status - connection status\n\
     /list - 10 most recent messages\n\
     /autoreply - show or change the auto-reply (`on`, `off`, `set <text>`)\n\
     /cancel - cancel the pending reply"
        .to_string()
}

pub fn status(
    state: &ConnectionState,
    active: usize,
    total: u64,
    config: &PersistedConfig,
) -> String {
    let connection = if state.is_connected() {
        "✅ Connected"
    } else {
        "❌ Disconnected"
    };
    format!(
        "📊 *Status*\n\n\
         Source: {connection}\n\
         State: {state}\n\
         Active messages: {active}\n\
         Total forwarded: {total}\n\
         Auto-reply: {}",
        if config.auto_reply.enabled { "on" } else { "off" }
    )
}

pub fn recent_list(entries: &[(CorrelationId, RoutingEntry)], now: DateTime<Utc>) -> String {
    if entries.is_empty() {
        return "📭 No messages stored yet.".to_string();
    }
    let mut out = format!("📋 *{} most recent messages:*\n\n", entries.len());
    for (id, entry) in entries {
        let minutes = (now - entry.received_at).num_minutes().max(0);
        out.push_str(&format!(
            "🆔 `{id}`\n👤 {}\n⏰ {minutes} min ago\n─────────────\n",
            entry.display_name
        ));
    }
    out
}

pub fn contact_info(id: CorrelationId, entry: &RoutingEntry) -> String {
    format!(
        "📇 *Contact info*\n\n\
         👤 Name: {}\n\
         📞 ID: `{}`\n\
         📁 Type: {}\n\
         ⏰ Received: {}\n\
         🆔 Msg ID: `{id}`",
        entry.display_name,
        entry.destination_address,
        if entry.is_group { "Group" } else { "Personal" },
        entry.received_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub fn contact_info_keyboard(id: CorrelationId) -> Keyboard {
    vec![vec![
        button("💬 Reply", ButtonAction::Reply(id)),
        button("📤 Share contact", ButtonAction::Share(id)),
    ]]
}

/// Bare number of a direct-chat address (`628…@c.us` → `628…`).
pub fn phone_number(address: &str) -> &str {
    address.split('@').next().unwrap_or(address)
}

pub fn vcard(entry: &RoutingEntry) -> String {
    format!(
        "BEGIN:VCARD\nVERSION:3.0\nFN:{}\nTEL;TYPE=CELL:+{}\nEND:VCARD",
        entry.display_name,
        phone_number(&entry.destination_address)
    )
}

pub fn new_message_menu() -> (String, Keyboard) {
    (
        "📤 *New message*\n\nPick a contact, type a number, or use `/send <number> <text>`."
            .to_string(),
        vec![
            vec![button("👥 Pick a contact", ButtonAction::ContactsPage(0))],
            vec![button("⌨️ Type a number", ButtonAction::ManualAddress)],
        ],
    )
}

pub fn contacts_page(page: &Page<Contact>, total: usize, page_size: usize) -> (String, Keyboard) {
    let pages = total.div_ceil(page_size.max(1)).max(1);
    let text = if total == 0 {
        "👥 No contacts found.".to_string()
    } else {
        format!(
            "👥 *Choose a contact* (page {}/{pages})",
            page.page_index + 1
        )
    };

    let mut rows: Keyboard = page
        .rows
        .iter()
        .map(|c| {
            let icon = if c.is_group { "👥" } else { "👤" };
            vec![button(
                &format!("{icon} {}", c.name),
                ButtonAction::SelectContact(c.address.clone()),
            )]
        })
        .collect();

    let mut nav = Vec::new();
    if page.has_prev {
        nav.push(button("◀️ Prev", ButtonAction::ContactsPage(page.page_index - 1)));
    }
    if page.has_next {
        nav.push(button("Next ▶️", ButtonAction::ContactsPage(page.page_index + 1)));
    }
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![
        button("⌨️ Type a number", ButtonAction::ManualAddress),
        button("✖️ Cancel", ButtonAction::Cancel),
    ]);

    (text, rows)
}

pub fn awaiting_reply(display_name: &str) -> String {
    format!("💬 *Reply to: {display_name}*\n\n✍️ Type your message (or /cancel):")
}

/// Canned answers offered under the reply prompt.
const QUICK_REPLIES: [(&str, &str); 3] = [
    ("👍 OK", "OK, noted!"),
    ("🙏 Thanks", "Thank you!"),
    ("⏳ Later", "I'll get back to you shortly."),
];

pub fn reply_prompt_keyboard(id: CorrelationId) -> Keyboard {
    let quick = QUICK_REPLIES
        .iter()
        .map(|(label, text)| {
            button(
                label,
                ButtonAction::QuickReply {
                    target: id,
                    text: (*text).to_string(),
                },
            )
        })
        .collect();
    vec![
        quick,
        vec![
            button("✍️ Custom", ButtonAction::Custom(id)),
            button("✖️ Cancel", ButtonAction::Cancel),
        ],
    ]
}

pub fn awaiting_send(display_name: &str) -> String {
    format!("✍️ Type your message to *{display_name}* (or /cancel):")
}

pub fn awaiting_address() -> String {
    "⌨️ Type the phone number (e.g. `0812345678` or `62812345678`), or /cancel:".to_string()
}

pub fn sent(display_name: &str, text: &str) -> String {
    format!("✅ Message sent to *{display_name}*\n\n💬 \"{text}\"")
}

pub fn custom_reply_hint(id: CorrelationId) -> String {
    format!(
        "✍️ For a custom reply use:\n\n`/reply {id} <your message>`\n\n\
         Example:\n`/reply {id} Hi, thanks for your message!`"
    )
}

pub fn auto_reply_status(config: &PersistedConfig) -> String {
    format!(
        "🤖 *Auto-reply* is {}\n\nText: {}\n\n\
         Use `/autoreply on`, `/autoreply off` or `/autoreply set <text>`.",
        if config.auto_reply.enabled { "ON" } else { "OFF" },
        config.auto_reply.text
    )
}

/// Announcement for a source connection change; `None` when not worth a message.
pub fn connection_notice(state: &ConnectionState) -> Option<String> {
    match state {
        ConnectionState::Connected => Some("✅ Source network connected.".to_string()),
        ConnectionState::Connecting => None,
        ConnectionState::Disconnected(_) => Some(format!("⚠️ Source network {state}")),
    }
}

pub fn media_unavailable(id: CorrelationId) -> String {
    format!("⚠️ Could not download the media attached to `{id}`.")
}

pub fn unknown_command(name: &str) -> String {
    format!("❓ Unknown command /{name}. Try /help.")
}

pub const REPLY_USAGE: &str =
    "❌ Wrong format!\n\nUse: `/reply <msg_id> <text>`\nExample: `/reply msg_5 Hi, thanks!`";

pub const SEND_USAGE: &str =
    "❌ Wrong format!\n\nUse: `/send <number> <text>`\nExample: `/send 62812345678 Hello!`";

pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";

pub const CANCELLED: &str = "✅ Cancelled.";

pub const INVALID_ADDRESS: &str =
    "❌ That doesn't look like a phone number. Try again, or /cancel.";

pub const FOREIGN_CHAT: &str = "⛔ This bot is bound to another chat.";

pub const UNCLAIMED: &str = "⛔ Send /start first to make this chat the control channel.";
