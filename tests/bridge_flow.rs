//! End-to-end tests for the bridge orchestrator.
//!
//! Both networks are replaced by recording fakes; each test feeds events
//! straight into the bridge and inspects what it sent where.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use relay_bridge::bridge::{Bridge, BridgeDeps, BridgeSettings};
use relay_bridge::cache::CorrelationId;
use relay_bridge::cache::correlation::CORRELATION_TTL;
use relay_bridge::channels::{
    ConnectionState, Contact, ControlAction, ControlEvent, ControlNetwork, ControlStream,
    InboundMessage, Keyboard, Media, MediaKind, OperatorId, SourceEvent, SourceNetwork,
    SourceStream,
};
use relay_bridge::config::{ConfigStore, MemoryConfigStore, PersistedConfig};
use relay_bridge::conversation::ConversationState;
use relay_bridge::error::{ChannelError, ConfigError};

const CHAT: &str = "100";
const OPERATOR: &str = "op-1";

// ── Fakes ───────────────────────────────────────────────────────────────

struct FakeSource {
    sent: Mutex<Vec<(String, String)>>,
    contacts: Mutex<Vec<Contact>>,
    state: Mutex<ConnectionState>,
    media: Mutex<Option<Media>>,
    fail_sends: AtomicBool,
}

impl FakeSource {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            contacts: Mutex::new(Vec::new()),
            state: Mutex::new(ConnectionState::Connected),
            media: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceNetwork for FakeSource {
    fn name(&self) -> &str {
        "fake-source"
    }

    async fn start(&self) -> Result<SourceStream, ChannelError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed {
                name: "fake-source".into(),
                reason: "offline".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((address.to_string(), text.to_string()));
        Ok(())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, ChannelError> {
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn connection_state(&self) -> ConnectionState {
        self.state.lock().unwrap().clone()
    }

    async fn fetch_media(&self, media_ref: &str) -> Result<Media, ChannelError> {
        self.media
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ChannelError::InvalidMessage(format!("no media {media_ref}")))
    }

    fn direct_address(&self, number: &str) -> String {
        if number.contains('@') {
            number.to_string()
        } else {
            format!("{number}@c.us")
        }
    }
}

#[derive(Debug, Clone)]
struct Note {
    chat_id: String,
    text: String,
    buttons: Option<Keyboard>,
}

#[derive(Debug, Clone)]
struct Answer {
    text: Option<String>,
    alert: bool,
}

#[derive(Debug, Clone)]
struct SentMedia {
    kind: MediaKind,
    file_name: String,
    caption: String,
}

#[derive(Default)]
struct FakeControl {
    notes: Mutex<Vec<Note>>,
    answers: Mutex<Vec<Answer>>,
    media: Mutex<Vec<SentMedia>>,
}

impl FakeControl {
    fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    fn last_note(&self) -> Note {
        self.notes().last().cloned().expect("no notes sent")
    }

    fn answers(&self) -> Vec<Answer> {
        self.answers.lock().unwrap().clone()
    }

    fn media(&self) -> Vec<SentMedia> {
        self.media.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlNetwork for FakeControl {
    fn name(&self) -> &str {
        "fake-control"
    }

    async fn start(&self) -> Result<ControlStream, ChannelError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn notify(
        &self,
        chat_id: &str,
        text: &str,
        buttons: Option<Keyboard>,
    ) -> Result<(), ChannelError> {
        self.notes.lock().unwrap().push(Note {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            buttons,
        });
        Ok(())
    }

    async fn send_media(
        &self,
        _chat_id: &str,
        kind: MediaKind,
        _data: Vec<u8>,
        file_name: &str,
        caption: &str,
    ) -> Result<(), ChannelError> {
        self.media.lock().unwrap().push(SentMedia {
            kind,
            file_name: file_name.to_string(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn answer_button(
        &self,
        _callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), ChannelError> {
        self.answers.lock().unwrap().push(Answer {
            text: text.map(String::from),
            alert,
        });
        Ok(())
    }
}

/// Store whose first `failures` writes fail.
struct FlakyStore {
    failures: AtomicUsize,
    saved: Mutex<Option<PersistedConfig>>,
}

impl FlakyStore {
    fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            saved: Mutex::new(None),
        }
    }

    fn saved(&self) -> Option<PersistedConfig> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigStore for FlakyStore {
    async fn load(&self) -> Result<PersistedConfig, ConfigError> {
        Ok(self.saved().unwrap_or_default())
    }

    async fn save(&self, config: &PersistedConfig) -> Result<(), ConfigError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ConfigError::Io(std::io::Error::other("disk full")));
        }
        *self.saved.lock().unwrap() = Some(config.clone());
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────────

struct Harness {
    bridge: Bridge,
    source: Arc<FakeSource>,
    control: Arc<FakeControl>,
    store: Arc<MemoryConfigStore>,
}

fn with_channel() -> PersistedConfig {
    PersistedConfig {
        control_channel_id: Some(CHAT.into()),
        ..Default::default()
    }
}

fn harness(config: PersistedConfig) -> Harness {
    let source = Arc::new(FakeSource::new());
    let control = Arc::new(FakeControl::default());
    let store = Arc::new(MemoryConfigStore::new(config.clone()));
    let bridge = Bridge::new(
        BridgeDeps {
            source: Arc::clone(&source) as Arc<dyn SourceNetwork>,
            control: Arc::clone(&control) as Arc<dyn ControlNetwork>,
            config_store: Arc::clone(&store) as Arc<dyn ConfigStore>,
        },
        BridgeSettings::default(),
        config,
    );
    Harness {
        bridge,
        source,
        control,
        store,
    }
}

fn operator() -> OperatorId {
    OperatorId::from(OPERATOR)
}

fn event(action: ControlAction) -> ControlEvent {
    ControlEvent {
        operator: operator(),
        chat_id: CHAT.into(),
        action,
    }
}

fn command(name: &str, args: &str) -> ControlEvent {
    event(ControlAction::Command {
        name: name.into(),
        args: args.into(),
    })
}

fn tap(payload: &str) -> ControlEvent {
    event(ControlAction::ButtonPress {
        callback_id: "cb".into(),
        payload: payload.into(),
    })
}

fn text(t: &str) -> ControlEvent {
    event(ControlAction::FreeText { text: t.into() })
}

fn id(s: &str) -> CorrelationId {
    s.parse().unwrap()
}

async fn inbound(h: &Harness, msg: InboundMessage) {
    h.bridge.handle_source_event(SourceEvent::Message(msg)).await;
}

fn budi() -> InboundMessage {
    InboundMessage::new("628111@c.us", "Budi", "halo")
}

fn contacts(n: usize) -> Vec<Contact> {
    (0..n)
        .map(|i| Contact {
            address: format!("62800{i}@c.us"),
            name: format!("C{i}"),
            is_group: false,
        })
        .collect()
}

fn nav_payloads(note: &Note, rows: usize) -> Vec<String> {
    let buttons = note.buttons.as_ref().expect("keyboard");
    buttons[rows].iter().map(|b| b.payload.clone()).collect()
}

// ── Inbound forwarding ──────────────────────────────────────────────────

#[tokio::test]
async fn inbound_message_is_recorded_and_forwarded() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    let note = h.control.last_note();
    assert_eq!(note.chat_id, CHAT);
    assert!(note.text.contains("*Budi*"));
    assert!(note.text.contains("msg_1"));
    assert!(note.text.ends_with("halo"));
    assert_eq!(note.buttons.unwrap()[0][0].payload, "reply:msg_1");

    let entry = h.bridge.correlations().resolve(id("msg_1")).unwrap();
    assert_eq!(entry.destination_address, "628111@c.us");
    assert!(h.source.sent().is_empty());
}

#[tokio::test]
async fn without_control_channel_entry_is_recorded_but_nothing_sent() {
    let h = harness(PersistedConfig::default());
    inbound(&h, budi()).await;

    assert!(h.control.notes().is_empty());
    assert!(h.bridge.correlations().resolve(id("msg_1")).is_some());
}

#[tokio::test]
async fn media_is_forwarded_after_notification() {
    let h = harness(with_channel());
    *h.source.media.lock().unwrap() = Some(Media {
        mime_type: "image/jpeg".into(),
        data: vec![1, 2, 3],
        file_name: None,
    });

    inbound(&h, InboundMessage::new("628111@c.us", "Budi", "").with_media("m1")).await;

    assert!(h.control.last_note().text.ends_with("[Media/File]"));
    let media = h.control.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].kind, MediaKind::Photo);
    assert_eq!(media[0].file_name, "photo.jpg");
    assert_eq!(media[0].caption, "📷 Budi | msg_1");
}

#[tokio::test]
async fn failed_media_download_is_reported() {
    let h = harness(with_channel());
    inbound(&h, budi().with_media("gone")).await;

    let notes = h.control.notes();
    assert_eq!(notes.len(), 2);
    assert!(notes[1].text.contains("Could not download"));
    assert!(h.control.media().is_empty());
}

#[tokio::test]
async fn connection_changes_are_announced() {
    let h = harness(with_channel());
    h.bridge
        .handle_source_event(SourceEvent::StateChanged(ConnectionState::Connecting))
        .await;
    assert!(h.control.notes().is_empty());

    h.bridge
        .handle_source_event(SourceEvent::StateChanged(ConnectionState::Disconnected(
            "LOGOUT".into(),
        )))
        .await;
    assert!(h.control.last_note().text.contains("DISCONNECTED (LOGOUT)"));
}

// ── Auto-reply ──────────────────────────────────────────────────────────

fn auto_reply_on() -> PersistedConfig {
    let mut config = with_channel();
    config.auto_reply.enabled = true;
    config.auto_reply.text = "away".into();
    config
}

#[tokio::test(start_paused = true)]
async fn auto_reply_respects_cooldown() {
    let h = harness(auto_reply_on());

    inbound(&h, budi()).await;
    inbound(&h, budi()).await;
    assert_eq!(
        h.source.sent(),
        vec![("628111@c.us".to_string(), "away".to_string())]
    );

    tokio::time::advance(Duration::from_secs(61)).await;
    inbound(&h, budi()).await;
    assert_eq!(h.source.sent().len(), 2);

    // every message is still forwarded
    assert_eq!(h.control.notes().len(), 3);
}

#[tokio::test]
async fn groups_never_get_auto_replies() {
    let h = harness(auto_reply_on());
    inbound(&h, InboundMessage::new("1203@g.us", "Family", "hi all").in_group()).await;

    assert!(h.source.sent().is_empty());
    assert_eq!(h.control.notes().len(), 1);
}

#[tokio::test]
async fn auto_reply_failure_does_not_block_notification() {
    let h = harness(auto_reply_on());
    h.source.fail_sends.store(true, Ordering::SeqCst);
    inbound(&h, budi()).await;

    assert_eq!(h.control.notes().len(), 1);
    assert!(h.bridge.correlations().resolve(id("msg_1")).is_some());
}

#[tokio::test]
async fn disabled_auto_reply_sends_nothing() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;
    assert!(h.source.sent().is_empty());
}

// ── Reply flow ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reply_button_then_text_sends_exactly_once() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    h.bridge.handle_control(tap("reply:msg_1")).await;
    assert_eq!(
        h.bridge.conversations().current(&operator()),
        ConversationState::AwaitingReplyText {
            target: id("msg_1")
        }
    );
    let answers = h.control.answers();
    assert_eq!(answers.len(), 1);
    assert!(!answers[0].alert);

    h.bridge.handle_control(text("on my way")).await;
    assert_eq!(
        h.source.sent(),
        vec![("628111@c.us".to_string(), "on my way".to_string())]
    );
    assert!(h.bridge.conversations().current(&operator()).is_idle());
    assert!(h.control.last_note().text.contains("Message sent to *Budi*"));

    // further text is ignored silently
    let notes_before = h.control.notes().len();
    h.bridge.handle_control(text("again")).await;
    assert_eq!(h.source.sent().len(), 1);
    assert_eq!(h.control.notes().len(), notes_before);
}

#[tokio::test(start_paused = true)]
async fn expired_reply_target_fails_closed() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    tokio::time::advance(CORRELATION_TTL + Duration::from_secs(1)).await;
    h.bridge.conversations().begin_reply(&operator(), id("msg_1"));

    h.bridge.handle_control(text("too late")).await;
    assert!(h.source.sent().is_empty());
    assert!(h.control.last_note().text.contains("not found or already expired"));
    assert!(h.bridge.conversations().current(&operator()).is_idle());
}

#[tokio::test(start_paused = true)]
async fn reply_button_on_expired_message_alerts() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;
    tokio::time::advance(CORRELATION_TTL + Duration::from_secs(1)).await;

    h.bridge.handle_control(tap("reply:msg_1")).await;
    let answers = h.control.answers();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].alert);
    assert!(h.bridge.conversations().current(&operator()).is_idle());
}

#[tokio::test]
async fn failed_relay_is_reported_and_state_cleared() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;
    h.bridge.handle_control(tap("reply:msg_1")).await;

    h.source.fail_sends.store(true, Ordering::SeqCst);
    h.bridge.handle_control(text("hello?")).await;

    assert!(h.control.last_note().text.contains("Failed to send to Budi"));
    assert!(h.bridge.conversations().current(&operator()).is_idle());
}

#[tokio::test]
async fn quick_reply_sends_immediately() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    h.bridge.handle_control(tap("quick:msg_1:Thank you!")).await;
    assert_eq!(
        h.source.sent(),
        vec![("628111@c.us".to_string(), "Thank you!".to_string())]
    );
    let answers = h.control.answers();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].text.as_deref(), Some("⏳ Sending…"));
    assert!(!answers[0].alert);
    assert!(h.control.last_note().text.contains("Message sent to *Budi*"));
}

#[tokio::test]
async fn quick_reply_clears_pending_reply_to_same_message() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    h.bridge.handle_control(tap("reply:msg_1")).await;
    h.bridge.handle_control(tap("quick:msg_1:OK, noted!")).await;
    assert!(h.bridge.conversations().current(&operator()).is_idle());

    h.bridge.handle_control(text("unrelated note to self")).await;
    assert_eq!(
        h.source.sent(),
        vec![("628111@c.us".to_string(), "OK, noted!".to_string())]
    );
}

#[tokio::test]
async fn quick_reply_keeps_pending_reply_to_other_message() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;
    inbound(&h, InboundMessage::new("628222@c.us", "Sari", "pagi")).await;

    h.bridge.handle_control(tap("reply:msg_2")).await;
    h.bridge.handle_control(tap("quick:msg_1:OK")).await;
    assert_eq!(
        h.bridge.conversations().current(&operator()),
        ConversationState::AwaitingReplyText {
            target: id("msg_2")
        }
    );
}

#[tokio::test]
async fn quick_reply_failure_is_reported_in_chat() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;
    h.source.fail_sends.store(true, Ordering::SeqCst);

    h.bridge.handle_control(tap("quick:msg_1:Thank you!")).await;

    let answers = h.control.answers();
    assert_eq!(answers.len(), 1, "tap is answered once, before the send");
    assert!(!answers[0].alert);
    assert!(h.control.last_note().text.contains("Failed to send to Budi"));
}

#[tokio::test]
async fn info_and_share_buttons() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    h.bridge.handle_control(tap("info:msg_1")).await;
    let note = h.control.last_note();
    assert!(note.text.contains("628111@c.us"));
    assert_eq!(note.buttons.unwrap()[0][1].payload, "share:msg_1");

    h.bridge.handle_control(tap("share:msg_1")).await;
    let media = h.control.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].kind, MediaKind::Document);
    assert_eq!(media[0].file_name, "Budi.vcf");
}

#[tokio::test]
async fn info_on_unknown_id_does_nothing_else() {
    let h = harness(with_channel());
    h.bridge.handle_control(tap("info:msg_42")).await;

    assert!(h.control.notes().is_empty());
    assert!(h.control.media().is_empty());
    assert!(h.control.answers()[0].alert);
}

// ── Manual address and contacts ─────────────────────────────────────────

#[tokio::test]
async fn manual_address_is_normalized_then_used() {
    let h = harness(with_channel());

    h.bridge.handle_control(tap("manual")).await;
    h.bridge.handle_control(text("0812-3456-789")).await;
    assert_eq!(
        h.bridge.conversations().current(&operator()),
        ConversationState::AwaitingSendText {
            destination_address: "628123456789".into(),
            display_name: "628123456789".into(),
        }
    );

    h.bridge.handle_control(text("hello")).await;
    assert_eq!(
        h.source.sent(),
        vec![("628123456789@c.us".to_string(), "hello".to_string())]
    );
}

#[tokio::test]
async fn invalid_manual_address_asks_again() {
    let h = harness(with_channel());
    h.bridge.handle_control(tap("manual")).await;
    h.bridge.handle_control(text("not a number")).await;

    assert!(h.control.last_note().text.contains("doesn't look like a phone number"));
    assert_eq!(
        h.bridge.conversations().current(&operator()),
        ConversationState::AwaitingManualAddress
    );
    assert!(h.source.sent().is_empty());
}

#[tokio::test]
async fn contacts_are_paginated_from_a_fresh_list() {
    let h = harness(with_channel());
    *h.source.contacts.lock().unwrap() = contacts(20);

    h.bridge.handle_control(command("contacts", "")).await;
    let note = h.control.last_note();
    assert!(note.text.contains("page 1/3"));
    assert_eq!(nav_payloads(&note, 8), vec!["page:1"]);

    h.bridge.handle_control(tap("page:1")).await;
    let note = h.control.last_note();
    assert_eq!(note.buttons.as_ref().unwrap().len(), 10);
    assert_eq!(nav_payloads(&note, 8), vec!["page:0", "page:2"]);

    h.bridge.handle_control(tap("page:2")).await;
    let note = h.control.last_note();
    assert_eq!(note.buttons.as_ref().unwrap()[0][0].payload, "contact:6280016@c.us");
    assert_eq!(nav_payloads(&note, 4), vec!["page:1"]);
}

#[tokio::test]
async fn contacts_require_a_connected_source() {
    let h = harness(with_channel());
    *h.source.state.lock().unwrap() = ConnectionState::Disconnected("LOGOUT".into());

    h.bridge.handle_control(command("contacts", "")).await;
    assert!(h.control.last_note().text.contains("disconnected"));

    h.bridge.handle_control(tap("menu:contacts")).await;
    assert!(h.control.answers()[0].alert);
}

#[tokio::test]
async fn selecting_a_contact_starts_a_new_message() {
    let h = harness(with_channel());
    *h.source.contacts.lock().unwrap() = contacts(8);

    h.bridge.handle_control(tap("contact:628005@c.us")).await;
    assert!(h.control.last_note().text.contains("*C5*"));

    h.bridge.handle_control(text("hi C5")).await;
    assert_eq!(
        h.source.sent(),
        vec![("628005@c.us".to_string(), "hi C5".to_string())]
    );
}

// ── Commands ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_reports_nothing_or_success() {
    let h = harness(with_channel());

    h.bridge.handle_control(command("cancel", "")).await;
    assert_eq!(h.control.last_note().text, "Nothing to cancel.");

    h.bridge.handle_control(tap("manual")).await;
    h.bridge.handle_control(command("cancel", "")).await;
    assert!(h.control.last_note().text.contains("Cancelled"));
    assert!(h.bridge.conversations().current(&operator()).is_idle());
}

#[tokio::test]
async fn reply_command() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    h.bridge.handle_control(command("reply", "msg_1 see you soon")).await;
    assert_eq!(
        h.source.sent(),
        vec![("628111@c.us".to_string(), "see you soon".to_string())]
    );

    h.bridge.handle_control(command("reply", "msg_9 hello")).await;
    assert!(h.control.last_note().text.contains("msg_9"));

    h.bridge.handle_control(command("reply", "msg_1")).await;
    assert!(h.control.last_note().text.contains("Wrong format"));
    assert_eq!(h.source.sent().len(), 1);
}

#[tokio::test]
async fn send_command_normalizes_number() {
    let h = harness(with_channel());
    h.bridge.handle_control(command("send", "0812345678 Hello!")).await;
    assert_eq!(
        h.source.sent(),
        vec![("62812345678@c.us".to_string(), "Hello!".to_string())]
    );

    h.bridge.handle_control(command("send", "abc Hello!")).await;
    assert!(h.control.last_note().text.contains("Wrong format"));
}

#[tokio::test]
async fn status_and_list() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;
    inbound(&h, InboundMessage::new("628222@c.us", "Sari", "yo")).await;

    h.bridge.handle_control(command("status", "")).await;
    let status = h.control.last_note().text;
    assert!(status.contains("Connected"));
    assert!(status.contains("Active messages: 2"));

    h.bridge.handle_control(command("list", "")).await;
    let list = h.control.last_note().text;
    assert!(list.find("msg_2").unwrap() < list.find("msg_1").unwrap());
}

#[tokio::test]
async fn start_claims_control_channel_once() {
    let h = harness(PersistedConfig::default());

    h.bridge.handle_control(command("start", "")).await;
    assert_eq!(h.bridge.config().await.control_channel_id.as_deref(), Some(CHAT));
    assert_eq!(
        h.store.load().await.unwrap().control_channel_id.as_deref(),
        Some(CHAT)
    );
    assert!(h.control.last_note().buttons.is_some());

    let other = ControlEvent {
        operator: OperatorId::from("op-2"),
        chat_id: "200".into(),
        action: ControlAction::Command {
            name: "start".into(),
            args: String::new(),
        },
    };
    h.bridge.handle_control(other).await;
    assert_eq!(h.bridge.config().await.control_channel_id.as_deref(), Some(CHAT));
    let refusal = h.control.last_note();
    assert_eq!(refusal.chat_id, "200");
    assert!(refusal.text.contains("bound to another chat"));
}

fn from_chat(chat_id: &str, action: ControlAction) -> ControlEvent {
    ControlEvent {
        operator: OperatorId::from("stranger"),
        chat_id: chat_id.into(),
        action,
    }
}

#[tokio::test]
async fn foreign_chat_cannot_read_or_send() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;
    let notes_before = h.control.notes().len();

    let list = ControlAction::Command {
        name: "list".into(),
        args: String::new(),
    };
    h.bridge.handle_control(from_chat("999", list)).await;
    let send = ControlAction::Command {
        name: "send".into(),
        args: "62812345678 hi".into(),
    };
    h.bridge.handle_control(from_chat("999", send)).await;

    let notes = h.control.notes();
    assert_eq!(notes.len(), notes_before + 2);
    for note in &notes[notes_before..] {
        assert_eq!(note.chat_id, "999");
        assert!(note.text.contains("bound to another chat"));
        assert!(!note.text.contains("Budi"));
    }
    assert!(h.source.sent().is_empty());
}

#[tokio::test]
async fn foreign_chat_button_is_refused_with_alert() {
    let h = harness(with_channel());
    inbound(&h, budi()).await;

    let quick = ControlAction::ButtonPress {
        callback_id: "cb".into(),
        payload: "quick:msg_1:hi".into(),
    };
    h.bridge.handle_control(from_chat("999", quick)).await;

    let answers = h.control.answers();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].alert);
    assert!(h.source.sent().is_empty());
}

#[tokio::test]
async fn unclaimed_bridge_only_accepts_start() {
    let h = harness(PersistedConfig::default());

    h.bridge.handle_control(command("list", "")).await;
    assert!(h.control.last_note().text.contains("/start"));
    assert_eq!(h.bridge.config().await.control_channel_id, None);

    h.bridge.handle_control(command("start", "")).await;
    assert_eq!(h.bridge.config().await.control_channel_id.as_deref(), Some(CHAT));
}

#[tokio::test]
async fn autoreply_command_persists() {
    let h = harness(with_channel());

    h.bridge.handle_control(command("autoreply", "on")).await;
    h.bridge.handle_control(command("autoreply", "set Back at 5")).await;

    let stored = h.store.load().await.unwrap();
    assert!(stored.auto_reply.enabled);
    assert_eq!(stored.auto_reply.text, "Back at 5");
    assert_eq!(h.bridge.config().await, stored);
    assert!(h.control.last_note().text.contains("ON"));
}

fn bridge_with_store(store: Arc<FlakyStore>, control: Arc<FakeControl>) -> Bridge {
    Bridge::new(
        BridgeDeps {
            source: Arc::new(FakeSource::new()),
            control: control as Arc<dyn ControlNetwork>,
            config_store: store as Arc<dyn ConfigStore>,
        },
        BridgeSettings::default(),
        with_channel(),
    )
}

#[tokio::test]
async fn config_write_failure_keeps_in_memory_change() {
    let control = Arc::new(FakeControl::default());
    let store = Arc::new(FlakyStore::failing(usize::MAX));
    let bridge = bridge_with_store(Arc::clone(&store), Arc::clone(&control));

    bridge.handle_control(command("autoreply", "on")).await;

    assert!(bridge.config().await.auto_reply.enabled);
    assert!(control.last_note().text.contains("could not be saved"));
    assert_eq!(store.saved(), None);
}

#[tokio::test]
async fn next_successful_write_carries_earlier_unsaved_change() {
    let control = Arc::new(FakeControl::default());
    let store = Arc::new(FlakyStore::failing(1));
    let bridge = bridge_with_store(Arc::clone(&store), Arc::clone(&control));

    bridge.handle_control(command("autoreply", "on")).await;
    assert!(control.last_note().text.contains("could not be saved"));
    bridge.handle_control(command("autoreply", "set brb")).await;

    let stored = store.saved().expect("second write lands");
    assert!(stored.auto_reply.enabled);
    assert_eq!(stored.auto_reply.text, "brb");
    assert_eq!(stored.control_channel_id.as_deref(), Some(CHAT));
    assert_eq!(bridge.config().await, stored);
}

#[tokio::test]
async fn unknown_command_gets_hint() {
    let h = harness(with_channel());
    h.bridge.handle_control(command("frobnicate", "")).await;
    assert!(h.control.last_note().text.contains("/help"));
}

#[tokio::test]
async fn unknown_button_is_answered_and_ignored() {
    let h = harness(with_channel());
    h.bridge.handle_control(tap("cmd_status")).await;

    let answers = h.control.answers();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].alert);
    assert_eq!(answers[0].text.as_deref(), Some("❓ Unknown action"));
    assert!(h.control.notes().is_empty());
    assert!(h.source.sent().is_empty());
}

#[tokio::test]
async fn idle_free_text_is_silent() {
    let h = harness(with_channel());
    h.bridge.handle_control(text("hello?")).await;
    assert!(h.control.notes().is_empty());
    assert!(h.source.sent().is_empty());
}
