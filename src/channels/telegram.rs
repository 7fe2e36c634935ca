//! Telegram control channel: long-polls the Bot API for operator actions.
//!
//! Commands, inline-button taps and plain text all arrive through
//! `getUpdates`; replies go out with `sendMessage` (Markdown first, plain
//! text fallback) and the multipart media methods.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::{
    ControlAction, ControlEvent, ControlNetwork, ControlStream, Keyboard, MediaKind, OperatorId,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const API_BASE: &str = "https://api.telegram.org";

/// `/name`, optionally `@botname`, then the rest of the text as arguments.
static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^/([A-Za-z0-9_]+)(?:@\S+)?(?:\s+(.*))?$").expect("valid command regex")
});

/// Telegram control channel: connects to the Bot API via long-polling.
pub struct TelegramControl {
    bot_token: SecretString,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramControl {
    pub fn new(bot_token: SecretString, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Check if a username or numeric id is in the allowed list.
    pub fn is_user_allowed(&self, username: &str) -> bool {
        check_user_allowed(&self.allowed_users, [username])
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let mut markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });
        if let Some(markup) = reply_markup {
            markdown_body["reply_markup"] = markup.clone();
        }

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let mut plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            plain_body["reply_markup"] = markup.clone();
        }

        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(send_failed(format!(
                "sendMessage failed (markdown: {markdown_status}, plain: {plain_err})"
            )));
        }

        Ok(())
    }
}

// ── ControlNetwork implementation ───────────────────────────────────

#[async_trait]
impl ControlNetwork for TelegramControl {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<ControlStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for operator actions...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    let description = data
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("no result");
                    tracing::warn!("Telegram getUpdates rejected: {description}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn notify(
        &self,
        chat_id: &str,
        text: &str,
        buttons: Option<Keyboard>,
    ) -> Result<(), ChannelError> {
        let markup = buttons.as_ref().map(inline_keyboard);
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            // Buttons ride on the final chunk only.
            let markup = if i == last { markup.as_ref() } else { None };
            self.send_message_chunk(chat_id, chunk, markup).await?;
        }
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: &str,
        kind: MediaKind,
        data: Vec<u8>,
        file_name: &str,
        caption: &str,
    ) -> Result<(), ChannelError> {
        let (method, field) = media_method(kind);
        let part = Part::bytes(data).file_name(file_name.to_string());

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(field, part);
        if !caption.is_empty() {
            form = form.text("caption", caption.to_string());
        }

        let resp = self
            .client
            .post(self.api_url(method))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("{method} failed: {err}")));
        }

        tracing::info!("Telegram {field} sent to {chat_id}: {file_name}");
        Ok(())
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = Value::String(text.to_string());
            body["show_alert"] = Value::Bool(alert);
        }

        let resp = self
            .client
            .post(self.api_url("answerCallbackQuery"))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(send_failed(format!("answerCallbackQuery failed: {err}")));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(token: &SecretString, method: &str) -> String {
    format!("{API_BASE}/bot{}/{method}", token.expose_secret())
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "telegram".into(),
        reason,
    }
}

fn media_method(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Photo => ("sendPhoto", "photo"),
        MediaKind::Video => ("sendVideo", "video"),
        MediaKind::Audio => ("sendAudio", "audio"),
        MediaKind::Document => ("sendDocument", "document"),
    }
}

fn inline_keyboard(rows: &Keyboard) -> Value {
    let rows: Vec<Value> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| serde_json::json!({ "text": b.text, "callback_data": b.payload }))
                .collect()
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Operator identity (numeric id, else username) if the sender is allowed.
fn allowed_operator(from: Option<&Value>, allowed_users: &[String]) -> Option<OperatorId> {
    let from = from?;
    let username = from
        .get("username")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let user_id = from.get("id").and_then(Value::as_i64).map(|id| id.to_string());

    let mut identities = vec![username];
    if let Some(ref id) = user_id {
        identities.push(id.as_str());
    }

    if !check_user_allowed(allowed_users, identities) {
        tracing::warn!(
            "Telegram: ignoring update from unauthorized user: username={username}, user_id={}",
            user_id.as_deref().unwrap_or("unknown")
        );
        return None;
    }

    Some(OperatorId::from(user_id.unwrap_or_else(|| username.to_string())))
}

fn chat_id_of(message: Option<&Value>) -> Option<String> {
    message?
        .get("chat")?
        .get("id")
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
}

/// Turn one `getUpdates` entry into a [`ControlEvent`].
///
/// Returns `None` for updates that are neither text messages nor button taps,
/// and for senders outside the allow-list.
pub fn parse_update(update: &Value, allowed_users: &[String]) -> Option<ControlEvent> {
    if let Some(query) = update.get("callback_query") {
        let operator = allowed_operator(query.get("from"), allowed_users)?;
        let callback_id = query.get("id").and_then(Value::as_str)?.to_string();
        let payload = query
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let chat_id = chat_id_of(query.get("message")).unwrap_or_else(|| operator.to_string());
        return Some(ControlEvent {
            operator,
            chat_id,
            action: ControlAction::ButtonPress {
                callback_id,
                payload,
            },
        });
    }

    let message = update.get("message")?;
    let text = message.get("text").and_then(Value::as_str)?;
    let operator = allowed_operator(message.get("from"), allowed_users)?;
    let chat_id = chat_id_of(Some(message))?;

    Some(ControlEvent {
        operator,
        chat_id,
        action: parse_text(text),
    })
}

/// Split command text into name and arguments; anything else is free text.
pub fn parse_text(text: &str) -> ControlAction {
    match COMMAND_RE.captures(text.trim()) {
        Some(caps) => ControlAction::Command {
            name: caps[1].to_lowercase(),
            args: caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        },
        None => ControlAction::FreeText {
            text: text.to_string(),
        },
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }

        let chunk = &remaining[..limit];
        let split_at = chunk.rfind('\n').or_else(|| chunk.rfind(' ')).unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
