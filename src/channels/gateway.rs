//! HTTP gateway source: talks to a WhatsApp-style REST gateway.
//!
//! Endpoints (relative to the configured base URL):
//! - `GET  /events?after=<seq>&timeout=30` long-poll for new events
//! - `POST /messages` `{ "to", "text" }`
//! - `GET  /contacts`
//! - `GET  /state`
//! - `GET  /media/{id}` raw bytes, `Content-Type` set

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::channels::{
    ConnectionState, Contact, InboundMessage, Media, SourceEvent, SourceNetwork, SourceStream,
};
use crate::error::ChannelError;

/// Suffix the gateway uses for one-to-one chats.
const DIRECT_SUFFIX: &str = "@c.us";

/// Source network reached through an HTTP gateway.
pub struct GatewaySource {
    base_url: String,
    token: Option<SecretString>,
    client: reqwest::Client,
}

impl GatewaySource {
    pub fn new(base_url: &str, token: Option<SecretString>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        with_auth(req, self.token.as_ref())
    }
}

fn with_auth(
    req: reqwest::RequestBuilder,
    token: Option<&SecretString>,
) -> reqwest::RequestBuilder {
    match token {
        Some(t) => req.bearer_auth(t.expose_secret()),
        None => req,
    }
}

fn gateway_error(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "gateway".into(),
        reason,
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    seq: u64,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    chat_name: Option<String>,
    #[serde(default)]
    sender_name: Option<String>,
    /// Null on media-only messages.
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    media_id: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Map a gateway state string onto [`ConnectionState`].
pub fn parse_state(state: &str, reason: Option<&str>) -> ConnectionState {
    match state.to_ascii_uppercase().as_str() {
        "CONNECTED" => ConnectionState::Connected,
        "OPENING" | "PAIRING" | "CONNECTING" => ConnectionState::Connecting,
        other => ConnectionState::Disconnected(reason.unwrap_or(other).to_string()),
    }
}

/// Turn one raw gateway event into a [`SourceEvent`].
///
/// Our own outgoing messages and unknown event types are skipped.
fn convert_event(raw: RawEvent) -> Option<SourceEvent> {
    match raw.kind.as_str() {
        "message" if !raw.from_me && !raw.from.is_empty() => {
            let name = if raw.is_group {
                raw.chat_name.or(raw.sender_name)
            } else {
                raw.sender_name.or(raw.chat_name)
            };
            let display_name = name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| raw.from.trim_end_matches(DIRECT_SUFFIX).to_string());
            Some(SourceEvent::Message(InboundMessage {
                source_address: raw.from,
                is_group: raw.is_group,
                display_name,
                body: raw.body.unwrap_or_default(),
                media_ref: raw.media_id,
            }))
        }
        "state" => raw
            .state
            .as_deref()
            .map(|s| SourceEvent::StateChanged(parse_state(s, raw.reason.as_deref()))),
        _ => None,
    }
}

/// Parse an `/events` response body into events plus the next cursor.
///
/// Items are decoded one at a time; a malformed item is skipped, but its
/// `seq` still advances the cursor so it is never fetched again.
pub fn parse_events(body: &Value, after: u64) -> (Vec<SourceEvent>, u64) {
    let items = body
        .get("events")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut next = after;
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        if let Some(seq) = item.get("seq").and_then(Value::as_u64) {
            next = next.max(seq);
        }
        match RawEvent::deserialize(item) {
            Ok(raw) => events.extend(convert_event(raw)),
            Err(e) => tracing::warn!(error = %e, event = %item, "Skipping malformed gateway event"),
        }
    }
    (events, next)
}

#[async_trait]
impl SourceNetwork for GatewaySource {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn start(&self) -> Result<SourceStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let client = self.client.clone();
        let events_url = self.url("events");
        let token = self.token.clone();

        tokio::spawn(async move {
            let mut after: u64 = 0;

            tracing::info!("Gateway source listening for messages...");

            loop {
                let req = client
                    .get(&events_url)
                    .query(&[("after", after.to_string()), ("timeout", "30".to_string())]);

                let resp = match with_auth(req, token.as_ref()).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Gateway poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Gateway parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                if data.get("events").and_then(Value::as_array).is_none() {
                    tracing::warn!("Gateway poll returned no events array: {data}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }

                let (events, next) = parse_events(&data, after);
                after = next;

                for event in events {
                    if tx.send(event).is_err() {
                        tracing::info!("Gateway listener channel closed");
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

    async fn send(&self, address: &str, text: &str) -> Result<(), ChannelError> {
        let resp = self
            .with_auth(self.client.post(self.url("messages")))
            .json(&serde_json::json!({ "to": address, "text": text }))
            .send()
            .await
            .map_err(|e| gateway_error(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(gateway_error(format!("HTTP {status}: {err}")));
        }
        Ok(())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, ChannelError> {
        let resp = self
            .with_auth(self.client.get(self.url("contacts")))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ChannelError::Http(format!("contacts: HTTP {}", resp.status())));
        }

        let json: Value = resp.json().await?;
        let items = json
            .get("contacts")
            .cloned()
            .unwrap_or(json);
        serde_json::from_value(items).map_err(|e| ChannelError::InvalidMessage(e.to_string()))
    }

    async fn connection_state(&self) -> ConnectionState {
        let resp = match self.with_auth(self.client.get(self.url("state"))).send().await {
            Ok(r) => r,
            Err(e) => return ConnectionState::Disconnected(format!("unreachable: {e}")),
        };
        match resp.json::<Value>().await {
            Ok(json) => {
                let state = json.get("state").and_then(Value::as_str).unwrap_or("UNKNOWN");
                let reason = json.get("reason").and_then(Value::as_str);
                parse_state(state, reason)
            }
            Err(e) => ConnectionState::Disconnected(format!("bad state response: {e}")),
        }
    }

    async fn fetch_media(&self, media_ref: &str) -> Result<Media, ChannelError> {
        let resp = self
            .with_auth(self.client.get(self.url(&format!("media/{media_ref}"))))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ChannelError::Http(format!("media: HTTP {}", resp.status())));
        }

        let mime_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = resp
            .headers()
            .get("x-file-name")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let data = resp.bytes().await?.to_vec();

        Ok(Media {
            mime_type,
            data,
            file_name,
        })
    }

    fn direct_address(&self, number: &str) -> String {
        if number.contains('@') {
            number.to_string()
        } else {
            format!("{number}{DIRECT_SUFFIX}")
        }
    }
}
