//! Console source: stdin/stdout stand-in for the source network, for local runs.
//!
//! Each input line `<address> <text>` arrives as an inbound message from
//! `<address>`; outbound sends are printed to stdout.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{
    ConnectionState, Contact, InboundMessage, Media, SourceEvent, SourceNetwork, SourceStream,
};
use crate::error::ChannelError;

/// A source network backed by the terminal.
pub struct ConsoleSource {
    /// Addresses seen so far, listed as contacts.
    seen: Arc<Mutex<BTreeMap<String, String>>>,
}

impl ConsoleSource {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl Default for ConsoleSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `<address> <text>`; `None` for lines without both parts.
fn parse_line(line: &str) -> Option<InboundMessage> {
    let (address, text) = line.trim().split_once(char::is_whitespace)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let is_group = address.ends_with("@g.us");
    let display_name = address.split('@').next().unwrap_or(address);
    let msg = InboundMessage::new(address, display_name, text);
    Some(if is_group { msg.in_group() } else { msg })
}

#[async_trait]
impl SourceNetwork for ConsoleSource {
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self) -> Result<SourceStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let seen = Arc::clone(&self.seen);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            let _ = tx.send(SourceEvent::StateChanged(ConnectionState::Connected));
            eprintln!("console source: type `<address> <message>` to simulate an inbound message");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(msg) = parse_line(&line) else {
                            eprintln!("usage: <address> <message>");
                            continue;
                        };
                        seen.lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(msg.source_address.clone(), msg.display_name.clone());
                        if tx.send(SourceEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), ChannelError> {
        println!("→ {address}: {text}");
        Ok(())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, ChannelError> {
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(seen
            .iter()
            .map(|(address, name)| Contact {
                address: address.clone(),
                name: name.clone(),
                is_group: address.ends_with("@g.us"),
            })
            .collect())
    }

    async fn connection_state(&self) -> ConnectionState {
        ConnectionState::Connected
    }

    async fn fetch_media(&self, media_ref: &str) -> Result<Media, ChannelError> {
        Err(ChannelError::InvalidMessage(format!(
            "console source has no media ({media_ref})"
        )))
    }
}
