//! Operator actions: commands, button taps and free text.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::action::{ButtonAction, MenuAction};
use super::{Bridge, RECENT_LIMIT, format};
use crate::cache::{CorrelationId, RoutingEntry};
use crate::channels::{ControlAction, ControlEvent, MediaKind, OperatorId};
use crate::config::ConfigPatch;
use crate::conversation::{CancelOutcome, TextOutcome, normalize_number};
use crate::error::BridgeError;
use crate::pagination::page;

impl Bridge {
    pub async fn handle_control(&self, event: ControlEvent) {
        let ControlEvent {
            operator,
            chat_id,
            action,
        } = event;

        if let Some(refusal) = self.refusal(&chat_id, &action).await {
            warn!(operator = %operator, chat_id = %chat_id, "Operator action from outside the control channel");
            match &action {
                ControlAction::ButtonPress { callback_id, .. } => {
                    self.answer(callback_id, Some(refusal), true).await;
                }
                _ => self.reply(&chat_id, refusal, None).await,
            }
            return;
        }

        match action {
            ControlAction::Command { name, args } => {
                debug!(operator = %operator, command = %name, "Command received");
                let result = self.handle_command(&operator, &chat_id, &name, &args).await;
                self.acknowledge(&chat_id, result).await;
            }
            ControlAction::ButtonPress {
                callback_id,
                payload,
            } => {
                self.handle_button(&operator, &chat_id, &callback_id, &payload)
                    .await;
            }
            ControlAction::FreeText { text } => {
                let result = self.handle_text(&operator, &chat_id, &text).await;
                self.acknowledge(&chat_id, result).await;
            }
        }
    }

    /// Actions are only taken from the claimed control channel. Until one
    /// is claimed, `/start` is the only accepted action.
    async fn refusal(&self, chat_id: &str, action: &ControlAction) -> Option<&'static str> {
        match self.control_channel().await {
            Some(bound) if bound == chat_id => None,
            Some(_) => Some(format::FOREIGN_CHAT),
            None if matches!(action, ControlAction::Command { name, .. } if name == "start") => None,
            None => Some(format::UNCLAIMED),
        }
    }

    /// Report a failed action back to the operator.
    async fn acknowledge(&self, chat_id: &str, result: Result<(), BridgeError>) {
        if let Err(e) = result {
            warn!(chat_id, error = %e, "Operator action failed");
            self.reply(chat_id, &e.user_message(), None).await;
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn handle_command(
        &self,
        operator: &OperatorId,
        chat_id: &str,
        name: &str,
        args: &str,
    ) -> Result<(), BridgeError> {
        match name {
            "start" => self.cmd_start(chat_id).await,
            "help" => {
                self.reply(chat_id, &format::help(), None).await;
                Ok(())
            }
            "status" => {
                self.show_status(chat_id).await;
                Ok(())
            }
            "list" => {
                self.show_recent(chat_id).await;
                Ok(())
            }
            "reply" => self.cmd_reply(chat_id, args).await,
            "send" => self.cmd_send(chat_id, args).await,
            "contacts" => self.show_contacts(chat_id, 0).await,
            "cancel" => {
                self.cancel(operator, chat_id).await;
                Ok(())
            }
            "autoreply" => self.cmd_autoreply(chat_id, args).await,
            other => {
                self.reply(chat_id, &format::unknown_command(other), None)
                    .await;
                Ok(())
            }
        }
    }

    /// Claims the control channel on first use, then shows the menu.
    async fn cmd_start(&self, chat_id: &str) -> Result<(), BridgeError> {
        let claim = if self.control_channel().await.is_none() {
            info!(chat_id, "Control channel claimed");
            self.update_config(ConfigPatch {
                control_channel_id: Some(chat_id.to_string()),
                ..Default::default()
            })
            .await
        } else {
            Ok(())
        };

        self.reply(chat_id, &format::welcome(), Some(format::main_menu()))
            .await;
        claim
    }

    async fn cmd_reply(&self, chat_id: &str, args: &str) -> Result<(), BridgeError> {
        let Some((raw_id, text)) = split_args(args) else {
            self.reply(chat_id, format::REPLY_USAGE, None).await;
            return Ok(());
        };

        let entry = raw_id
            .parse::<CorrelationId>()
            .ok()
            .and_then(|id| self.correlations.resolve(id))
            .ok_or_else(|| BridgeError::NotFound {
                what: "Message",
                id: raw_id.to_string(),
            })?;

        self.relay(&entry.destination_address, &entry.display_name, text)
            .await?;
        self.reply(chat_id, &format::sent(&entry.display_name, text), None)
            .await;
        Ok(())
    }

    async fn cmd_send(&self, chat_id: &str, args: &str) -> Result<(), BridgeError> {
        let Some((number, text)) = split_args(args)
            .and_then(|(n, t)| normalize_number(n, self.conversations.country_code()).map(|n| (n, t)))
        else {
            self.reply(chat_id, format::SEND_USAGE, None).await;
            return Ok(());
        };

        self.relay(&number, &number, text).await?;
        self.reply(chat_id, &format::sent(&number, text), None).await;
        Ok(())
    }

    async fn cmd_autoreply(&self, chat_id: &str, args: &str) -> Result<(), BridgeError> {
        let (verb, rest) = args
            .split_once(char::is_whitespace)
            .map(|(v, r)| (v, r.trim()))
            .unwrap_or((args, ""));

        let patch = match verb.to_lowercase().as_str() {
            "on" => Some(ConfigPatch {
                auto_reply_enabled: Some(true),
                ..Default::default()
            }),
            "off" => Some(ConfigPatch {
                auto_reply_enabled: Some(false),
                ..Default::default()
            }),
            "set" if !rest.is_empty() => Some(ConfigPatch {
                auto_reply_text: Some(rest.to_string()),
                ..Default::default()
            }),
            _ => None,
        };

        let saved = match patch {
            Some(patch) => {
                info!(change = %args, "Auto-reply updated");
                self.update_config(patch).await
            }
            None => Ok(()),
        };

        let config = self.config().await;
        self.reply(chat_id, &format::auto_reply_status(&config), None)
            .await;
        saved
    }

    async fn cancel(&self, operator: &OperatorId, chat_id: &str) {
        let text = match self.conversations.cancel(operator) {
            CancelOutcome::NothingToCancel => format::NOTHING_TO_CANCEL,
            CancelOutcome::Cancelled(_) => format::CANCELLED,
        };
        self.reply(chat_id, text, None).await;
    }

    // ── Views ───────────────────────────────────────────────────────

    async fn show_status(&self, chat_id: &str) {
        let state = self.deps.source.connection_state().await;
        let config = self.config().await;
        let text = format::status(
            &state,
            self.correlations.active_count(),
            self.correlations.total_recorded(),
            &config,
        );
        self.reply(chat_id, &text, None).await;
    }

    async fn show_recent(&self, chat_id: &str) {
        let entries = self.correlations.recent(RECENT_LIMIT);
        self.reply(chat_id, &format::recent_list(&entries, Utc::now()), None)
            .await;
    }

    /// Contact picker page, computed from a freshly fetched contact list.
    async fn show_contacts(&self, chat_id: &str, page_index: usize) -> Result<(), BridgeError> {
        let state = self.deps.source.connection_state().await;
        if !state.is_connected() {
            return Err(BridgeError::Disconnected {
                state: state.to_string(),
            });
        }

        let contacts = self.deps.source.list_contacts().await.map_err(|e| {
            warn!(error = %e, "Failed to list contacts");
            BridgeError::Disconnected {
                state: format!("contacts unavailable: {e}"),
            }
        })?;

        let size = self.settings.contacts_page_size;
        let window = page(&contacts, size, page_index);
        let (text, keyboard) = format::contacts_page(&window, contacts.len(), size);
        self.reply(chat_id, &text, Some(keyboard)).await;
        Ok(())
    }

    // ── Buttons ─────────────────────────────────────────────────────

    /// Every tap is answered exactly once: a toast on success, an alert on
    /// failure or an unknown payload. Relaying taps are answered up front.
    async fn handle_button(
        &self,
        operator: &OperatorId,
        chat_id: &str,
        callback_id: &str,
        payload: &str,
    ) {
        let Some(action) = ButtonAction::decode(payload) else {
            warn!(operator = %operator, payload, "Unknown button payload");
            self.answer(callback_id, Some("❓ Unknown action"), true)
                .await;
            return;
        };
        debug!(operator = %operator, ?action, "Button pressed");

        // Answered before the send; the outcome is reported in chat.
        if action.relays_to_source() {
            self.answer(callback_id, Some("⏳ Sending…"), false).await;
            let result = self.dispatch_button(operator, chat_id, action).await;
            self.acknowledge(chat_id, result.map(|_| ())).await;
            return;
        }

        match self.dispatch_button(operator, chat_id, action).await {
            Ok(toast) => self.answer(callback_id, toast, false).await,
            Err(e) => {
                warn!(operator = %operator, error = %e, "Button action failed");
                self.answer(callback_id, Some(e.user_message().as_str()), true)
                    .await;
            }
        }
    }

    async fn dispatch_button(
        &self,
        operator: &OperatorId,
        chat_id: &str,
        action: ButtonAction,
    ) -> Result<Option<&'static str>, BridgeError> {
        match action {
            ButtonAction::Reply(id) => {
                let entry = self.lookup(id)?;
                self.conversations.begin_reply(operator, id);
                self.reply(
                    chat_id,
                    &format::awaiting_reply(&entry.display_name),
                    Some(format::reply_prompt_keyboard(id)),
                )
                .await;
                Ok(None)
            }
            ButtonAction::Info(id) => {
                let entry = self.lookup(id)?;
                self.reply(
                    chat_id,
                    &format::contact_info(id, &entry),
                    Some(format::contact_info_keyboard(id)),
                )
                .await;
                Ok(None)
            }
            ButtonAction::Share(id) => {
                let entry = self.lookup(id)?;
                self.share_contact(chat_id, &entry).await?;
                Ok(None)
            }
            ButtonAction::QuickReply { target, text } => {
                // The quick reply answers the prompt that offered it.
                self.conversations.finish_reply(operator, target);
                let entry = self.lookup(target)?;
                self.relay(&entry.destination_address, &entry.display_name, &text)
                    .await?;
                self.reply(chat_id, &format::sent(&entry.display_name, &text), None)
                    .await;
                Ok(None)
            }
            ButtonAction::Custom(id) => {
                self.lookup(id)?;
                self.reply(chat_id, &format::custom_reply_hint(id), None)
                    .await;
                Ok(None)
            }
            ButtonAction::Menu(menu) => {
                match menu {
                    MenuAction::Status => self.show_status(chat_id).await,
                    MenuAction::List => self.show_recent(chat_id).await,
                    MenuAction::Send => {
                        let (text, keyboard) = format::new_message_menu();
                        self.reply(chat_id, &text, Some(keyboard)).await;
                    }
                    MenuAction::Contacts => self.show_contacts(chat_id, 0).await?,
                    MenuAction::Help => self.reply(chat_id, &format::help(), None).await,
                }
                Ok(None)
            }
            ButtonAction::ContactsPage(n) => {
                self.show_contacts(chat_id, n).await?;
                Ok(None)
            }
            ButtonAction::SelectContact(address) => {
                let name = self.contact_name(&address).await;
                self.conversations.begin_send(operator, &address, &name);
                self.reply(chat_id, &format::awaiting_send(&name), None)
                    .await;
                Ok(None)
            }
            ButtonAction::ManualAddress => {
                self.conversations.begin_manual_address(operator);
                self.reply(chat_id, &format::awaiting_address(), None).await;
                Ok(None)
            }
            ButtonAction::Cancel => {
                self.cancel(operator, chat_id).await;
                Ok(None)
            }
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>, alert: bool) {
        if let Err(e) = self
            .deps
            .control
            .answer_button(callback_id, text, alert)
            .await
        {
            warn!(callback_id, error = %e, "Failed to answer button press");
        }
    }

    fn lookup(&self, id: CorrelationId) -> Result<RoutingEntry, BridgeError> {
        self.correlations
            .resolve(id)
            .ok_or_else(|| BridgeError::NotFound {
                what: "Message",
                id: id.to_string(),
            })
    }

    /// Name shown for a picked contact; the bare number when it is no
    /// longer listed.
    async fn contact_name(&self, address: &str) -> String {
        let listed = match self.deps.source.list_contacts().await {
            Ok(contacts) => contacts
                .into_iter()
                .find(|c| c.address == address)
                .map(|c| c.name),
            Err(e) => {
                debug!(error = %e, "Contact lookup failed");
                None
            }
        };
        listed.unwrap_or_else(|| format::phone_number(address).to_string())
    }

    async fn share_contact(&self, chat_id: &str, entry: &RoutingEntry) -> Result<(), BridgeError> {
        let card = format::vcard(entry);
        let file_name = format!("{}.vcf", entry.display_name);
        let caption = format!("📇 {}", entry.display_name);
        self.deps
            .control
            .send_media(
                chat_id,
                MediaKind::Document,
                card.into_bytes(),
                &file_name,
                &caption,
            )
            .await
            .map_err(|source| BridgeError::SendFailure {
                destination: self.deps.control.name().to_string(),
                source,
            })
    }

    // ── Free text ───────────────────────────────────────────────────

    async fn handle_text(
        &self,
        operator: &OperatorId,
        chat_id: &str,
        text: &str,
    ) -> Result<(), BridgeError> {
        match self.conversations.on_text(operator, text, &self.correlations) {
            TextOutcome::Ignored => {
                debug!(operator = %operator, "Free text with no pending conversation ignored");
                Ok(())
            }
            TextOutcome::Relay {
                destination_address,
                display_name,
                text,
            } => {
                self.relay(&destination_address, &display_name, &text)
                    .await?;
                self.reply(chat_id, &format::sent(&display_name, &text), None)
                    .await;
                Ok(())
            }
            TextOutcome::TargetExpired { target } => {
                info!(operator = %operator, correlation_id = %target, "Reply target expired");
                Err(BridgeError::NotFound {
                    what: "Message",
                    id: target.to_string(),
                })
            }
            TextOutcome::AddressAccepted { display_name, .. } => {
                self.reply(chat_id, &format::awaiting_send(&display_name), None)
                    .await;
                Ok(())
            }
            TextOutcome::InvalidAddress => {
                self.reply(chat_id, format::INVALID_ADDRESS, None).await;
                Ok(())
            }
        }
    }
}

/// `<first> <rest…>` with both parts non-empty.
fn split_args(args: &str) -> Option<(&str, &str)> {
    let (first, rest) = args.trim().split_once(char::is_whitespace)?;
    let rest = rest.trim();
    (!first.is_empty() && !rest.is_empty()).then_some((first, rest))
}
