//! Source-network events: forwarding, auto-reply and connection notices.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Bridge;
use super::format;
use crate::cache::CorrelationId;
use crate::channels::{ConnectionState, InboundMessage, MediaKind, SourceEvent};

impl Bridge {
    pub async fn handle_source_event(&self, event: SourceEvent) {
        match event {
            SourceEvent::Message(msg) => self.handle_inbound(msg).await,
            SourceEvent::StateChanged(state) => self.handle_state_change(state).await,
        }
    }

    /// Auto-reply (when due), then record the correlation and notify the
    /// control channel. The notification goes out whatever the auto-reply did.
    async fn handle_inbound(&self, msg: InboundMessage) {
        info!(
            from = %msg.source_address,
            group = msg.is_group,
            media = msg.has_media(),
            "Inbound message"
        );

        let config = self.config().await;

        if config.auto_reply.enabled && !msg.is_group {
            self.auto_reply(&msg.source_address, &config.auto_reply.text)
                .await;
        }

        let id = self.correlations.record_inbound(
            &msg.source_address,
            &msg.display_name,
            msg.is_group,
        );

        let Some(chat_id) = config.control_channel_id else {
            warn!(correlation_id = %id, "No control channel configured; notification not sent");
            return;
        };

        let text = format::inbound_notification(&msg, id);
        match self
            .deps
            .control
            .notify(&chat_id, &text, Some(format::inbound_keyboard(id)))
            .await
        {
            Ok(()) => debug!(correlation_id = %id, "Notification sent"),
            Err(e) => warn!(correlation_id = %id, error = %e, "Failed to notify control channel"),
        }

        if let Some(media_ref) = &msg.media_ref {
            self.forward_media(&chat_id, &msg, media_ref, id).await;
        }
    }

    async fn auto_reply(&self, source_address: &str, text: &str) {
        let granted = self.cooldown.try_acquire(
            source_address,
            self.settings.auto_reply_cooldown,
            Instant::now(),
        );
        if !granted {
            debug!(to = %source_address, "Auto-reply skipped (cooldown)");
            return;
        }

        match self.send_to_source(source_address, text).await {
            Ok(()) => info!(to = %source_address, "Auto-reply sent"),
            Err(e) => warn!(to = %source_address, error = %e, "Auto-reply failed"),
        }
    }

    async fn forward_media(
        &self,
        chat_id: &str,
        msg: &InboundMessage,
        media_ref: &str,
        id: CorrelationId,
    ) {
        let media = match self.deps.source.fetch_media(media_ref).await {
            Ok(media) => media,
            Err(e) => {
                warn!(correlation_id = %id, error = %e, "Media download failed");
                self.reply(chat_id, &format::media_unavailable(id), None)
                    .await;
                return;
            }
        };

        let kind = MediaKind::from_mime(&media.mime_type);
        let file_name = media
            .file_name
            .unwrap_or_else(|| kind.default_file_name().to_string());
        let caption = format::media_caption(kind.icon(), &msg.display_name, id);

        if let Err(e) = self
            .deps
            .control
            .send_media(chat_id, kind, media.data, &file_name, &caption)
            .await
        {
            warn!(correlation_id = %id, error = %e, "Failed to forward media");
        }
    }

    async fn handle_state_change(&self, state: ConnectionState) {
        info!(state = %state, "Source connection state changed");

        let Some(text) = format::connection_notice(&state) else {
            return;
        };
        if let Some(chat_id) = self.control_channel().await {
            self.reply(&chat_id, &text, None).await;
        }
    }
}
