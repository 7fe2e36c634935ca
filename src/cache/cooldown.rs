//! Auto-reply cooldown: at most one automatic acknowledgement per address per interval.

use std::time::Duration;

use tokio::time::Instant;

use super::expiring::{ExpiringStore, Sweep};

/// Entries are kept at least this long, so the map stays bounded by recent
/// senders rather than every address ever seen.
const MIN_RETENTION: Duration = Duration::from_secs(60);

/// Per-source-address timestamps of the last automatic reply.
///
/// Only direct (non-group) senders are ever checked here; the orchestrator
/// never auto-acknowledges groups.
pub struct CooldownGate {
    last_reply: ExpiringStore<String, Instant>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self {
            last_reply: ExpiringStore::new("cooldown"),
        }
    }

    /// Returns `true` and records `now` when no auto-reply was sent to
    /// `source_address` within the last `min_interval`; otherwise `false`
    /// without touching the record.
    pub fn try_acquire(&self, source_address: &str, min_interval: Duration, now: Instant) -> bool {
        let retention = min_interval.max(MIN_RETENTION);
        self.last_reply.put_if(
            source_address.to_string(),
            now,
            retention,
            |last| match last {
                None => true,
                Some(last) => now.saturating_duration_since(*last) > min_interval,
            },
        )
    }

    /// Number of addresses currently tracked.
    pub fn tracked(&self) -> usize {
        self.last_reply.len()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Sweep for CooldownGate {
    fn sweep(&self) -> usize {
        self.last_reply.purge_expired()
    }
}
