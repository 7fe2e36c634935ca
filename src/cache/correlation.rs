//! Correlation cache: short ids for forwarded messages and where to route replies.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::expiring::{ExpiringStore, Sweep};

/// How long a forwarded message stays replyable.
pub const CORRELATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const ID_PREFIX: &str = "msg_";

/// Opaque id shown to the operator, rendered as `msg_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ID_PREFIX}{}", self.0)
    }
}

impl FromStr for CorrelationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix(ID_PREFIX)
            .and_then(|n| n.parse().ok())
            .map(Self)
            .ok_or_else(|| format!("Not a message id: {s}"))
    }
}

/// Where a reply to a forwarded message should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    /// Address on the source network (contact or group chat).
    pub destination_address: String,
    /// Contact name, or group name for group chats.
    pub display_name: String,
    pub is_group: bool,
    pub received_at: DateTime<Utc>,
}

/// Maps generated [`CorrelationId`]s to [`RoutingEntry`]s for 24 hours.
///
/// The counter lives in the instance, so ids are unique per cache (and thus
/// per process); two processes sharing one backing store would collide.
pub struct CorrelationCache {
    entries: ExpiringStore<CorrelationId, RoutingEntry>,
    counter: AtomicU64,
    ttl: Duration,
}

impl CorrelationCache {
    pub fn new() -> Self {
        Self::with_ttl(CORRELATION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: ExpiringStore::new("correlation"),
            counter: AtomicU64::new(0),
            ttl,
        }
    }

    /// Record an inbound message and return the id the operator will see.
    pub fn record_inbound(
        &self,
        destination_address: &str,
        display_name: &str,
        is_group: bool,
    ) -> CorrelationId {
        let id = CorrelationId(self.counter.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = RoutingEntry {
            destination_address: destination_address.to_string(),
            display_name: display_name.to_string(),
            is_group,
            received_at: Utc::now(),
        };
        self.entries.put(id, entry, self.ttl);
        debug!(correlation_id = %id, destination = destination_address, "Recorded inbound message");
        id
    }

    /// Look up the routing entry for `id`, if it has not expired.
    pub fn resolve(&self, id: CorrelationId) -> Option<RoutingEntry> {
        self.entries.get(&id)
    }

    /// Up to `n` live entries, most recent first.
    ///
    /// Entries that expire between listing and lookup are skipped.
    pub fn recent(&self, n: usize) -> Vec<(CorrelationId, RoutingEntry)> {
        self.entries
            .keys()
            .into_iter()
            .rev()
            .filter_map(|id| self.entries.get(&id).map(|entry| (id, entry)))
            .take(n)
            .collect()
    }

    /// Number of live entries.
    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Total ids handed out since startup.
    pub fn total_recorded(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Sweep for CorrelationCache {
    fn sweep(&self) -> usize {
        self.entries.purge_expired()
    }
}

impl Default for CorrelationCache {
    fn default() -> Self {
        Self::new()
    }
}
