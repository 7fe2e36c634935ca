//! In-memory caches with time-based expiry.

pub mod cooldown;
pub mod correlation;
pub mod expiring;

pub use cooldown::CooldownGate;
pub use correlation::{CorrelationCache, CorrelationId, RoutingEntry};
pub use expiring::{ExpiringStore, Sweep, spawn_sweep_task};
