use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event broadcaster
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Cap on live subscriptions per user across a room.
    #[serde(default = "d_max_subscriptions_per_user")]
    pub max_subscriptions_per_user: usize,

    /// Delta batch flush threshold (count).
    #[serde(default = "d_max_batch_size")]
    pub max_batch_size: usize,

    /// Delta batch flush threshold (age of the oldest queued delta).
    #[serde(default = "d_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Subscriptions idle past this are reaped.
    #[serde(default = "d_subscription_timeout_ms")]
    pub subscription_timeout_ms: u64,

    /// How often the reaper scans for idle subscriptions.
    #[serde(default = "d_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_subscriptions_per_user: d_max_subscriptions_per_user(),
            max_batch_size: d_max_batch_size(),
            batch_delay_ms: d_batch_delay_ms(),
            subscription_timeout_ms: d_subscription_timeout_ms(),
            cleanup_interval_ms: d_cleanup_interval_ms(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_max_subscriptions_per_user() -> usize {
    10
}
fn d_max_batch_size() -> usize {
    50
}
fn d_batch_delay_ms() -> u64 {
    100
}
fn d_subscription_timeout_ms() -> u64 {
    5 * 60 * 1000
}
fn d_cleanup_interval_ms() -> u64 {
    60 * 1000
}
