use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Room manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Room registry and inactivity sweeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    /// A room is reapable once idle this long (and not actively occupied).
    #[serde(default = "d_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,

    /// How often the background sweep scans the registry.
    #[serde(default = "d_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Completed rooms are kept around this long before reaping, so late
    /// readers can still fetch the final state.
    #[serde(default = "d_completed_grace_ms")]
    pub completed_grace_ms: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: d_inactivity_timeout_ms(),
            sweep_interval_ms: d_sweep_interval_ms(),
            completed_grace_ms: d_completed_grace_ms(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_inactivity_timeout_ms() -> u64 {
    30 * 60 * 1000
}
fn d_sweep_interval_ms() -> u64 {
    60 * 1000
}
fn d_completed_grace_ms() -> u64 {
    5 * 60 * 1000
}
