use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Game state engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Engine rules and limits. `max_move_distance` and `max_attack_range`
/// are placeholder globals until per-entity/weapon parameterization lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard per-turn budget; on expiry the turn is skipped.
    #[serde(default = "d_turn_timeout_ms")]
    pub turn_timeout_ms: u64,

    /// Arm turn timers and auto-skip on expiry.
    #[serde(default = "d_true")]
    pub auto_advance: bool,

    /// Validate actions before execution. Disabled only in trusted replay
    /// paths.
    #[serde(default = "d_true")]
    pub validate_actions: bool,

    /// Accept queued actions (per-entity FIFO).
    #[serde(default = "d_true")]
    pub queue_enabled: bool,

    /// Bound on `turn_history`; oldest records are dropped first.
    #[serde(default = "d_max_turn_history")]
    pub max_turn_history: usize,

    /// Maximum Manhattan distance for a single `move`.
    #[serde(default = "d_max_move_distance")]
    pub max_move_distance: u32,

    /// Maximum Manhattan distance for an `attack`.
    #[serde(default = "d_max_attack_range")]
    pub max_attack_range: u32,

    /// Map size for rooms created implicitly on first join.
    #[serde(default = "d_map_side")]
    pub default_map_width: i32,
    #[serde(default = "d_map_side")]
    pub default_map_height: i32,

    /// Hit points given to entities materialized on join.
    #[serde(default = "d_default_max_hp")]
    pub default_max_hp: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            turn_timeout_ms: d_turn_timeout_ms(),
            auto_advance: true,
            validate_actions: true,
            queue_enabled: true,
            max_turn_history: d_max_turn_history(),
            max_move_distance: d_max_move_distance(),
            max_attack_range: d_max_attack_range(),
            default_map_width: d_map_side(),
            default_map_height: d_map_side(),
            default_max_hp: d_default_max_hp(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_turn_timeout_ms() -> u64 {
    90_000
}
fn d_true() -> bool {
    true
}
fn d_max_turn_history() -> usize {
    1000
}
fn d_max_move_distance() -> u32 {
    5
}
fn d_max_attack_range() -> u32 {
    1
}
fn d_map_side() -> i32 {
    20
}
fn d_default_max_hp() -> u32 {
    10
}
