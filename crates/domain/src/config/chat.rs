use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat service
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Messages per user per minute before **RateLimited**.
    #[serde(default = "d_rate_limit_per_minute")]
    pub rate_limit_per_minute: usize,

    /// Maximum message content length in characters.
    #[serde(default = "d_max_message_length")]
    pub max_message_length: usize,

    /// Bound on the room chat log; oldest messages are dropped first.
    #[serde(default = "d_max_history")]
    pub max_history: usize,

    /// Substitute matches of `filter_patterns` before delivery.
    #[serde(default = "d_true")]
    pub filter_enabled: bool,

    /// Regex patterns substituted by the content filter. Empty by default;
    /// deployments supply their own list.
    #[serde(default)]
    pub filter_patterns: Vec<String>,

    /// Replacement text for filtered spans.
    #[serde(default = "d_filter_replacement")]
    pub filter_replacement: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: d_rate_limit_per_minute(),
            max_message_length: d_max_message_length(),
            max_history: d_max_history(),
            filter_enabled: true,
            filter_patterns: Vec::new(),
            filter_replacement: d_filter_replacement(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_rate_limit_per_minute() -> usize {
    30
}
fn d_max_message_length() -> usize {
    1000
}
fn d_max_history() -> usize {
    500
}
fn d_true() -> bool {
    true
}
fn d_filter_replacement() -> String {
    "***".into()
}
