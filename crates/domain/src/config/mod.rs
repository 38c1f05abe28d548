mod broadcast;
mod chat;
mod engine;
mod rooms;
mod server;

pub use broadcast::*;
pub use chat::*;
pub use engine::*;
pub use rooms::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Full configuration tree. Every threshold the runtime uses is injected
/// from here at construction; nothing is read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the whole tree. Errors make the server refuse to boot;
    /// warnings are logged.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let mut error = |field: &str, message: String| {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: field.to_owned(),
                message,
            })
        };

        if self.engine.max_move_distance == 0 {
            error(
                "engine.max_move_distance",
                "must be at least 1".to_owned(),
            );
        }
        if self.engine.default_map_width <= 0 || self.engine.default_map_height <= 0 {
            error(
                "engine.default_map_width/height",
                "map dimensions must be positive".to_owned(),
            );
        }
        if self.engine.default_max_hp == 0 {
            error("engine.default_max_hp", "must be at least 1".to_owned());
        }
        if self.broadcast.max_batch_size == 0 {
            error("broadcast.max_batch_size", "must be at least 1".to_owned());
        }
        if self.chat.max_message_length == 0 {
            error("chat.max_message_length", "must be at least 1".to_owned());
        }
        for (i, pattern) in self.chat.filter_patterns.iter().enumerate() {
            if let Err(e) = regex::Regex::new(pattern) {
                error(
                    "chat.filter_patterns",
                    format!("pattern #{i} does not compile: {e}"),
                );
            }
        }

        if self.rooms.inactivity_timeout_ms < self.rooms.sweep_interval_ms {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "rooms.inactivity_timeout_ms".to_owned(),
                message: "shorter than the sweep interval; rooms may linger past their deadline"
                    .to_owned(),
            });
        }
        if self.engine.turn_timeout_ms < 1_000 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "engine.turn_timeout_ms".to_owned(),
                message: "turn budget under one second is almost certainly a misconfiguration"
                    .to_owned(),
            });
        }

        issues
    }
}
