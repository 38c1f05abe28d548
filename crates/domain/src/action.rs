//! Turn actions, per-action results, queue entries, and turn records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::Position;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Actions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single action submitted for the acting entity's turn.
///
/// `move` and `interact` do not end the turn, so several can run in
/// sequence; `attack`, `use_item`, `cast`, and `end` advance it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnAction {
    Move {
        entity_id: String,
        position: Position,
    },
    Attack {
        entity_id: String,
        target: String,
    },
    UseItem {
        entity_id: String,
        item_id: String,
        #[serde(default)]
        target: Option<String>,
    },
    Cast {
        entity_id: String,
        spell_id: String,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        position: Option<Position>,
    },
    Interact {
        entity_id: String,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        parameters: serde_json::Value,
    },
    End {
        entity_id: String,
    },
}

impl TurnAction {
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Move { entity_id, .. }
            | Self::Attack { entity_id, .. }
            | Self::UseItem { entity_id, .. }
            | Self::Cast { entity_id, .. }
            | Self::Interact { entity_id, .. }
            | Self::End { entity_id } => entity_id,
        }
    }

    /// Whether processing this action advances the turn.
    pub fn ends_turn(&self) -> bool {
        matches!(
            self,
            Self::Attack { .. } | Self::UseItem { .. } | Self::Cast { .. } | Self::End { .. }
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::UseItem { .. } => "use_item",
            Self::Cast { .. } => "cast",
            Self::Interact { .. } => "interact",
            Self::End { .. } => "end",
        }
    }
}

/// Validation/execution result of one action. Validation failures are data,
/// not errors: the action simply did not happen and state is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ActionResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn records
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Skipped,
    Backtracked,
}

/// One entry of the append-only turn history. Only `backtrack` may remove
/// records, and only by truncating from the tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub entity_id: String,
    pub turn_number: usize,
    pub round_number: u32,
    pub actions: Vec<TurnAction>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: TurnOutcome,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queued actions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// An action waiting in (or moving through) an entity's FIFO queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: Uuid,
    pub action: TurnAction,
    pub queued_at: DateTime<Utc>,
    pub status: QueueStatus,
    #[serde(default)]
    pub result: Option<ActionResult>,
}

impl QueuedAction {
    pub fn new(action: TurnAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            queued_at: Utc::now(),
            status: QueueStatus::Pending,
            result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_actions_end_turn() {
        let end = TurnAction::End {
            entity_id: "e".into(),
        };
        let mv = TurnAction::Move {
            entity_id: "e".into(),
            position: Position::new(0, 0),
        };
        let attack = TurnAction::Attack {
            entity_id: "e".into(),
            target: "t".into(),
        };
        let interact = TurnAction::Interact {
            entity_id: "e".into(),
            target: None,
            position: None,
            parameters: serde_json::Value::Null,
        };
        assert!(end.ends_turn());
        assert!(attack.ends_turn());
        assert!(!mv.ends_turn());
        assert!(!interact.ends_turn());
    }

    #[test]
    fn action_wire_shape() {
        let json = serde_json::json!({
            "type": "move",
            "entity_id": "p1",
            "position": { "x": 2, "y": 1 }
        });
        let action: TurnAction = serde_json::from_value(json).unwrap();
        assert_eq!(action.kind_name(), "move");
        assert_eq!(action.entity_id(), "p1");
    }
}
