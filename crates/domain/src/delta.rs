//! Minimal change descriptions between consecutive game-state snapshots.
//!
//! Deltas cover a fixed set of observable fields and are the basis for
//! efficient wire sync: clients receive the full authoritative state on
//! join, then apply batched deltas. The engine computes them; this module
//! owns the wire type and the client-side `apply_to`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::action::TurnRecord;
use crate::chat::ChatMessage;
use crate::state::{GameState, GameStatus, InitiativeEntry, Inventory, Position, TurnStatus};

/// Per-entity observable changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_status: Option<TurnStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
}

impl EntityDelta {
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.current_hp.is_none()
            && self.turn_status.is_none()
            && self.inventory.is_none()
    }
}

/// A diff between two snapshots over the observable field set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_number: Option<u32>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub entities: HashMap<String, EntityDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiative_order: Option<Vec<InitiativeEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_entities: Option<HashMap<String, Position>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_turn_records: Vec<TurnRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_chat_messages: Vec<ChatMessage>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.current_turn_index.is_none()
            && self.round_number.is_none()
            && self.entities.is_empty()
            && self.initiative_order.is_none()
            && self.map_entities.is_none()
            && self.new_turn_records.is_empty()
            && self.new_chat_messages.is_empty()
    }

    /// Apply this delta to a client-held snapshot.
    ///
    /// Applying the emitted delta sequence to the initial snapshot yields
    /// the same observable fields as the authoritative state.
    pub fn apply_to(&self, state: &mut GameState) {
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(index) = self.current_turn_index {
            state.current_turn_index = index;
        }
        if let Some(round) = self.round_number {
            state.round_number = round;
        }
        for (entity_id, change) in &self.entities {
            if let Some(entity) = state.entity_states.get_mut(entity_id) {
                if let Some(position) = change.position {
                    entity.position = position;
                }
                if let Some(hp) = change.current_hp {
                    entity.current_hp = hp;
                }
                if let Some(turn_status) = change.turn_status {
                    entity.turn_status = turn_status;
                }
                if let Some(inventory) = &change.inventory {
                    entity.inventory = inventory.clone();
                }
            }
        }
        if let Some(order) = &self.initiative_order {
            state.initiative_order = order.clone();
        }
        if let Some(map_entities) = &self.map_entities {
            state.map.entities = map_entities.clone();
        }
        for record in &self.new_turn_records {
            state.turn_history.push_back(record.clone());
        }
        for message in &self.new_chat_messages {
            state.chat_log.push_back(message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_delta_is_empty() {
        assert!(StateDelta::default().is_empty());
    }

    #[test]
    fn apply_scalar_and_entity_changes() {
        let mut state = GameState::new("i1", 10, 10);
        state.entity_states.insert(
            "p1".into(),
            crate::state::EntityState::new(
                "p1",
                crate::state::EntityKind::PlayerCharacter,
                20,
                Position::new(1, 1),
            ),
        );

        let mut delta = StateDelta {
            status: Some(GameStatus::Active),
            round_number: Some(3),
            ..Default::default()
        };
        delta.entities.insert(
            "p1".into(),
            EntityDelta {
                position: Some(Position::new(2, 1)),
                current_hp: Some(15),
                ..Default::default()
            },
        );

        delta.apply_to(&mut state);
        assert_eq!(state.status, GameStatus::Active);
        assert_eq!(state.round_number, 3);
        let p1 = state.entity("p1").unwrap();
        assert_eq!(p1.position, Position::new(2, 1));
        assert_eq!(p1.current_hp, 15);
    }
}
