//! Authoritative game state for one interaction.
//!
//! A [`GameState`] is exclusively owned by its room and mutated only through
//! the engine. All snapshots handed to clients are value clones; the engine
//! diffs consecutive snapshots to produce [`crate::delta::StateDelta`]s.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::TurnRecord;
use crate::chat::ChatMessage;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Positions & entities
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A grid cell. Maps are rectangular with the origin at (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell, the metric used for movement
    /// and attack range checks.
    pub fn manhattan(&self, other: &Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    PlayerCharacter,
    Npc,
    Monster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Waiting,
    Active,
    Completed,
    Skipped,
}

/// One slot in the initiative order. Ordering key is descending
/// `initiative`; ties keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub initiative: i32,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// One inventory line. `id` is the line's opaque identity; `item_id` is the
/// catalog key (e.g. `"healing_potion"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemLine {
    pub id: uuid::Uuid,
    pub item_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<ItemLine>,
    #[serde(default)]
    pub equipped: Vec<String>,
    pub capacity: u32,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            equipped: Vec::new(),
            capacity: 20,
        }
    }
}

impl Inventory {
    /// Find a line by catalog item id.
    pub fn line(&self, item_id: &str) -> Option<&ItemLine> {
        self.items.iter().find(|l| l.item_id == item_id)
    }

    pub fn line_mut(&mut self, item_id: &str) -> Option<&mut ItemLine> {
        self.items.iter_mut().find(|l| l.item_id == item_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub entity_kind: EntityKind,
    #[serde(default)]
    pub user_id: Option<String>,
    pub current_hp: u32,
    pub max_hp: u32,
    pub position: Position,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub available_actions: Vec<String>,
    pub turn_status: TurnStatus,
}

impl EntityState {
    /// A fresh entity at full health. The caller places it on the map.
    pub fn new(entity_id: &str, entity_kind: EntityKind, max_hp: u32, position: Position) -> Self {
        Self {
            entity_id: entity_id.to_owned(),
            entity_kind,
            user_id: None,
            current_hp: max_hp,
            max_hp,
            position,
            conditions: Vec::new(),
            inventory: Inventory::default(),
            available_actions: Vec::new(),
            turn_status: TurnStatus::Waiting,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Map
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainPatch {
    pub position: Position,
    pub kind: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Grid map: entity occupancy, obstacles, terrain annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapState {
    pub width: i32,
    pub height: i32,
    /// entity_id → occupied cell. Cells are disjoint except for self.
    pub entities: HashMap<String, Position>,
    #[serde(default)]
    pub obstacles: HashSet<Position>,
    #[serde(default)]
    pub terrain: Vec<TerrainPatch>,
}

impl MapState {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            entities: HashMap::new(),
            obstacles: HashSet::new(),
            terrain: Vec::new(),
        }
    }

    pub fn in_bounds(&self, pos: &Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    pub fn is_obstacle(&self, pos: &Position) -> bool {
        self.obstacles.contains(pos)
    }

    /// The entity occupying `pos`, ignoring `excluding` (for self-moves).
    pub fn occupant(&self, pos: &Position, excluding: Option<&str>) -> Option<&str> {
        self.entities
            .iter()
            .find(|(id, p)| *p == pos && Some(id.as_str()) != excluding)
            .map(|(id, _)| id.as_str())
    }

    /// First unoccupied, non-obstacle cell in row-major order. Used to
    /// place entities materialized on join.
    pub fn first_free_cell(&self) -> Option<Position> {
        let occupied: HashSet<&Position> = self.entities.values().collect();
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Position::new(x, y);
                if !self.obstacles.contains(&pos) && !occupied.contains(&pos) {
                    return Some(pos);
                }
            }
        }
        None
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Game state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Canonical authoritative snapshot of one interaction.
///
/// Invariants maintained by the engine:
/// - `current_turn_index < initiative_order.len()` whenever the order is
///   non-empty, and `round_number >= 1`;
/// - every entity in `initiative_order` has an `entity_states` entry and a
///   `map.entities` cell;
/// - at most one entity has `turn_status == Active`, and it is the one at
///   `current_turn_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub interaction_id: String,
    pub status: GameStatus,
    pub initiative_order: Vec<InitiativeEntry>,
    pub current_turn_index: usize,
    pub round_number: u32,
    pub entity_states: HashMap<String, EntityState>,
    pub map: MapState,
    pub turn_history: VecDeque<TurnRecord>,
    pub chat_log: VecDeque<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}

impl GameState {
    /// A fresh waiting state with an empty map of the given size.
    pub fn new(interaction_id: &str, width: i32, height: i32) -> Self {
        Self {
            interaction_id: interaction_id.to_owned(),
            status: GameStatus::Waiting,
            initiative_order: Vec::new(),
            current_turn_index: 0,
            round_number: 1,
            entity_states: HashMap::new(),
            map: MapState::new(width, height),
            turn_history: VecDeque::new(),
            chat_log: VecDeque::new(),
            updated_at: Utc::now(),
        }
    }

    /// The initiative entry whose turn it currently is.
    pub fn current_entry(&self) -> Option<&InitiativeEntry> {
        self.initiative_order.get(self.current_turn_index)
    }

    pub fn entity(&self, entity_id: &str) -> Option<&EntityState> {
        self.entity_states.get(entity_id)
    }

    pub fn entity_mut(&mut self, entity_id: &str) -> Option<&mut EntityState> {
        self.entity_states.get_mut(entity_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Sort the initiative order by descending initiative, preserving
    /// insertion order among ties (stable sort).
    pub fn sort_initiative(&mut self) {
        self.initiative_order
            .sort_by(|a, b| b.initiative.cmp(&a.initiative));
    }
}
