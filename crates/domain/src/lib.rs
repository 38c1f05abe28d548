//! Shared domain model for the warroom interaction server.
//!
//! Every other crate in the workspace builds on these types: the
//! authoritative game state, turn actions and records, game events and
//! state deltas, chat messages, participants, the configuration tree,
//! and the shared error type.

pub mod action;
pub mod chat;
pub mod config;
pub mod delta;
pub mod error;
pub mod event;
pub mod participant;
pub mod principal;
pub mod state;

pub use action::{ActionResult, QueueStatus, QueuedAction, TurnAction, TurnOutcome, TurnRecord};
pub use chat::{ChannelKind, ChatMessage};
pub use config::Config;
pub use delta::{EntityDelta, StateDelta};
pub use error::{Error, Result};
pub use event::{EventFilter, EventKind, EventType, GameEvent};
pub use participant::Participant;
pub use principal::{Principal, Role, SYSTEM_USER};
pub use state::{
    EntityKind, EntityState, GameState, GameStatus, InitiativeEntry, Inventory, ItemLine,
    MapState, Position, TerrainPatch, TurnStatus,
};
