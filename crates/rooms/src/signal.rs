//! Persistence attachment points.
//!
//! The core never persists state itself. At defined lifecycle moments a
//! room emits a [`PersistenceSignal`] on an optional channel the hosting
//! process may connect to a store; a missing receiver is not an error.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use wr_domain::GameState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceReason {
    Pause,
    Complete,
    Inactivity,
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersistenceSignal {
    pub interaction_id: String,
    pub reason: PersistenceReason,
    pub game_state: GameState,
    pub at: DateTime<Utc>,
}

pub type PersistenceSender = mpsc::UnboundedSender<PersistenceSignal>;
pub type PersistenceReceiver = mpsc::UnboundedReceiver<PersistenceSignal>;
