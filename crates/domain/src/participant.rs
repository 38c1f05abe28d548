//! Room participants: the binding between a principal and an entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::EntityKind;

/// A principal's presence in a room. Keyed by `user_id`; re-joining
/// replaces `connection_id` and preserves `entity_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub connection_id: String,
    pub connected: bool,
    pub last_activity: DateTime<Utc>,
}

impl Participant {
    pub fn new(user_id: &str, entity_id: &str, entity_kind: EntityKind, connection_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            entity_id: entity_id.to_owned(),
            entity_kind,
            connection_id: connection_id.to_owned(),
            connected: true,
            last_activity: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}
