//! Game events fanned out to room subscribers.
//!
//! The engine and room produce [`EventKind`]s; the broadcaster enriches
//! them with the room's `interaction_id` and a timestamp on emission, so
//! every delivered [`GameEvent`] carries both.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::ActionResult;
use crate::chat::ChatMessage;
use crate::delta::StateDelta;
use crate::state::InitiativeEntry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ParticipantJoined,
    ParticipantLeft,
    TurnStarted,
    TurnCompleted,
    TurnSkipped,
    TurnBacktracked,
    NewRound,
    InitiativeUpdated,
    InteractionPaused,
    InteractionResumed,
    StateDelta,
    ChatMessage,
    QueuedActionCompleted,
}

impl EventType {
    /// Stable wire tag, identical to the serde representation. Used as
    /// the SSE event name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParticipantJoined => "participant_joined",
            Self::ParticipantLeft => "participant_left",
            Self::TurnStarted => "turn_started",
            Self::TurnCompleted => "turn_completed",
            Self::TurnSkipped => "turn_skipped",
            Self::TurnBacktracked => "turn_backtracked",
            Self::NewRound => "new_round",
            Self::InitiativeUpdated => "initiative_updated",
            Self::InteractionPaused => "interaction_paused",
            Self::InteractionResumed => "interaction_resumed",
            Self::StateDelta => "state_delta",
            Self::ChatMessage => "chat_message",
            Self::QueuedActionCompleted => "queued_action_completed",
        }
    }
}

/// What a subscription wants delivered: everything, or a set of types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Types(HashSet<EventType>),
}

impl EventFilter {
    pub fn types(types: impl IntoIterator<Item = EventType>) -> Self {
        Self::Types(types.into_iter().collect())
    }

    pub fn matches(&self, event_type: EventType) -> bool {
        match self {
            Self::All => true,
            Self::Types(set) => set.contains(&event_type),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ParticipantJoined {
        user_id: String,
        entity_id: String,
        participant_count: usize,
    },
    ParticipantLeft {
        user_id: String,
        participant_count: usize,
    },
    TurnStarted {
        entity_id: String,
        turn_index: usize,
        round_number: u32,
    },
    TurnCompleted {
        entity_id: String,
        turn_index: usize,
        round_number: u32,
    },
    TurnSkipped {
        entity_id: String,
        turn_index: usize,
        round_number: u32,
        reason: String,
    },
    TurnBacktracked {
        target_turn: usize,
        target_round: u32,
        dm_user_id: String,
    },
    NewRound {
        round_number: u32,
    },
    InitiativeUpdated {
        order: Vec<InitiativeEntry>,
    },
    InteractionPaused {
        #[serde(default)]
        reason: Option<String>,
    },
    InteractionResumed,
    StateDelta {
        deltas: Vec<StateDelta>,
    },
    ChatMessage {
        message: ChatMessage,
    },
    QueuedActionCompleted {
        action_id: Uuid,
        entity_id: String,
        result: ActionResult,
    },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::ParticipantJoined { .. } => EventType::ParticipantJoined,
            Self::ParticipantLeft { .. } => EventType::ParticipantLeft,
            Self::TurnStarted { .. } => EventType::TurnStarted,
            Self::TurnCompleted { .. } => EventType::TurnCompleted,
            Self::TurnSkipped { .. } => EventType::TurnSkipped,
            Self::TurnBacktracked { .. } => EventType::TurnBacktracked,
            Self::NewRound { .. } => EventType::NewRound,
            Self::InitiativeUpdated { .. } => EventType::InitiativeUpdated,
            Self::InteractionPaused { .. } => EventType::InteractionPaused,
            Self::InteractionResumed => EventType::InteractionResumed,
            Self::StateDelta { .. } => EventType::StateDelta,
            Self::ChatMessage { .. } => EventType::ChatMessage,
            Self::QueuedActionCompleted { .. } => EventType::QueuedActionCompleted,
        }
    }
}

/// An emitted event: payload plus room identity and emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub interaction_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl GameEvent {
    pub fn new(interaction_id: &str, kind: EventKind) -> Self {
        Self {
            interaction_id: interaction_id.to_owned(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_wildcard_and_typed() {
        let all = EventFilter::All;
        assert!(all.matches(EventType::TurnStarted));

        let typed = EventFilter::types([EventType::ChatMessage, EventType::NewRound]);
        assert!(typed.matches(EventType::ChatMessage));
        assert!(!typed.matches(EventType::TurnStarted));
    }

    #[test]
    fn event_carries_room_identity() {
        let event = GameEvent::new("enc-1", EventKind::NewRound { round_number: 2 });
        assert_eq!(event.interaction_id, "enc-1");
        assert_eq!(event.event_type(), EventType::NewRound);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "new_round");
        assert_eq!(json["interaction_id"], "enc-1");
    }
}
