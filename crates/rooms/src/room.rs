//! Interaction room: participants + engine + lifecycle, one lock.
//!
//! A room is a concurrency domain. Every operation — engine mutation, chat
//! append, broadcast enqueue — runs under the single room lock, which makes
//! the state invariants hold without fine-grained locking and guarantees
//! per-room event ordering. Timer tasks and queue drainers re-acquire the
//! lock before touching state, so a timeout-skip can never race a
//! same-turn action. No lock is held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use wr_broadcast::Broadcaster;
use wr_chat::{ChatService, Delivery, SendRequest};
use wr_domain::config::{EngineConfig, RoomsConfig};
use wr_domain::{
    ActionResult, ChannelKind, ChatMessage, EntityKind, Error, EventKind, GameState, GameStatus,
    Participant, Result, TurnAction,
};
use wr_engine::{GameEngine, Outcome, TimerDirective};

use crate::signal::{PersistenceReason, PersistenceSignal, PersistenceSender};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Room types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Active,
    Paused,
    Completed,
}

/// What a joining client receives: identity plus the full authoritative
/// snapshot (deltas take over from there).
#[derive(Debug, Clone, Serialize)]
pub struct JoinInfo {
    pub room_id: Uuid,
    pub participant_count: usize,
    pub game_state: GameState,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_id: Uuid,
    pub status: RoomStatus,
    pub participant_count: usize,
    pub game_state: GameState,
}

struct RoomInner {
    engine: GameEngine,
    participants: HashMap<String, Participant>,
    status: RoomStatus,
    last_activity: Instant,
    created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Room
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Room {
    pub room_id: Uuid,
    pub interaction_id: String,
    inner: Mutex<RoomInner>,
    broadcaster: Arc<Broadcaster>,
    chat: Arc<ChatService>,
    persistence: Option<PersistenceSender>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("room_id", &self.room_id)
            .field("interaction_id", &self.interaction_id)
            .finish_non_exhaustive()
    }
}

impl Room {
    pub fn new(
        interaction_id: &str,
        initial_state: GameState,
        engine_config: EngineConfig,
        broadcaster: Arc<Broadcaster>,
        chat: Arc<ChatService>,
        persistence: Option<PersistenceSender>,
    ) -> Arc<Self> {
        Arc::new(Self {
            room_id: Uuid::new_v4(),
            interaction_id: interaction_id.to_owned(),
            inner: Mutex::new(RoomInner {
                engine: GameEngine::new(initial_state, engine_config),
                participants: HashMap::new(),
                status: RoomStatus::Active,
                last_activity: Instant::now(),
                created_at: Utc::now(),
            }),
            broadcaster,
            chat,
            persistence,
        })
    }

    // ── Participants ─────────────────────────────────────────────────

    /// Join, idempotent by `user_id`: a re-join replaces the connection and
    /// keeps the original entity binding. First joins materialize the
    /// entity in the game state.
    pub fn join(
        self: &Arc<Self>,
        user_id: &str,
        entity_id: &str,
        entity_kind: EntityKind,
        connection_id: &str,
    ) -> Result<JoinInfo> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }

        let RoomInner {
            engine,
            participants,
            last_activity,
            ..
        } = &mut *inner;
        let outcome = match participants.entry(user_id.to_owned()) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.connection_id = connection_id.to_owned();
                existing.connected = true;
                existing.touch();
                Outcome::default()
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                let outcome = engine.ensure_entity(entity_id, entity_kind, user_id)?;
                entry.insert(Participant::new(user_id, entity_id, entity_kind, connection_id));
                outcome
            }
        };

        let entity_id = participants[user_id].entity_id.clone();
        let participant_count = participants.len();
        *last_activity = Instant::now();

        self.apply_outcome(outcome);
        self.broadcaster.broadcast(
            &self.interaction_id,
            EventKind::ParticipantJoined {
                user_id: user_id.to_owned(),
                entity_id,
                participant_count,
            },
        );
        tracing::info!(
            interaction_id = %self.interaction_id,
            user_id,
            participant_count,
            "participant joined"
        );

        Ok(JoinInfo {
            room_id: self.room_id,
            participant_count,
            game_state: inner.engine.snapshot(),
        })
    }

    /// Remove a participant. Returns false for unknown users. An empty
    /// room is not destroyed here — the manager's inactivity sweep decides.
    pub fn leave(&self, user_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.participants.remove(user_id).is_none() {
            return false;
        }
        let participant_count = inner.participants.len();
        inner.last_activity = Instant::now();

        self.broadcaster.broadcast(
            &self.interaction_id,
            EventKind::ParticipantLeft {
                user_id: user_id.to_owned(),
                participant_count,
            },
        );
        tracing::info!(
            interaction_id = %self.interaction_id,
            user_id,
            participant_count,
            "participant left"
        );
        true
    }

    // ── Turn operations ──────────────────────────────────────────────

    /// Process one action for the caller's own entity.
    pub fn process_action(
        self: &Arc<Self>,
        user_id: &str,
        action: TurnAction,
    ) -> Result<(ActionResult, GameState)> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }
        Self::check_entity_ownership(&inner, user_id, action.entity_id())?;

        let (result, outcome) = inner.engine.process_turn_action(action);
        inner.last_activity = Instant::now();
        self.apply_outcome(outcome);
        Ok((result, inner.engine.snapshot()))
    }

    /// Skip the current turn; the caller must own the current entity.
    pub fn skip_turn(self: &Arc<Self>, user_id: &str, reason: &str) -> Result<GameState> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }
        let current_entity = inner
            .engine
            .state()
            .current_entry()
            .map(|entry| entry.entity_id.clone())
            .ok_or_else(|| Error::InvalidState("initiative order is empty".to_owned()))?;
        Self::check_entity_ownership(&inner, user_id, &current_entity)?;

        let outcome = inner.engine.skip_current_turn(reason)?;
        inner.last_activity = Instant::now();
        self.apply_outcome(outcome);
        Ok(inner.engine.snapshot())
    }

    // ── Action queue ─────────────────────────────────────────────────

    /// Enqueue an action on the caller's entity queue and make sure a
    /// drainer task is running for it.
    pub fn queue_action(self: &Arc<Self>, user_id: &str, action: TurnAction) -> Result<Uuid> {
        let entity_id = action.entity_id().to_owned();
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }
        Self::check_entity_ownership(&inner, user_id, &entity_id)?;

        let id = inner.engine.queue_action(action)?;
        inner.last_activity = Instant::now();
        if inner.engine.try_begin_drain(&entity_id) {
            self.spawn_drainer(entity_id);
        }
        Ok(id)
    }

    /// Cancel one of the caller's pending queued actions.
    pub fn cancel_queued(&self, user_id: &str, action_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock();
        if !inner.participants.contains_key(user_id) {
            return Err(Error::PermissionDenied(format!(
                "{user_id} is not a participant of this interaction"
            )));
        }
        Ok(inner.engine.cancel_queued(action_id))
    }

    fn spawn_drainer(self: &Arc<Self>, entity_id: String) {
        let room = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if !room.drain_one(&entity_id) {
                    break;
                }
                // Let other tasks interleave between actions.
                tokio::task::yield_now().await;
            }
        });
    }

    /// Process one queued action. Returns false when the drain is done:
    /// queue empty, validation failure, or an `end` action.
    fn drain_one(self: &Arc<Self>, entity_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(queued) = inner.engine.begin_queued(entity_id) else {
            inner.engine.end_drain(entity_id);
            return false;
        };

        let (result, outcome) = inner.engine.process_turn_action(queued.action.clone());
        inner.engine.finish_queued(entity_id, result.clone());
        inner.last_activity = Instant::now();
        self.apply_outcome(outcome);

        // Completion signal to the acting user, through the same ordered
        // event stream as everything else.
        let completed = EventKind::QueuedActionCompleted {
            action_id: queued.id,
            entity_id: entity_id.to_owned(),
            result: result.clone(),
        };
        let owner = inner
            .participants
            .values()
            .find(|p| p.entity_id == entity_id)
            .map(|p| p.user_id.clone());
        match owner {
            Some(user_id) => {
                self.broadcaster
                    .broadcast_to_user(&self.interaction_id, &user_id, completed);
            }
            None => {
                self.broadcaster.broadcast(&self.interaction_id, completed);
            }
        }

        let halted = !result.valid || matches!(queued.action, TurnAction::End { .. });
        if halted {
            inner.engine.end_drain(entity_id);
        }
        !halted
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// DM pause. Stops the turn timer; resume grants a fresh full budget.
    pub fn pause(self: &Arc<Self>, dm_user_id: &str, reason: Option<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.status != RoomStatus::Active {
            return Err(Error::InvalidState(format!(
                "cannot pause a {} room",
                room_status_name(inner.status)
            )));
        }

        let game_status = inner.engine.state().status;
        match game_status {
            GameStatus::Active => {
                let outcome = inner.engine.pause(reason.clone())?;
                self.apply_outcome(outcome);
            }
            // Nothing is running yet; the pause is room-level only.
            GameStatus::Waiting => {
                self.broadcaster.broadcast(
                    &self.interaction_id,
                    EventKind::InteractionPaused { reason: reason.clone() },
                );
            }
            _ => {
                return Err(Error::InvalidState(
                    "game is not in a pausable state".to_owned(),
                ))
            }
        }

        inner.status = RoomStatus::Paused;
        inner.last_activity = Instant::now();
        self.emit_persistence(PersistenceReason::Pause, inner.engine.snapshot());
        tracing::info!(
            interaction_id = %self.interaction_id,
            dm_user_id,
            reason = reason.as_deref().unwrap_or(""),
            "interaction paused"
        );
        Ok(())
    }

    pub fn resume(self: &Arc<Self>, dm_user_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.status != RoomStatus::Paused {
            return Err(Error::InvalidState(format!(
                "cannot resume a {} room",
                room_status_name(inner.status)
            )));
        }

        let game_status = inner.engine.state().status;
        match game_status {
            GameStatus::Paused => {
                let outcome = inner.engine.resume()?;
                self.apply_outcome(outcome);
            }
            GameStatus::Waiting => {
                self.broadcaster
                    .broadcast(&self.interaction_id, EventKind::InteractionResumed);
            }
            _ => {
                return Err(Error::InvalidState(
                    "game is not in a resumable state".to_owned(),
                ))
            }
        }

        inner.status = RoomStatus::Active;
        inner.last_activity = Instant::now();
        tracing::info!(interaction_id = %self.interaction_id, dm_user_id, "interaction resumed");
        Ok(())
    }

    /// Terminal completion.
    pub fn complete(self: &Arc<Self>, dm_user_id: &str, reason: Option<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }

        let outcome = inner.engine.complete()?;
        inner.status = RoomStatus::Completed;
        inner.last_activity = Instant::now();
        self.apply_outcome(outcome);
        self.emit_persistence(PersistenceReason::Complete, inner.engine.snapshot());
        tracing::info!(
            interaction_id = %self.interaction_id,
            dm_user_id,
            reason = reason.as_deref().unwrap_or(""),
            "interaction completed"
        );
        Ok(())
    }

    // ── DM turn control ──────────────────────────────────────────────

    pub fn backtrack(
        self: &Arc<Self>,
        dm_user_id: &str,
        turn_number: usize,
        round_number: u32,
    ) -> Result<GameState> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }
        let outcome = inner.engine.backtrack(turn_number, round_number, dm_user_id)?;
        inner.last_activity = Instant::now();
        self.apply_outcome(outcome);
        Ok(inner.engine.snapshot())
    }

    pub fn redo(
        self: &Arc<Self>,
        dm_user_id: &str,
        entity_id: &str,
        actions: Vec<TurnAction>,
    ) -> Result<(bool, GameState)> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }
        let (success, outcome) = inner.engine.redo(entity_id, actions, dm_user_id)?;
        inner.last_activity = Instant::now();
        self.apply_outcome(outcome);
        Ok((success, inner.engine.snapshot()))
    }

    pub fn update_initiative(
        self: &Arc<Self>,
        dm_user_id: &str,
        order: Vec<wr_domain::InitiativeEntry>,
    ) -> Result<GameState> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }
        let outcome = inner.engine.update_initiative_order(order)?;
        inner.last_activity = Instant::now();
        self.apply_outcome(outcome);
        tracing::debug!(interaction_id = %self.interaction_id, dm_user_id, "initiative updated");
        Ok(inner.engine.snapshot())
    }

    // ── Chat ─────────────────────────────────────────────────────────

    /// Run the chat pipeline and deliver per its routing: room-wide for
    /// party/dm, targeted for private and addressed system messages.
    pub fn send_chat(self: &Arc<Self>, request: SendRequest) -> Result<ChatMessage> {
        let mut inner = self.inner.lock();
        if inner.status == RoomStatus::Completed {
            return Err(Error::InvalidState("interaction is completed".to_owned()));
        }

        let before = inner.engine.snapshot();
        let RoomInner {
            engine,
            participants,
            ..
        } = &mut *inner;
        let (message, delivery) =
            self.chat
                .send_message(engine.state_mut(), participants, request)?;

        let event = EventKind::ChatMessage {
            message: message.clone(),
        };
        match &delivery {
            Delivery::Room => {
                self.broadcaster.broadcast(&self.interaction_id, event);
            }
            Delivery::Users(users) => {
                for user_id in users {
                    self.broadcaster.broadcast_to_user(
                        &self.interaction_id,
                        user_id,
                        event.clone(),
                    );
                }
            }
        }

        let delta = wr_engine::delta::diff(&before, inner.engine.state());
        if !delta.is_empty() {
            self.broadcaster.broadcast_delta(&self.interaction_id, delta);
        }
        inner.last_activity = Instant::now();
        Ok(message)
    }

    /// Visibility-filtered history, newest first, plus the total visible
    /// count.
    pub fn chat_history(
        &self,
        user_id: &str,
        channel: Option<ChannelKind>,
        limit: usize,
    ) -> (Vec<ChatMessage>, usize) {
        let inner = self.inner.lock();
        let state = inner.engine.state();
        let messages = self.chat.history(state, user_id, channel, limit);
        let total = self.chat.visible_count(state, user_id, channel);
        (messages, total)
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn snapshot(&self) -> RoomSnapshot {
        let inner = self.inner.lock();
        RoomSnapshot {
            room_id: self.room_id,
            status: inner.status,
            participant_count: inner.participants.len(),
            game_state: inner.engine.snapshot(),
        }
    }

    pub fn status(&self) -> RoomStatus {
        self.inner.lock().status
    }

    pub fn participant_count(&self) -> usize {
        self.inner.lock().participants.len()
    }

    pub fn connected_count(&self) -> usize {
        self.inner
            .lock()
            .participants
            .values()
            .filter(|p| p.connected)
            .count()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.lock().created_at
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.inner.lock().participants.contains_key(user_id)
    }

    pub fn participant(&self, user_id: &str) -> Option<Participant> {
        self.inner.lock().participants.get(user_id).cloned()
    }

    /// Reap decision for the manager's sweep. A room goes when it has been
    /// idle past the inactivity window and is not an occupied active room;
    /// completed rooms go after the grace period.
    pub fn is_reapable(&self, now: Instant, inactivity: Duration, completed_grace: Duration) -> bool {
        let inner = self.inner.lock();
        let idle = now.saturating_duration_since(inner.last_activity);
        match inner.status {
            RoomStatus::Completed => idle > completed_grace,
            RoomStatus::Active => inner.participants.is_empty() && idle > inactivity,
            RoomStatus::Paused => idle > inactivity,
        }
    }

    /// Emit the pre-destruction persistence signal.
    pub fn persist_for(&self, reason: PersistenceReason) {
        let snapshot = self.inner.lock().engine.snapshot();
        self.emit_persistence(reason, snapshot);
    }

    // ── Internals ────────────────────────────────────────────────────

    fn check_entity_ownership(inner: &RoomInner, user_id: &str, entity_id: &str) -> Result<()> {
        let participant = inner.participants.get(user_id).ok_or_else(|| {
            Error::PermissionDenied(format!(
                "{user_id} is not a participant of this interaction"
            ))
        })?;
        if participant.entity_id != entity_id {
            return Err(Error::PermissionDenied(format!(
                "{user_id} does not control entity {entity_id}"
            )));
        }
        Ok(())
    }

    /// Broadcast an outcome's events and delta, and act on its timer
    /// directive. Called with the room lock held so a room's events reach
    /// the broadcaster in emission order.
    fn apply_outcome(self: &Arc<Self>, outcome: Outcome) {
        for event in outcome.events {
            self.broadcaster.broadcast(&self.interaction_id, event);
        }
        if let Some(delta) = outcome.delta {
            self.broadcaster.broadcast_delta(&self.interaction_id, delta);
        }
        if let TimerDirective::Arm { generation, timeout } = outcome.timer {
            self.spawn_timer(generation, timeout);
        }
    }

    fn spawn_timer(self: &Arc<Self>, generation: u64, timeout: Duration) {
        let room = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(room) = room.upgrade() else {
                return;
            };
            room.on_turn_timeout(generation);
        });
    }

    fn on_turn_timeout(self: &Arc<Self>, generation: u64) {
        let mut inner = self.inner.lock();
        if let Some(outcome) = inner.engine.on_timer_fire(generation) {
            tracing::info!(
                interaction_id = %self.interaction_id,
                "turn skipped by timeout"
            );
            inner.last_activity = Instant::now();
            self.apply_outcome(outcome);
        }
    }

    fn emit_persistence(&self, reason: PersistenceReason, game_state: GameState) {
        if let Some(sender) = &self.persistence {
            // A dropped receiver is fine; persistence is optional.
            let _ = sender.send(PersistenceSignal {
                interaction_id: self.interaction_id.clone(),
                reason,
                game_state,
                at: Utc::now(),
            });
        }
    }
}

fn room_status_name(status: RoomStatus) -> &'static str {
    match status {
        RoomStatus::Active => "active",
        RoomStatus::Paused => "paused",
        RoomStatus::Completed => "completed",
    }
}
