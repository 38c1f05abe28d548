//! Process-wide room registry.
//!
//! Rooms are keyed by `interaction_id` with a secondary index on
//! `room_id`. Lookups take the read lock; create/destroy take the write
//! lock. Cross-lock acquisitions follow Registry → Room → Broadcaster.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use wr_broadcast::Broadcaster;
use wr_chat::ChatService;
use wr_domain::config::{Config, EngineConfig, RoomsConfig};
use wr_domain::{EntityKind, Error, GameState, Result};

use crate::room::{JoinInfo, Room, RoomStatus};
use crate::signal::{PersistenceReason, PersistenceSender};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stats
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    pub total: usize,
    pub active: usize,
    pub paused: usize,
    pub completed: usize,
    pub total_participants: usize,
    pub connected_participants: usize,
    pub config: StatsConfig,
}

/// Config echo carried in stats responses.
#[derive(Debug, Clone, Serialize)]
pub struct StatsConfig {
    pub rooms: RoomsConfig,
    pub engine: EngineConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RoomManager {
    rooms_config: RoomsConfig,
    engine_config: EngineConfig,
    broadcaster: Arc<Broadcaster>,
    chat: Arc<ChatService>,
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    by_room_id: RwLock<HashMap<Uuid, String>>,
    persistence: Option<PersistenceSender>,
}

impl RoomManager {
    pub fn new(
        config: &Config,
        broadcaster: Arc<Broadcaster>,
        chat: Arc<ChatService>,
        persistence: Option<PersistenceSender>,
    ) -> Self {
        Self {
            rooms_config: config.rooms.clone(),
            engine_config: config.engine.clone(),
            broadcaster,
            chat,
            rooms: RwLock::new(HashMap::new()),
            by_room_id: RwLock::new(HashMap::new()),
            persistence,
        }
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Register a room for `interaction_id` with the given initial state.
    pub fn create_room(
        &self,
        interaction_id: &str,
        initial_state: GameState,
    ) -> Result<Arc<Room>> {
        let mut rooms = self.rooms.write();
        if rooms.contains_key(interaction_id) {
            return Err(Error::AlreadyExists(format!(
                "interaction {interaction_id} already has a room"
            )));
        }
        let room = Room::new(
            interaction_id,
            initial_state,
            self.engine_config.clone(),
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.chat),
            self.persistence.clone(),
        );
        rooms.insert(interaction_id.to_owned(), Arc::clone(&room));
        self.by_room_id
            .write()
            .insert(room.room_id, interaction_id.to_owned());
        tracing::info!(interaction_id, room_id = %room.room_id, "room created");
        Ok(room)
    }

    pub fn get_room(&self, interaction_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().get(interaction_id).cloned()
    }

    pub fn get_room_by_id(&self, room_id: Uuid) -> Option<Arc<Room>> {
        let interaction_id = self.by_room_id.read().get(&room_id).cloned()?;
        self.get_room(&interaction_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Join, creating the room on first join with a default waiting state.
    pub fn join_room(
        &self,
        interaction_id: &str,
        user_id: &str,
        entity_id: &str,
        entity_kind: EntityKind,
        connection_id: &str,
    ) -> Result<JoinInfo> {
        let room = match self.get_room(interaction_id) {
            Some(room) => room,
            None => {
                let state = GameState::new(
                    interaction_id,
                    self.engine_config.default_map_width,
                    self.engine_config.default_map_height,
                );
                match self.create_room(interaction_id, state) {
                    Ok(room) => room,
                    // Lost a create race: someone else's room wins.
                    Err(Error::AlreadyExists(_)) => self
                        .get_room(interaction_id)
                        .ok_or_else(|| Error::NotFound(interaction_id.to_owned()))?,
                    Err(other) => return Err(other),
                }
            }
        };
        room.join(user_id, entity_id, entity_kind, connection_id)
    }

    /// Returns false for an unknown room or participant. An emptied room
    /// stays registered; the inactivity sweep reaps it later unless it
    /// becomes active again within the window.
    pub fn leave_room(&self, interaction_id: &str, user_id: &str) -> bool {
        match self.get_room(interaction_id) {
            Some(room) => room.leave(user_id),
            None => false,
        }
    }

    pub fn pause_room(
        &self,
        interaction_id: &str,
        dm_user_id: &str,
        reason: Option<String>,
    ) -> Result<()> {
        self.require_room(interaction_id)?.pause(dm_user_id, reason)
    }

    pub fn resume_room(&self, interaction_id: &str, dm_user_id: &str) -> Result<()> {
        self.require_room(interaction_id)?.resume(dm_user_id)
    }

    pub fn complete_room(
        &self,
        interaction_id: &str,
        dm_user_id: &str,
        reason: Option<String>,
    ) -> Result<()> {
        self.require_room(interaction_id)?
            .complete(dm_user_id, reason)
    }

    pub fn require_room(&self, interaction_id: &str) -> Result<Arc<Room>> {
        self.get_room(interaction_id)
            .ok_or_else(|| Error::NotFound(format!("no room for interaction {interaction_id}")))
    }

    // ── Stats ────────────────────────────────────────────────────────

    pub fn stats(&self) -> ManagerStats {
        let rooms: Vec<Arc<Room>> = self.rooms.read().values().cloned().collect();
        let mut stats = ManagerStats {
            total: rooms.len(),
            active: 0,
            paused: 0,
            completed: 0,
            total_participants: 0,
            connected_participants: 0,
            config: StatsConfig {
                rooms: self.rooms_config.clone(),
                engine: self.engine_config.clone(),
            },
        };
        for room in rooms {
            match room.status() {
                RoomStatus::Active => stats.active += 1,
                RoomStatus::Paused => stats.paused += 1,
                RoomStatus::Completed => stats.completed += 1,
            }
            stats.total_participants += room.participant_count();
            stats.connected_participants += room.connected_count();
        }
        stats
    }

    // ── Sweep ────────────────────────────────────────────────────────

    /// One inactivity sweep. Each reaped room emits its persistence
    /// signal, is dropped from both indices, and its pending delta buffer
    /// is discarded.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let inactivity = Duration::from_millis(self.rooms_config.inactivity_timeout_ms);
        let grace = Duration::from_millis(self.rooms_config.completed_grace_ms);

        let reapable: Vec<Arc<Room>> = self
            .rooms
            .read()
            .values()
            .filter(|room| room.is_reapable(now, inactivity, grace))
            .cloned()
            .collect();

        for room in &reapable {
            room.persist_for(PersistenceReason::Inactivity);
            self.rooms.write().remove(&room.interaction_id);
            self.by_room_id.write().remove(&room.room_id);
            self.broadcaster.drop_room(&room.interaction_id);
            tracing::info!(
                interaction_id = %room.interaction_id,
                room_id = %room.room_id,
                "inactive room reaped"
            );
        }
        reapable.len()
    }

    /// Periodic sweeper task.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = Duration::from_millis(manager.rooms_config.sweep_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                manager.sweep();
            }
        })
    }

    /// Emit a final persistence signal per room and flush the broadcaster.
    pub fn shutdown(&self) {
        let rooms: Vec<Arc<Room>> = self.rooms.read().values().cloned().collect();
        for room in rooms {
            room.persist_for(PersistenceReason::Shutdown);
        }
        self.broadcaster.shutdown();
        tracing::info!("room manager shut down");
    }
}
