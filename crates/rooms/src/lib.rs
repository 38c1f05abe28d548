//! Interaction rooms and the process-wide room manager.
//!
//! A [`Room`] combines the participant set, the game state engine, and the
//! room's lifecycle under one lock — the per-room serialization domain.
//! The [`RoomManager`] owns the registry and the inactivity sweep.

pub mod manager;
pub mod room;
pub mod signal;

pub use manager::{ManagerStats, RoomManager, StatsConfig};
pub use room::{JoinInfo, Room, RoomSnapshot, RoomStatus};
pub use signal::{PersistenceReason, PersistenceReceiver, PersistenceSender, PersistenceSignal};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use tokio::sync::mpsc;

    use wr_broadcast::Broadcaster;
    use wr_chat::{ChatService, SendRequest};
    use wr_domain::config::Config;
    use wr_domain::{
        ChannelKind, EntityKind, Error, EventFilter, EventType, GameEvent, InitiativeEntry,
        Position, TurnAction,
    };

    use super::*;

    fn manager_with(config: Config) -> (Arc<RoomManager>, Arc<Broadcaster>, PersistenceReceiver) {
        let broadcaster = Arc::new(Broadcaster::new(config.broadcast.clone()));
        let chat = Arc::new(ChatService::new(config.chat.clone()).unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(RoomManager::new(
            &config,
            Arc::clone(&broadcaster),
            chat,
            Some(tx),
        ));
        (manager, broadcaster, rx)
    }

    fn manager() -> (Arc<RoomManager>, Arc<Broadcaster>, PersistenceReceiver) {
        manager_with(Config::default())
    }

    fn entry(id: &str, initiative: i32) -> InitiativeEntry {
        InitiativeEntry {
            entity_id: id.to_owned(),
            entity_kind: EntityKind::PlayerCharacter,
            initiative,
            user_id: None,
        }
    }

    fn subscribe_all(
        broadcaster: &Arc<Broadcaster>,
        interaction_id: &str,
        user_id: &str,
    ) -> mpsc::UnboundedReceiver<GameEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        broadcaster
            .subscribe(interaction_id, EventFilter::All, Box::new(tx), Some(user_id))
            .unwrap();
        rx
    }

    #[tokio::test]
    async fn join_creates_room_and_is_idempotent() {
        let (manager, _b, _rx) = manager();

        let first = manager
            .join_room("enc-1", "alice", "alice-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        assert_eq!(first.participant_count, 1);
        assert_eq!(first.game_state.map.width, 20);
        assert!(first.game_state.entity("alice-pc").is_some());
        assert!(first.game_state.map.entities.contains_key("alice-pc"));

        // Re-join replaces the connection, not the participant.
        let second = manager
            .join_room("enc-1", "alice", "ignored", EntityKind::Monster, "c2")
            .unwrap();
        assert_eq!(second.participant_count, 1);
        assert_eq!(second.room_id, first.room_id);
        let room = manager.get_room("enc-1").unwrap();
        assert!(room.is_participant("alice"));
        // The original entity binding survives the re-join.
        assert!(second.game_state.entity("ignored").is_none());
    }

    #[tokio::test]
    async fn create_room_collision_is_already_exists() {
        let (manager, _b, _rx) = manager();
        manager
            .create_room("enc-1", wr_domain::GameState::new("enc-1", 10, 10))
            .unwrap();
        let err = manager
            .create_room("enc-1", wr_domain::GameState::new("enc-1", 10, 10))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn secondary_room_id_index() {
        let (manager, _b, _rx) = manager();
        let info = manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        let room = manager.get_room_by_id(info.room_id).unwrap();
        assert_eq!(room.interaction_id, "enc-1");
    }

    #[tokio::test]
    async fn leave_unknown_returns_false() {
        let (manager, _b, _rx) = manager();
        assert!(!manager.leave_room("ghost", "alice"));
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        assert!(manager.leave_room("enc-1", "alice"));
        assert!(!manager.leave_room("enc-1", "alice"));
        // Emptied rooms stay registered until the sweep.
        assert!(manager.get_room("enc-1").is_some());
    }

    #[tokio::test]
    async fn take_turn_requires_entity_ownership() {
        let (manager, _b, _rx) = manager();
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        manager
            .join_room("enc-1", "bob", "b-pc", EntityKind::PlayerCharacter, "c2")
            .unwrap();
        let room = manager.get_room("enc-1").unwrap();
        room.update_initiative("dm", vec![entry("a-pc", 20), entry("b-pc", 10)])
            .unwrap();

        let err = room
            .process_action("bob", TurnAction::End { entity_id: "a-pc".into() })
            .unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));

        let (result, state) = room
            .process_action("alice", TurnAction::End { entity_id: "a-pc".into() })
            .unwrap();
        assert!(result.valid);
        assert_eq!(state.current_turn_index, 1);
    }

    #[tokio::test]
    async fn skip_requires_current_entity_ownership() {
        let (manager, _b, _rx) = manager();
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        manager
            .join_room("enc-1", "bob", "b-pc", EntityKind::PlayerCharacter, "c2")
            .unwrap();
        let room = manager.get_room("enc-1").unwrap();
        room.update_initiative("dm", vec![entry("a-pc", 20), entry("b-pc", 10)])
            .unwrap();
        // Activate via alice's first action.
        room.process_action(
            "alice",
            TurnAction::Move {
                entity_id: "a-pc".into(),
                position: Position::new(0, 1),
            },
        )
        .unwrap();

        let err = room.skip_turn("bob", "impatient").unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        let state = room.skip_turn("alice", "done").unwrap();
        assert_eq!(state.current_turn_index, 1);
    }

    #[tokio::test]
    async fn pause_resume_complete_lifecycle_and_signals() {
        let (manager, _b, mut persistence) = manager();
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();

        manager
            .pause_room("enc-1", "dm", Some("dinner".into()))
            .unwrap();
        let signal = persistence.try_recv().unwrap();
        assert!(matches!(signal.reason, PersistenceReason::Pause));
        assert_eq!(signal.interaction_id, "enc-1");

        // Double pause is invalid state.
        let err = manager.pause_room("enc-1", "dm", None).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        manager.resume_room("enc-1", "dm").unwrap();
        manager.complete_room("enc-1", "dm", None).unwrap();
        let signal = persistence.try_recv().unwrap();
        assert!(matches!(signal.reason, PersistenceReason::Complete));

        // Completion is terminal for every further operation.
        let err = manager.resume_room("enc-1", "dm").unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        let room = manager.get_room("enc-1").unwrap();
        let err = room
            .process_action("alice", TurnAction::End { entity_id: "a-pc".into() })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn unknown_room_operations_are_not_found() {
        let (manager, _b, _rx) = manager();
        assert!(matches!(
            manager.pause_room("ghost", "dm", None),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.resume_room("ghost", "dm"),
            Err(Error::NotFound(_))
        ));
        assert!(manager.get_room("ghost").is_none());
    }

    #[tokio::test]
    async fn queue_drains_in_order_and_halts_on_end() {
        let (manager, broadcaster, _rx) = manager();
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        let room = manager.get_room("enc-1").unwrap();
        room.update_initiative("dm", vec![entry("a-pc", 10)]).unwrap();

        let mut events = subscribe_all(&broadcaster, "enc-1", "alice");

        // Two moves then an end; a fourth action stays pending after the
        // halt.
        room.queue_action(
            "alice",
            TurnAction::Move { entity_id: "a-pc".into(), position: Position::new(0, 1) },
        )
        .unwrap();
        room.queue_action(
            "alice",
            TurnAction::Move { entity_id: "a-pc".into(), position: Position::new(0, 2) },
        )
        .unwrap();
        room.queue_action("alice", TurnAction::End { entity_id: "a-pc".into() })
            .unwrap();
        let parked = room
            .queue_action(
                "alice",
                TurnAction::Move { entity_id: "a-pc".into(), position: Position::new(0, 3) },
            )
            .unwrap();

        // Let the drainer run.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = room.snapshot();
        assert_eq!(
            snapshot.game_state.entity("a-pc").unwrap().position,
            Position::new(0, 2)
        );
        // End advanced the (single-entity) order into round 2.
        assert_eq!(snapshot.game_state.round_number, 2);

        let mut completions = 0;
        while let Ok(event) = events.try_recv() {
            if event.event_type() == EventType::QueuedActionCompleted {
                completions += 1;
            }
        }
        assert_eq!(completions, 3, "three processed, the fourth is parked");

        // The parked action can still be canceled.
        assert!(room.cancel_queued("alice", parked).unwrap());
    }

    #[tokio::test]
    async fn chat_routes_and_is_visible_per_user() {
        let (manager, broadcaster, _rx) = manager();
        for (user, entity) in [("alice", "a-pc"), ("bob", "b-pc"), ("carol", "c-pc")] {
            manager
                .join_room("enc-1", user, entity, EntityKind::PlayerCharacter, "c")
                .unwrap();
        }
        let room = manager.get_room("enc-1").unwrap();

        let mut alice_rx = subscribe_all(&broadcaster, "enc-1", "alice");
        let mut bob_rx = subscribe_all(&broadcaster, "enc-1", "bob");
        let mut carol_rx = subscribe_all(&broadcaster, "enc-1", "carol");

        room.send_chat(SendRequest {
            user_id: "alice".into(),
            content: "the plan is secret".into(),
            channel: ChannelKind::Private,
            recipients: Some(vec!["bob".into()]),
            entity_id: None,
        })
        .unwrap();

        let chat_events = |rx: &mut mpsc::UnboundedReceiver<GameEvent>| {
            let mut count = 0;
            while let Ok(event) = rx.try_recv() {
                if event.event_type() == EventType::ChatMessage {
                    count += 1;
                }
            }
            count
        };
        assert_eq!(chat_events(&mut alice_rx), 1);
        assert_eq!(chat_events(&mut bob_rx), 1);
        assert_eq!(chat_events(&mut carol_rx), 0, "private excludes carol");

        let (messages, total) = room.chat_history("carol", None, 50);
        assert!(messages.is_empty());
        assert_eq!(total, 0);
        let (messages, _) = room.chat_history("bob", None, 50);
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn sweep_reaps_only_eligible_rooms() {
        let mut config = Config::default();
        config.rooms.inactivity_timeout_ms = 0;
        config.rooms.completed_grace_ms = 0;
        let (manager, _b, mut persistence) = manager_with(config);

        // Occupied active room: stays despite zero timeout.
        manager
            .join_room("busy", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        // Empty active room: reapable.
        manager
            .join_room("empty", "bob", "b-pc", EntityKind::PlayerCharacter, "c2")
            .unwrap();
        manager.leave_room("empty", "bob");

        tokio::time::sleep(Duration::from_millis(10)).await;
        let reaped = manager.sweep();
        assert_eq!(reaped, 1);
        assert!(manager.get_room("busy").is_some());
        assert!(manager.get_room("empty").is_none());

        // Reaping emitted the inactivity persistence signal (after the
        // join-time none).
        let mut saw_inactivity = false;
        while let Ok(signal) = persistence.try_recv() {
            if matches!(signal.reason, PersistenceReason::Inactivity) {
                saw_inactivity = true;
                assert_eq!(signal.interaction_id, "empty");
            }
        }
        assert!(saw_inactivity);
    }

    #[tokio::test]
    async fn occupied_active_room_is_never_reapable() {
        let (manager, _b, _rx) = manager();
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        let room = manager.get_room("enc-1").unwrap();
        // However stale, an active room with participants survives.
        assert!(!room.is_reapable(
            Instant::now() + Duration::from_secs(60 * 60),
            Duration::from_millis(0),
            Duration::from_millis(0),
        ));
        assert_eq!(room.participant_count(), 1);
    }

    #[tokio::test]
    async fn stats_aggregate_rooms_and_participants() {
        let (manager, _b, _rx) = manager();
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        manager
            .join_room("enc-1", "bob", "b-pc", EntityKind::PlayerCharacter, "c2")
            .unwrap();
        manager
            .join_room("enc-2", "carol", "c-pc", EntityKind::PlayerCharacter, "c3")
            .unwrap();
        manager.pause_room("enc-2", "dm", None).unwrap();

        let stats = manager.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.paused, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.total_participants, 3);
        assert_eq!(stats.connected_participants, 3);
        assert_eq!(stats.config.engine.turn_timeout_ms, 90_000);
    }

    #[tokio::test]
    async fn turn_timeout_skips_via_room_timer() {
        let mut config = Config::default();
        config.engine.turn_timeout_ms = 30;
        let (manager, broadcaster, _rx) = manager_with(config);
        manager
            .join_room("enc-1", "alice", "a-pc", EntityKind::PlayerCharacter, "c1")
            .unwrap();
        manager
            .join_room("enc-1", "bob", "b-pc", EntityKind::PlayerCharacter, "c2")
            .unwrap();
        let room = manager.get_room("enc-1").unwrap();
        room.update_initiative("dm", vec![entry("a-pc", 20), entry("b-pc", 10)])
            .unwrap();
        let mut events = subscribe_all(&broadcaster, "enc-1", "alice");

        // First action activates the game and arms the 30ms timer.
        room.process_action(
            "alice",
            TurnAction::Move { entity_id: "a-pc".into(), position: Position::new(0, 1) },
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        let state = room.snapshot().game_state;
        assert!(state.turn_history.iter().any(|r| {
            r.status == wr_domain::TurnOutcome::Skipped
        }));
        let mut saw_timeout_skip = false;
        while let Ok(event) = events.try_recv() {
            if let wr_domain::EventKind::TurnSkipped { reason, .. } = &event.kind {
                if reason == "timeout" {
                    saw_timeout_skip = true;
                }
            }
        }
        assert!(saw_timeout_skip);
    }
}
