//! State-delta computation: diff two snapshots over the observable fields.

use wr_domain::{EntityDelta, GameState, StateDelta};

/// Diff `prev` against `next`. Returns an empty delta when nothing
/// observable changed.
pub fn diff(prev: &GameState, next: &GameState) -> StateDelta {
    let mut delta = StateDelta::default();

    if prev.status != next.status {
        delta.status = Some(next.status);
    }
    if prev.current_turn_index != next.current_turn_index {
        delta.current_turn_index = Some(next.current_turn_index);
    }
    if prev.round_number != next.round_number {
        delta.round_number = Some(next.round_number);
    }

    for (entity_id, entity) in &next.entity_states {
        let change = match prev.entity_states.get(entity_id) {
            Some(old) => EntityDelta {
                position: (old.position != entity.position).then_some(entity.position),
                current_hp: (old.current_hp != entity.current_hp).then_some(entity.current_hp),
                turn_status: (old.turn_status != entity.turn_status).then_some(entity.turn_status),
                inventory: (old.inventory != entity.inventory)
                    .then(|| entity.inventory.clone()),
            },
            // Entity materialized since the previous snapshot: all fields.
            None => EntityDelta {
                position: Some(entity.position),
                current_hp: Some(entity.current_hp),
                turn_status: Some(entity.turn_status),
                inventory: Some(entity.inventory.clone()),
            },
        };
        if !change.is_empty() {
            delta.entities.insert(entity_id.clone(), change);
        }
    }

    if prev.initiative_order != next.initiative_order {
        delta.initiative_order = Some(next.initiative_order.clone());
    }
    if prev.map.entities != next.map.entities {
        delta.map_entities = Some(next.map.entities.clone());
    }

    delta.new_turn_records = appended(&prev.turn_history, &next.turn_history, |a, b| a == b);
    delta.new_chat_messages = appended(&prev.chat_log, &next.chat_log, |a, b| a.id == b.id);

    delta
}

/// Records of `next` appended after `prev`'s tail. Robust against FIFO
/// trimming (the shared tail is located from the back) and against
/// truncation (no shared tail → nothing is "new").
fn appended<T: Clone>(
    prev: &std::collections::VecDeque<T>,
    next: &std::collections::VecDeque<T>,
    same: impl Fn(&T, &T) -> bool,
) -> Vec<T> {
    let Some(prev_last) = prev.back() else {
        return next.iter().cloned().collect();
    };
    match next.iter().rposition(|item| same(item, prev_last)) {
        Some(pos) => next.iter().skip(pos + 1).cloned().collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wr_domain::{EntityKind, EntityState, GameStatus, Position};

    fn base() -> GameState {
        let mut state = GameState::new("i1", 10, 10);
        let position = Position::new(1, 1);
        state
            .entity_states
            .insert("p1".into(), EntityState::new("p1", EntityKind::PlayerCharacter, 20, position));
        state.map.entities.insert("p1".into(), position);
        state
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let state = base();
        assert!(diff(&state, &state.clone()).is_empty());
    }

    #[test]
    fn scalar_and_entity_changes_are_captured() {
        let prev = base();
        let mut next = prev.clone();
        next.status = GameStatus::Active;
        next.entity_mut("p1").unwrap().current_hp = 12;
        next.entity_mut("p1").unwrap().position = Position::new(2, 1);
        next.map.entities.insert("p1".into(), Position::new(2, 1));

        let delta = diff(&prev, &next);
        assert_eq!(delta.status, Some(GameStatus::Active));
        let change = &delta.entities["p1"];
        assert_eq!(change.current_hp, Some(12));
        assert_eq!(change.position, Some(Position::new(2, 1)));
        assert!(change.turn_status.is_none());
        assert!(delta.map_entities.is_some());
    }

    #[test]
    fn delta_applies_back_to_snapshot() {
        // Delta round-trip: snapshot + emitted delta == authoritative state
        // over the observable fields.
        let prev = base();
        let mut next = prev.clone();
        next.status = GameStatus::Active;
        next.round_number = 2;
        next.entity_mut("p1").unwrap().current_hp = 7;

        let delta = diff(&prev, &next);
        let mut replayed = prev.clone();
        delta.apply_to(&mut replayed);

        assert_eq!(replayed.status, next.status);
        assert_eq!(replayed.round_number, next.round_number);
        assert_eq!(
            replayed.entity("p1").unwrap().current_hp,
            next.entity("p1").unwrap().current_hp
        );
    }

    #[test]
    fn appended_handles_fifo_trim() {
        use std::collections::VecDeque;
        let prev: VecDeque<i32> = [1, 2, 3].into();
        // 1 was trimmed from the head while 4 and 5 were appended.
        let next: VecDeque<i32> = [2, 3, 4, 5].into();
        assert_eq!(appended(&prev, &next, |a, b| a == b), vec![4, 5]);
    }

    #[test]
    fn appended_sees_nothing_after_truncation() {
        use std::collections::VecDeque;
        let prev: VecDeque<i32> = [1, 2, 3].into();
        let next: VecDeque<i32> = [1].into();
        assert!(appended(&prev, &next, |a, b| a == b).is_empty());
    }
}
