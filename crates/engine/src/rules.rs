//! Pure action rules: validation and execution.
//!
//! These functions are side-effect free beyond the passed state and are
//! shared verbatim with the client-side predictor, which is what makes
//! optimistic predictions converge with server authority.
//!
//! Damage, spell resolution, and item effects beyond the healing potion are
//! deliberate stubs.

use wr_domain::config::EngineConfig;
use wr_domain::{GameState, GameStatus, TurnAction};

/// Catalog id of the only item with a modeled effect.
pub const HEALING_POTION: &str = "healing_potion";
/// Hit points restored by one healing potion.
pub const HEALING_POTION_RESTORE: u32 = 5;
/// Placeholder flat damage until a real damage model lands.
pub const BASE_ATTACK_DAMAGE: u32 = 1;

/// Validate an action against the current state. Returns the list of rule
/// violations; empty means the action may execute.
pub fn validate_action(
    state: &GameState,
    action: &TurnAction,
    config: &EngineConfig,
) -> Vec<String> {
    let mut errors = Vec::new();

    if state.status != GameStatus::Active {
        errors.push("Game is not active".to_owned());
        return errors;
    }

    let Some(current) = state.current_entry() else {
        errors.push("Initiative order is empty".to_owned());
        return errors;
    };
    if current.entity_id != action.entity_id() {
        errors.push("It's not your turn".to_owned());
        return errors;
    }

    let Some(entity) = state.entity(action.entity_id()) else {
        errors.push(format!("Unknown entity {}", action.entity_id()));
        return errors;
    };

    match action {
        TurnAction::Move { position, .. } => {
            if !state.map.in_bounds(position) {
                errors.push("Position out of bounds".to_owned());
            } else {
                if state.map.is_obstacle(position) {
                    errors.push("Position is blocked by an obstacle".to_owned());
                }
                if state.map.occupant(position, Some(&entity.entity_id)).is_some() {
                    errors.push("Position is occupied".to_owned());
                }
                if entity.position.manhattan(position) > config.max_move_distance {
                    errors.push("Position out of range".to_owned());
                }
            }
        }
        TurnAction::Attack { target, .. } => match state.entity(target) {
            None => errors.push("Target not found".to_owned()),
            Some(target_entity) => {
                if entity.position.manhattan(&target_entity.position) > config.max_attack_range {
                    errors.push("Target out of range".to_owned());
                }
            }
        },
        TurnAction::UseItem { item_id, .. } => {
            let available = entity
                .inventory
                .line(item_id)
                .map(|line| line.quantity > 0)
                .unwrap_or(false);
            if !available {
                errors.push(format!("Item {item_id} not available"));
            }
        }
        TurnAction::Cast { spell_id, .. } => {
            // Spell resolution is a stub; only the reference must be present.
            if spell_id.is_empty() {
                errors.push("Missing spell id".to_owned());
            }
        }
        TurnAction::Interact { target, position, .. } => {
            if let Some(target) = target {
                if state.entity(target).is_none() {
                    errors.push("Target not found".to_owned());
                }
            }
            if let Some(position) = position {
                if !state.map.in_bounds(position) {
                    errors.push("Position out of bounds".to_owned());
                }
            }
        }
        TurnAction::End { .. } => {}
    }

    errors
}

/// Execute a validated action's side effects on the state.
pub fn apply_action(state: &mut GameState, action: &TurnAction) {
    match action {
        TurnAction::Move { entity_id, position } => {
            if let Some(entity) = state.entity_mut(entity_id) {
                entity.position = *position;
            }
            state.map.entities.insert(entity_id.clone(), *position);
        }
        TurnAction::Attack { target, .. } => {
            if let Some(target_entity) = state.entity_mut(target) {
                target_entity.current_hp =
                    target_entity.current_hp.saturating_sub(BASE_ATTACK_DAMAGE);
            }
        }
        TurnAction::UseItem { entity_id, item_id, .. } => {
            if let Some(entity) = state.entity_mut(entity_id) {
                if let Some(line) = entity.inventory.line_mut(item_id) {
                    line.quantity = line.quantity.saturating_sub(1);
                }
                entity.inventory.items.retain(|line| line.quantity > 0);
                if item_id == HEALING_POTION {
                    entity.current_hp =
                        (entity.current_hp + HEALING_POTION_RESTORE).min(entity.max_hp);
                }
            }
        }
        // Spell and interaction effects are stubs.
        TurnAction::Cast { .. } | TurnAction::Interact { .. } => {}
        TurnAction::End { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wr_domain::{EntityKind, EntityState, InitiativeEntry, ItemLine, Position};

    fn active_state() -> GameState {
        let mut state = GameState::new("i1", 10, 10);
        state.status = GameStatus::Active;
        for (id, init, pos) in [("p1", 20, (1, 1)), ("m1", 10, (2, 2))] {
            let position = Position::new(pos.0, pos.1);
            let mut entity = EntityState::new(id, EntityKind::PlayerCharacter, 20, position);
            entity.turn_status = if id == "p1" {
                wr_domain::TurnStatus::Active
            } else {
                wr_domain::TurnStatus::Waiting
            };
            state.entity_states.insert(id.to_owned(), entity);
            state.map.entities.insert(id.to_owned(), position);
            state.initiative_order.push(InitiativeEntry {
                entity_id: id.to_owned(),
                entity_kind: EntityKind::PlayerCharacter,
                initiative: init,
                user_id: None,
            });
        }
        state
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn rejects_when_not_active() {
        let mut state = active_state();
        state.status = GameStatus::Paused;
        let action = TurnAction::End { entity_id: "p1".into() };
        assert_eq!(
            validate_action(&state, &action, &config()),
            vec!["Game is not active".to_owned()]
        );
    }

    #[test]
    fn rejects_out_of_turn_actor() {
        let state = active_state();
        let action = TurnAction::End { entity_id: "m1".into() };
        assert_eq!(
            validate_action(&state, &action, &config()),
            vec!["It's not your turn".to_owned()]
        );
    }

    #[test]
    fn move_bounds_obstacle_occupancy_range() {
        let mut state = active_state();
        state.map.obstacles.insert(Position::new(1, 2));

        let cases = [
            (Position::new(-1, 0), "Position out of bounds"),
            (Position::new(1, 2), "Position is blocked by an obstacle"),
            (Position::new(2, 2), "Position is occupied"),
            (Position::new(9, 9), "Position out of range"),
        ];
        for (position, expected) in cases {
            let action = TurnAction::Move { entity_id: "p1".into(), position };
            let errors = validate_action(&state, &action, &config());
            assert!(
                errors.iter().any(|e| e == expected),
                "expected {expected:?} for {position:?}, got {errors:?}"
            );
        }

        let ok = TurnAction::Move { entity_id: "p1".into(), position: Position::new(3, 1) };
        assert!(validate_action(&state, &ok, &config()).is_empty());
    }

    #[test]
    fn attack_range_uses_manhattan_metric() {
        let state = active_state();
        // p1 at (1,1), m1 at (2,2): distance 2 > range 1.
        let action = TurnAction::Attack { entity_id: "p1".into(), target: "m1".into() };
        assert_eq!(
            validate_action(&state, &action, &config()),
            vec!["Target out of range".to_owned()]
        );
    }

    #[test]
    fn use_item_requires_stock() {
        let mut state = active_state();
        let action = TurnAction::UseItem {
            entity_id: "p1".into(),
            item_id: HEALING_POTION.into(),
            target: None,
        };
        assert!(!validate_action(&state, &action, &config()).is_empty());

        state
            .entity_mut("p1")
            .unwrap()
            .inventory
            .items
            .push(ItemLine {
                id: Uuid::new_v4(),
                item_id: HEALING_POTION.into(),
                quantity: 1,
                properties: serde_json::Value::Null,
            });
        assert!(validate_action(&state, &action, &config()).is_empty());
    }

    #[test]
    fn attack_applies_placeholder_damage() {
        let mut state = active_state();
        apply_action(
            &mut state,
            &TurnAction::Attack { entity_id: "p1".into(), target: "m1".into() },
        );
        assert_eq!(state.entity("m1").unwrap().current_hp, 19);
    }

    #[test]
    fn healing_potion_caps_at_max_and_drops_empty_line() {
        let mut state = active_state();
        {
            let p1 = state.entity_mut("p1").unwrap();
            p1.max_hp = 25;
            p1.current_hp = 20;
            p1.inventory.items.push(ItemLine {
                id: Uuid::new_v4(),
                item_id: HEALING_POTION.into(),
                quantity: 2,
                properties: serde_json::Value::Null,
            });
        }
        let action = TurnAction::UseItem {
            entity_id: "p1".into(),
            item_id: HEALING_POTION.into(),
            target: None,
        };

        apply_action(&mut state, &action);
        let p1 = state.entity("p1").unwrap();
        assert_eq!(p1.current_hp, 25);
        assert_eq!(p1.inventory.line(HEALING_POTION).unwrap().quantity, 1);

        apply_action(&mut state, &action);
        let p1 = state.entity("p1").unwrap();
        assert_eq!(p1.current_hp, 25, "healing never exceeds max_hp");
        assert!(p1.inventory.line(HEALING_POTION).is_none(), "empty line removed");
    }

    #[test]
    fn move_updates_entity_and_occupancy() {
        let mut state = active_state();
        apply_action(
            &mut state,
            &TurnAction::Move { entity_id: "p1".into(), position: Position::new(3, 1) },
        );
        assert_eq!(state.entity("p1").unwrap().position, Position::new(3, 1));
        assert_eq!(state.map.entities["p1"], Position::new(3, 1));
    }
}
