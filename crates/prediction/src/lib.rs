//! Client-side prediction and reconciliation.
//!
//! The predictor optimistically applies an action to a local snapshot by
//! running the same engine the server runs — same validation, same
//! execution, same advancement — which is what makes accepted predictions
//! converge with server authority. Emitted events are discarded: a
//! prediction is a local view and never observable to other clients.
//!
//! Every successful prediction leaves a rollback entry holding the
//! pre-action state; the ledger is bounded to the last
//! [`MAX_OUTSTANDING_PREDICTIONS`] outstanding predictions.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use wr_domain::config::EngineConfig;
use wr_domain::{GameState, TurnAction};
use wr_engine::GameEngine;

pub const MAX_OUTSTANDING_PREDICTIONS: usize = 10;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prediction results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct Prediction {
    pub success: bool,
    pub predicted_state: GameState,
    pub errors: Vec<String>,
    /// Present on success; keys the rollback ledger entry.
    pub prediction_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RollbackEntry {
    pub prediction_id: Uuid,
    pub action: TurnAction,
    pub original: GameState,
    pub predicted_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Predictor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Predictor {
    config: EngineConfig,
    ledger: VecDeque<RollbackEntry>,
}

impl Predictor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ledger: VecDeque::new(),
        }
    }

    /// Optimistically apply `action` to a deep copy of `state`.
    ///
    /// Validation is the engine's own rule set, run against the
    /// information the client holds. On success the rollback entry is
    /// recorded and its id returned.
    pub fn predict(&mut self, state: &GameState, action: &TurnAction) -> Prediction {
        let mut engine = GameEngine::new(state.clone(), self.config.clone());
        // Local view: the outcome's events and delta are dropped.
        let (result, _outcome) = engine.process_turn_action(action.clone());
        if !result.valid {
            return Prediction {
                success: false,
                predicted_state: state.clone(),
                errors: result.errors,
                prediction_id: None,
            };
        }

        let prediction_id = Uuid::new_v4();
        self.ledger.push_back(RollbackEntry {
            prediction_id,
            action: action.clone(),
            original: state.clone(),
            predicted_at: Utc::now(),
        });
        while self.ledger.len() > MAX_OUTSTANDING_PREDICTIONS {
            self.ledger.pop_front();
        }

        Prediction {
            success: true,
            predicted_state: engine.snapshot(),
            errors: Vec::new(),
            prediction_id: Some(prediction_id),
        }
    }

    /// Converge on the server's state. Server authority always wins — the
    /// equivalence check only tells us whether the optimistic application
    /// was right. The matching rollback entry is retired either way.
    pub fn reconcile(
        &mut self,
        predicted: &GameState,
        authoritative: GameState,
        prediction_id: Option<Uuid>,
    ) -> GameState {
        if let Some(id) = prediction_id {
            self.ledger.retain(|entry| entry.prediction_id != id);
        }
        if !equivalent(predicted, &authoritative) {
            tracing::debug!(
                interaction_id = %authoritative.interaction_id,
                "prediction diverged; adopting server state"
            );
        }
        authoritative
    }

    /// Undo the most recent prediction for `action`, restoring the state
    /// captured before it.
    pub fn rollback(&mut self, action: &TurnAction) -> Option<GameState> {
        let index = self
            .ledger
            .iter()
            .rposition(|entry| entry.action == *action)?;
        self.ledger.remove(index).map(|entry| entry.original)
    }

    pub fn rollback_by_id(&mut self, prediction_id: Uuid) -> Option<GameState> {
        let index = self
            .ledger
            .iter()
            .position(|entry| entry.prediction_id == prediction_id)?;
        self.ledger.remove(index).map(|entry| entry.original)
    }

    pub fn outstanding(&self) -> usize {
        self.ledger.len()
    }
}

/// Observable-field equivalence: turn scalar state plus every entity's
/// position, hit points, and turn status.
pub fn equivalent(a: &GameState, b: &GameState) -> bool {
    if a.status != b.status
        || a.current_turn_index != b.current_turn_index
        || a.round_number != b.round_number
        || a.entity_states.len() != b.entity_states.len()
    {
        return false;
    }
    a.entity_states.iter().all(|(id, ea)| {
        b.entity_states.get(id).is_some_and(|eb| {
            ea.position == eb.position
                && ea.current_hp == eb.current_hp
                && ea.turn_status == eb.turn_status
        })
    })
}
