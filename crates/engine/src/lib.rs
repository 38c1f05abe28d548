//! Game state engine — the authoritative state machine for one room.
//!
//! The engine is synchronous and owns no tasks: every operation mutates the
//! state under the room's lock and returns an [`Outcome`] describing what
//! the room must do next — events to broadcast, a delta to batch, and a
//! timer directive. Timer firing and queue draining re-enter through
//! [`GameEngine::on_timer_fire`] and the queue methods, so timer-driven
//! skips observe the same serialization as explicit operations.
//!
//! ```text
//!        join               pause
//! waiting ───► active ◄──────────── paused
//!               │      resume ────►
//!               │ complete
//!               ▼
//!            completed
//! ```

pub mod delta;
pub mod queue;
pub mod rules;

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use wr_domain::config::EngineConfig;
use wr_domain::{
    ActionResult, EntityKind, EntityState, Error, EventKind, GameState, GameStatus,
    InitiativeEntry, QueuedAction, Result, StateDelta, TurnAction, TurnOutcome, TurnRecord,
    TurnStatus,
};

use queue::ActionQueues;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the room should do with its turn timer after an operation.
///
/// A timer belongs to exactly one arming generation; a fired task whose
/// generation is stale is ignored, which makes cancelation unambiguous
/// across completion, skip, pause, backtrack, and game completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerDirective {
    /// Leave any armed timer running.
    #[default]
    Keep,
    /// Arm a fresh single-shot timer for the entering turn.
    Arm { generation: u64, timeout: Duration },
    /// The previously armed timer is now stale.
    Clear,
}

/// The observable product of one engine operation.
#[derive(Debug, Default)]
pub struct Outcome {
    pub events: Vec<EventKind>,
    pub delta: Option<StateDelta>,
    pub timer: TimerDirective,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GameEngine {
    state: GameState,
    config: EngineConfig,
    queues: ActionQueues,
    timer_generation: u64,
    timer_armed: bool,
}

impl GameEngine {
    pub fn new(state: GameState, config: EngineConfig) -> Self {
        Self {
            state,
            config,
            queues: ActionQueues::new(),
            timer_generation: 0,
            timer_armed: false,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Value snapshot for wire transfer. The canonical state never leaves
    /// the engine by reference.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    /// Mutable access for the room's chat appends, under the room lock.
    /// Callers must uphold the state invariants; turn bookkeeping goes
    /// through the engine operations, never through this.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ── Entities ─────────────────────────────────────────────────────

    /// Materialize an entity on join if it does not exist yet; re-joins
    /// only reclaim ownership. Keeps `entity_states` and `map.entities`
    /// in lockstep.
    pub fn ensure_entity(
        &mut self,
        entity_id: &str,
        entity_kind: EntityKind,
        user_id: &str,
    ) -> Result<Outcome> {
        if self.state.entity_states.contains_key(entity_id) {
            if let Some(entity) = self.state.entity_mut(entity_id) {
                entity.user_id = Some(user_id.to_owned());
            }
            return Ok(Outcome::default());
        }

        let before = self.state.clone();
        let position = self.state.map.first_free_cell().ok_or_else(|| {
            Error::ResourceExhausted("map has no free cell for a new entity".to_owned())
        })?;
        let mut entity =
            EntityState::new(entity_id, entity_kind, self.config.default_max_hp, position);
        entity.user_id = Some(user_id.to_owned());
        self.state.entity_states.insert(entity_id.to_owned(), entity);
        self.state.map.entities.insert(entity_id.to_owned(), position);
        self.state.touch();

        Ok(self.outcome(before, Vec::new(), TimerDirective::Keep))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Explicit host activation of a waiting game.
    pub fn activate(&mut self) -> Result<Outcome> {
        if self.state.status != GameStatus::Waiting {
            return Err(Error::InvalidState(format!(
                "cannot activate a {} game",
                status_name(self.state.status)
            )));
        }
        let before = self.state.clone();
        let mut events = Vec::new();
        self.go_active(&mut events);
        let timer = self.arm_timer();
        self.state.touch();
        Ok(self.outcome(before, events, timer))
    }

    pub fn pause(&mut self, reason: Option<String>) -> Result<Outcome> {
        if self.state.status != GameStatus::Active {
            return Err(Error::InvalidState(format!(
                "cannot pause a {} game",
                status_name(self.state.status)
            )));
        }
        let before = self.state.clone();
        self.state.status = GameStatus::Paused;
        self.state.touch();
        let timer = self.clear_timer();
        let events = vec![EventKind::InteractionPaused { reason }];
        Ok(self.outcome(before, events, timer))
    }

    /// Resume re-arms the current turn with a fresh full budget — no
    /// credit for time served before the pause.
    pub fn resume(&mut self) -> Result<Outcome> {
        if self.state.status != GameStatus::Paused {
            return Err(Error::InvalidState(format!(
                "cannot resume a {} game",
                status_name(self.state.status)
            )));
        }
        let before = self.state.clone();
        self.state.status = GameStatus::Active;
        self.state.touch();
        let timer = self.arm_timer();
        let events = vec![EventKind::InteractionResumed];
        Ok(self.outcome(before, events, timer))
    }

    /// Completion is terminal: the timer dies, pending queues are dropped,
    /// and every further operation returns `InvalidState`.
    pub fn complete(&mut self) -> Result<Outcome> {
        if self.state.status == GameStatus::Completed {
            return Err(Error::InvalidState("game is already completed".to_owned()));
        }
        let before = self.state.clone();
        self.state.status = GameStatus::Completed;
        self.queues.clear_all();
        self.state.touch();
        let timer = self.clear_timer();
        Ok(self.outcome(before, Vec::new(), timer))
    }

    // ── Turn processing ──────────────────────────────────────────────

    /// Validate, execute, record, and possibly advance.
    ///
    /// Validation failures are data, not errors: the state is left
    /// untouched and the result lists the violations. A waiting game goes
    /// active on the first action that passes validation.
    pub fn process_turn_action(&mut self, action: TurnAction) -> (ActionResult, Outcome) {
        let before = self.state.clone();
        let mut events = Vec::new();
        let mut timer = TimerDirective::Keep;

        let mut activated = false;
        if self.state.status == GameStatus::Waiting {
            self.go_active(&mut events);
            activated = true;
        }

        if self.config.validate_actions {
            let errors = rules::validate_action(&self.state, &action, &self.config);
            if !errors.is_empty() {
                // All-or-nothing: revert the tentative activation too.
                self.state = before;
                return (ActionResult::invalid(errors), Outcome::default());
            }
        }

        rules::apply_action(&mut self.state, &action);

        let now = Utc::now();
        self.push_record(TurnRecord {
            entity_id: action.entity_id().to_owned(),
            turn_number: self.state.current_turn_index,
            round_number: self.state.round_number,
            actions: vec![action.clone()],
            start_time: now,
            end_time: now,
            status: TurnOutcome::Completed,
        });

        if action.ends_turn() {
            if let Some(current) = self.state.current_entry() {
                events.push(EventKind::TurnCompleted {
                    entity_id: current.entity_id.clone(),
                    turn_index: self.state.current_turn_index,
                    round_number: self.state.round_number,
                });
            }
            self.advance_after(TurnStatus::Completed, &mut events);
            timer = self.arm_timer();
        } else if activated {
            timer = self.arm_timer();
        }

        self.state.touch();
        let outcome = self.outcome(before, events, timer);
        (ActionResult::ok(), outcome)
    }

    /// Skip the current turn (explicit, or by the timer with reason
    /// `"timeout"`). Produces a TurnRecord equivalent to a timed-out one,
    /// modulo reason.
    pub fn skip_current_turn(&mut self, reason: &str) -> Result<Outcome> {
        if self.state.status != GameStatus::Active {
            return Err(Error::InvalidState(format!(
                "cannot skip a turn in a {} game",
                status_name(self.state.status)
            )));
        }
        let Some(current) = self.state.current_entry().cloned() else {
            return Err(Error::InvalidState("initiative order is empty".to_owned()));
        };

        let before = self.state.clone();
        let now = Utc::now();
        self.push_record(TurnRecord {
            entity_id: current.entity_id.clone(),
            turn_number: self.state.current_turn_index,
            round_number: self.state.round_number,
            actions: Vec::new(),
            start_time: now,
            end_time: now,
            status: TurnOutcome::Skipped,
        });

        let mut events = vec![EventKind::TurnSkipped {
            entity_id: current.entity_id,
            turn_index: self.state.current_turn_index,
            round_number: self.state.round_number,
            reason: reason.to_owned(),
        }];
        self.advance_after(TurnStatus::Skipped, &mut events);
        let timer = self.arm_timer();
        self.state.touch();
        Ok(self.outcome(before, events, timer))
    }

    // ── Turn timer ───────────────────────────────────────────────────

    /// Entry point for a fired timer task. Stale generations (anything
    /// armed before the latest completion, skip, pause, or backtrack) are
    /// ignored.
    pub fn on_timer_fire(&mut self, generation: u64) -> Option<Outcome> {
        if !self.timer_armed || generation != self.timer_generation {
            return None;
        }
        self.timer_armed = false;
        match self.skip_current_turn("timeout") {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                tracing::debug!(%error, "timer fired on an unskippable game");
                None
            }
        }
    }

    // ── Backtrack / redo ─────────────────────────────────────────────

    /// DM-only rewind. Truncation-only: turn history is cut back to the
    /// target record and indices reset, but entity HP, positions, and
    /// inventories keep their current values.
    pub fn backtrack(
        &mut self,
        turn_number: usize,
        round_number: u32,
        dm_user_id: &str,
    ) -> Result<Outcome> {
        if self.state.status == GameStatus::Completed {
            return Err(Error::InvalidState("game is already completed".to_owned()));
        }
        let target = self
            .state
            .turn_history
            .iter()
            .position(|r| r.turn_number == turn_number && r.round_number == round_number)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no turn record for turn {turn_number} round {round_number}"
                ))
            })?;
        if turn_number >= self.state.initiative_order.len() {
            return Err(Error::InvalidInput(format!(
                "turn {turn_number} is outside the current initiative order"
            )));
        }

        let before = self.state.clone();
        self.state.turn_history.truncate(target + 1);
        if let Some(record) = self.state.turn_history.back_mut() {
            record.status = TurnOutcome::Backtracked;
        }
        self.state.current_turn_index = turn_number;
        self.state.round_number = round_number;
        self.queues.clear_all();
        for entity in self.state.entity_states.values_mut() {
            entity.turn_status = TurnStatus::Waiting;
        }
        self.sync_active_entity();
        self.state.touch();

        let timer = if self.state.status == GameStatus::Active {
            self.arm_timer()
        } else {
            self.clear_timer()
        };
        let events = vec![EventKind::TurnBacktracked {
            target_turn: turn_number,
            target_round: round_number,
            dm_user_id: dm_user_id.to_owned(),
        }];
        tracing::info!(
            interaction_id = %self.state.interaction_id,
            turn_number,
            round_number,
            dm_user_id,
            "turn history backtracked"
        );
        Ok(self.outcome(before, events, timer))
    }

    /// Replay a sequence of actions for the current entity through the
    /// normal processing path. Aborts on the first failure; effects of the
    /// successful prefix stand.
    pub fn redo(
        &mut self,
        entity_id: &str,
        actions: Vec<TurnAction>,
        dm_user_id: &str,
    ) -> Result<(bool, Outcome)> {
        if self.state.status == GameStatus::Completed {
            return Err(Error::InvalidState("game is already completed".to_owned()));
        }
        let owns_turn = self
            .state
            .current_entry()
            .map(|entry| entry.entity_id == entity_id)
            .unwrap_or(false);
        if !owns_turn {
            return Ok((false, Outcome::default()));
        }

        let before = self.state.clone();
        let mut events = Vec::new();
        let mut timer = TimerDirective::Keep;
        let mut success = true;

        for action in actions {
            if action.entity_id() != entity_id {
                success = false;
                break;
            }
            let (result, outcome) = self.process_turn_action(action);
            events.extend(outcome.events);
            if outcome.timer != TimerDirective::Keep {
                timer = outcome.timer;
            }
            if !result.valid {
                success = false;
                break;
            }
        }
        tracing::debug!(entity_id, dm_user_id, success, "redo sequence finished");
        Ok((success, self.outcome(before, events, timer)))
    }

    // ── Initiative ───────────────────────────────────────────────────

    /// Atomically replace the initiative order. The sequence is kept
    /// sorted by descending initiative with insertion order breaking ties.
    /// Entities removed from the order stay in the game but cannot act.
    pub fn update_initiative_order(&mut self, order: Vec<InitiativeEntry>) -> Result<Outcome> {
        if self.state.status == GameStatus::Completed {
            return Err(Error::InvalidState("game is already completed".to_owned()));
        }
        for entry in &order {
            if !self.state.entity_states.contains_key(&entry.entity_id) {
                return Err(Error::InvalidInput(format!(
                    "initiative entry references unknown entity {}",
                    entry.entity_id
                )));
            }
        }

        let before = self.state.clone();
        self.state.initiative_order = order;
        self.state.sort_initiative();
        if self.state.current_turn_index >= self.state.initiative_order.len() {
            self.state.current_turn_index = 0;
        }
        self.sync_active_entity();
        self.state.touch();

        let timer = if self.state.status == GameStatus::Active {
            self.arm_timer()
        } else {
            TimerDirective::Keep
        };
        let events = vec![EventKind::InitiativeUpdated {
            order: self.state.initiative_order.clone(),
        }];
        Ok(self.outcome(before, events, timer))
    }

    // ── Action queue ─────────────────────────────────────────────────

    pub fn queue_action(&mut self, action: TurnAction) -> Result<Uuid> {
        if !self.config.queue_enabled {
            return Err(Error::InvalidState("action queueing is disabled".to_owned()));
        }
        if self.state.status == GameStatus::Completed {
            return Err(Error::InvalidState("game is already completed".to_owned()));
        }
        Ok(self.queues.enqueue(action))
    }

    pub fn begin_queued(&mut self, entity_id: &str) -> Option<QueuedAction> {
        self.queues.begin_next(entity_id)
    }

    pub fn finish_queued(&mut self, entity_id: &str, result: ActionResult) -> Option<QueuedAction> {
        self.queues.finish(entity_id, result)
    }

    pub fn cancel_queued(&mut self, id: Uuid) -> bool {
        self.queues.cancel(id)
    }

    pub fn try_begin_drain(&mut self, entity_id: &str) -> bool {
        self.queues.try_begin_drain(entity_id)
    }

    pub fn end_drain(&mut self, entity_id: &str) {
        self.queues.end_drain(entity_id);
    }

    pub fn pending_actions(&self, entity_id: &str) -> usize {
        self.queues.pending_count(entity_id)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn go_active(&mut self, events: &mut Vec<EventKind>) {
        self.state.status = GameStatus::Active;
        self.sync_active_entity();
        if let Some(current) = self.state.current_entry() {
            events.push(EventKind::TurnStarted {
                entity_id: current.entity_id.clone(),
                turn_index: self.state.current_turn_index,
                round_number: self.state.round_number,
            });
        }
    }

    /// Close the current turn with `final_status`, move to the next slot,
    /// and open its turn. Wrapping to slot 0 starts a new round.
    fn advance_after(&mut self, final_status: TurnStatus, events: &mut Vec<EventKind>) {
        if self.state.initiative_order.is_empty() {
            return;
        }
        if let Some(current) = self.state.current_entry().cloned() {
            if let Some(entity) = self.state.entity_mut(&current.entity_id) {
                entity.turn_status = final_status;
            }
        }

        let next = self.state.current_turn_index + 1;
        if next >= self.state.initiative_order.len() {
            self.state.current_turn_index = 0;
            self.state.round_number += 1;
            for entity in self.state.entity_states.values_mut() {
                entity.turn_status = TurnStatus::Waiting;
            }
            events.push(EventKind::NewRound {
                round_number: self.state.round_number,
            });
        } else {
            self.state.current_turn_index = next;
        }

        self.sync_active_entity();
        if let Some(current) = self.state.current_entry() {
            events.push(EventKind::TurnStarted {
                entity_id: current.entity_id.clone(),
                turn_index: self.state.current_turn_index,
                round_number: self.state.round_number,
            });
        }
    }

    /// Exactly one entity carries `Active` turn status: the one at
    /// `current_turn_index`.
    fn sync_active_entity(&mut self) {
        let current_id = self
            .state
            .current_entry()
            .map(|entry| entry.entity_id.clone());
        for (entity_id, entity) in self.state.entity_states.iter_mut() {
            if Some(entity_id.as_str()) == current_id.as_deref() {
                entity.turn_status = TurnStatus::Active;
            } else if entity.turn_status == TurnStatus::Active {
                entity.turn_status = TurnStatus::Waiting;
            }
        }
    }

    fn push_record(&mut self, record: TurnRecord) {
        self.state.turn_history.push_back(record);
        while self.state.turn_history.len() > self.config.max_turn_history {
            self.state.turn_history.pop_front();
        }
    }

    fn arm_timer(&mut self) -> TimerDirective {
        if !self.config.auto_advance
            || self.state.status != GameStatus::Active
            || self.state.initiative_order.is_empty()
        {
            return self.clear_timer();
        }
        self.timer_generation += 1;
        self.timer_armed = true;
        TimerDirective::Arm {
            generation: self.timer_generation,
            timeout: Duration::from_millis(self.config.turn_timeout_ms),
        }
    }

    fn clear_timer(&mut self) -> TimerDirective {
        if self.timer_armed {
            self.timer_armed = false;
            self.timer_generation += 1;
            TimerDirective::Clear
        } else {
            TimerDirective::Keep
        }
    }

    fn outcome(
        &self,
        before: GameState,
        events: Vec<EventKind>,
        timer: TimerDirective,
    ) -> Outcome {
        let diff = delta::diff(&before, &self.state);
        Outcome {
            events,
            delta: (!diff.is_empty()).then_some(diff),
            timer,
        }
    }
}

fn status_name(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Waiting => "waiting",
        GameStatus::Active => "active",
        GameStatus::Paused => "paused",
        GameStatus::Completed => "completed",
    }
}
