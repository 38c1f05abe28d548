//! Per-entity action queues.
//!
//! Each entity owns a FIFO of queued actions. At most one action per entity
//! is `Processing` at any time; the room's drainer task pulls actions one at
//! a time through the normal processing path. A drain halts on the first
//! validation failure or `end` action — remaining actions stay pending
//! until the next enqueue restarts the drain or the caller cancels them.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;
use wr_domain::{ActionResult, QueueStatus, QueuedAction, TurnAction};

#[derive(Debug, Default)]
pub struct ActionQueues {
    pending: HashMap<String, VecDeque<QueuedAction>>,
    /// entity_id → the single in-flight action. This map being keyed by
    /// entity is what enforces at-most-one-processing per entity.
    processing: HashMap<String, QueuedAction>,
    draining: HashSet<String>,
}

impl ActionQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action to its entity's queue, returning the queued id.
    pub fn enqueue(&mut self, action: TurnAction) -> Uuid {
        let queued = QueuedAction::new(action);
        let id = queued.id;
        self.pending
            .entry(queued.action.entity_id().to_owned())
            .or_default()
            .push_back(queued);
        id
    }

    /// Move the entity's next pending action into the processing slot.
    /// Returns `None` when the queue is empty or an action is already
    /// in flight for this entity.
    pub fn begin_next(&mut self, entity_id: &str) -> Option<QueuedAction> {
        if self.processing.contains_key(entity_id) {
            return None;
        }
        let queue = self.pending.get_mut(entity_id)?;
        let mut queued = queue.pop_front()?;
        queued.status = QueueStatus::Processing;
        self.processing.insert(entity_id.to_owned(), queued.clone());
        Some(queued)
    }

    /// Complete the entity's in-flight action with its result.
    pub fn finish(&mut self, entity_id: &str, result: ActionResult) -> Option<QueuedAction> {
        let mut queued = self.processing.remove(entity_id)?;
        queued.status = if result.valid {
            QueueStatus::Completed
        } else {
            QueueStatus::Failed
        };
        queued.result = Some(result);
        Some(queued)
    }

    /// Cancel a pending action by id. Processing actions cannot be
    /// canceled.
    pub fn cancel(&mut self, id: Uuid) -> bool {
        for queue in self.pending.values_mut() {
            if let Some(pos) = queue.iter().position(|q| q.id == id) {
                queue.remove(pos);
                return true;
            }
        }
        false
    }

    /// Drop every pending action for every entity (backtrack, completion).
    pub fn clear_all(&mut self) {
        self.pending.clear();
        self.draining.clear();
    }

    pub fn pending_count(&self, entity_id: &str) -> usize {
        self.pending.get(entity_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn total_pending(&self) -> usize {
        self.pending.values().map(|q| q.len()).sum()
    }

    pub fn is_processing(&self, entity_id: &str) -> bool {
        self.processing.contains_key(entity_id)
    }

    /// Claim the drain slot for an entity. Returns false if a drainer is
    /// already running, so at most one exists per entity.
    pub fn try_begin_drain(&mut self, entity_id: &str) -> bool {
        self.draining.insert(entity_id.to_owned())
    }

    pub fn end_drain(&mut self, entity_id: &str) {
        self.draining.remove(entity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_action(entity: &str) -> TurnAction {
        TurnAction::End {
            entity_id: entity.into(),
        }
    }

    #[test]
    fn fifo_order_per_entity() {
        let mut queues = ActionQueues::new();
        let first = queues.enqueue(end_action("e1"));
        let second = queues.enqueue(end_action("e1"));
        queues.enqueue(end_action("e2"));

        let next = queues.begin_next("e1").unwrap();
        assert_eq!(next.id, first);
        queues.finish("e1", ActionResult::ok());
        let next = queues.begin_next("e1").unwrap();
        assert_eq!(next.id, second);
        assert_eq!(queues.pending_count("e2"), 1);
    }

    #[test]
    fn at_most_one_processing_per_entity() {
        let mut queues = ActionQueues::new();
        queues.enqueue(end_action("e1"));
        queues.enqueue(end_action("e1"));

        assert!(queues.begin_next("e1").is_some());
        assert!(queues.is_processing("e1"));
        // Second begin is refused until the first finishes.
        assert!(queues.begin_next("e1").is_none());

        queues.finish("e1", ActionResult::ok());
        assert!(queues.begin_next("e1").is_some());
    }

    #[test]
    fn failed_result_marks_failed() {
        let mut queues = ActionQueues::new();
        queues.enqueue(end_action("e1"));
        queues.begin_next("e1").unwrap();
        let done = queues
            .finish("e1", ActionResult::invalid(vec!["nope".into()]))
            .unwrap();
        assert_eq!(done.status, QueueStatus::Failed);
    }

    #[test]
    fn cancel_pending_but_not_processing() {
        let mut queues = ActionQueues::new();
        let a = queues.enqueue(end_action("e1"));
        let b = queues.enqueue(end_action("e1"));

        let in_flight = queues.begin_next("e1").unwrap();
        assert_eq!(in_flight.id, a);
        assert!(!queues.cancel(a), "processing action is not cancelable");
        assert!(queues.cancel(b));
        assert_eq!(queues.pending_count("e1"), 0);
    }

    #[test]
    fn drain_slot_is_exclusive() {
        let mut queues = ActionQueues::new();
        assert!(queues.try_begin_drain("e1"));
        assert!(!queues.try_begin_drain("e1"));
        queues.end_drain("e1");
        assert!(queues.try_begin_drain("e1"));
    }

    #[test]
    fn clear_all_drops_pending() {
        let mut queues = ActionQueues::new();
        queues.enqueue(end_action("e1"));
        queues.enqueue(end_action("e2"));
        queues.clear_all();
        assert_eq!(queues.total_pending(), 0);
    }
}
