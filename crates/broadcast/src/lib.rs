//! Event broadcaster — in-process pub/sub for room events.
//!
//! Subscribers register an [`EventSink`] (usually an unbounded channel
//! feeding an SSE stream) with an event-type filter. Fan-out is
//! failure-isolated: one dead sink never affects its siblings, it only
//! bumps the `failed_deliveries` counter. State deltas are batched per
//! room and flushed on size or age.

pub mod metrics;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use wr_domain::config::BroadcastConfig;
use wr_domain::{Error, EventFilter, EventKind, GameEvent, Result, StateDelta};

pub use metrics::{BroadcastMetrics, MetricsSnapshot};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sinks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug)]
pub struct DeliveryError(pub String);

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a subscription's events go. The broadcaster holds nothing of the
/// subscriber beyond this sink and the subscription record.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &GameEvent) -> std::result::Result<(), DeliveryError>;
}

impl EventSink for mpsc::UnboundedSender<GameEvent> {
    fn deliver(&self, event: &GameEvent) -> std::result::Result<(), DeliveryError> {
        self.send(event.clone())
            .map_err(|_| DeliveryError("subscriber channel closed".to_owned()))
    }
}

/// Adapter for closure handlers.
pub struct FnSink<F>(pub F);

impl<F> EventSink for FnSink<F>
where
    F: Fn(&GameEvent) -> std::result::Result<(), DeliveryError> + Send + Sync,
{
    fn deliver(&self, event: &GameEvent) -> std::result::Result<(), DeliveryError> {
        (self.0)(event)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscriptions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Subscription {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub interaction_id: String,
    pub filter: EventFilter,
    sink: Box<dyn EventSink>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    subscriptions: HashMap<Uuid, Subscription>,
    by_interaction: HashMap<String, HashSet<Uuid>>,
    by_user: HashMap<String, HashSet<Uuid>>,
}

impl Registry {
    fn unlink(&mut self, id: Uuid) -> Option<Subscription> {
        let subscription = self.subscriptions.remove(&id)?;
        if let Some(set) = self.by_interaction.get_mut(&subscription.interaction_id) {
            set.remove(&id);
            if set.is_empty() {
                self.by_interaction.remove(&subscription.interaction_id);
            }
        }
        if let Some(user_id) = &subscription.user_id {
            if let Some(set) = self.by_user.get_mut(user_id) {
                set.remove(&id);
                if set.is_empty() {
                    self.by_user.remove(user_id);
                }
            }
        }
        Some(subscription)
    }
}

#[derive(Default)]
struct DeltaBuffer {
    deltas: Vec<StateDelta>,
    flush_scheduled: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broadcaster
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Broadcaster {
    config: BroadcastConfig,
    registry: RwLock<Registry>,
    buffers: Mutex<HashMap<String, DeltaBuffer>>,
    metrics: BroadcastMetrics,
}

impl Broadcaster {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            registry: RwLock::new(Registry::default()),
            buffers: Mutex::new(HashMap::new()),
            metrics: BroadcastMetrics::default(),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a sink for a room's events. Fails with
    /// `ResourceExhausted` once a user holds the configured maximum.
    pub fn subscribe(
        &self,
        interaction_id: &str,
        filter: EventFilter,
        sink: Box<dyn EventSink>,
        user_id: Option<&str>,
    ) -> Result<Uuid> {
        let mut registry = self.registry.write();

        if let Some(user_id) = user_id {
            let held = registry
                .by_user
                .get(user_id)
                .map(|set| set.len())
                .unwrap_or(0);
            if held >= self.config.max_subscriptions_per_user {
                return Err(Error::ResourceExhausted(format!(
                    "user {user_id} already holds {held} subscriptions"
                )));
            }
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        registry.subscriptions.insert(
            id,
            Subscription {
                id,
                user_id: user_id.map(str::to_owned),
                interaction_id: interaction_id.to_owned(),
                filter,
                sink,
                created_at: now,
                last_activity: now,
            },
        );
        registry
            .by_interaction
            .entry(interaction_id.to_owned())
            .or_default()
            .insert(id);
        if let Some(user_id) = user_id {
            registry
                .by_user
                .entry(user_id.to_owned())
                .or_default()
                .insert(id);
        }

        tracing::debug!(%id, interaction_id, user_id, "subscription added");
        Ok(id)
    }

    pub fn unsubscribe(&self, id: Uuid) -> bool {
        self.registry.write().unlink(id).is_some()
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.read().subscriptions.len()
    }

    // ── Fan-out ──────────────────────────────────────────────────────

    /// Enrich `kind` with the room id and a timestamp, then deliver to
    /// every matching subscription of the room. Returns the emitted event.
    pub fn broadcast(&self, interaction_id: &str, kind: EventKind) -> GameEvent {
        self.fan_out(interaction_id, kind, None)
    }

    /// Like [`broadcast`](Self::broadcast), restricted to one user's
    /// subscriptions for the room.
    pub fn broadcast_to_user(
        &self,
        interaction_id: &str,
        user_id: &str,
        kind: EventKind,
    ) -> GameEvent {
        self.fan_out(interaction_id, kind, Some(user_id))
    }

    fn fan_out(&self, interaction_id: &str, kind: EventKind, only_user: Option<&str>) -> GameEvent {
        let event = GameEvent::new(interaction_id, kind);
        let event_type = event.event_type();
        self.metrics.events_broadcast.incr();

        let mut registry = self.registry.write();
        let Some(ids) = registry.by_interaction.get(interaction_id).cloned() else {
            return event;
        };
        let now = Utc::now();
        for id in ids {
            let Some(subscription) = registry.subscriptions.get_mut(&id) else {
                continue;
            };
            if let Some(user) = only_user {
                if subscription.user_id.as_deref() != Some(user) {
                    continue;
                }
            }
            if !subscription.filter.matches(event_type) {
                continue;
            }
            match subscription.sink.deliver(&event) {
                Ok(()) => {
                    subscription.last_activity = now;
                    self.metrics.events_delivered.incr();
                }
                Err(error) => {
                    // One bad sink must not affect the others.
                    self.metrics.failed_deliveries.incr();
                    tracing::warn!(
                        subscription = %id,
                        interaction_id,
                        %error,
                        "event delivery failed"
                    );
                }
            }
        }
        event
    }

    // ── Delta batching ───────────────────────────────────────────────

    /// Queue a delta for the room. The buffer flushes as one
    /// `state_delta` event when it reaches `max_batch_size`, or
    /// `batch_delay_ms` after its first delta, whichever comes first.
    pub fn broadcast_delta(self: &Arc<Self>, interaction_id: &str, delta: StateDelta) {
        if delta.is_empty() {
            return;
        }
        self.metrics.deltas_batched.incr();

        let flush_now = {
            let mut buffers = self.buffers.lock();
            let buffer = buffers.entry(interaction_id.to_owned()).or_default();
            buffer.deltas.push(delta);
            if buffer.deltas.len() >= self.config.max_batch_size {
                true
            } else {
                if !buffer.flush_scheduled {
                    buffer.flush_scheduled = true;
                    let broadcaster = Arc::clone(self);
                    let room = interaction_id.to_owned();
                    let delay = Duration::from_millis(self.config.batch_delay_ms);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        broadcaster.flush_room(&room);
                    });
                }
                false
            }
        };

        if flush_now {
            self.flush_room(interaction_id);
        }
    }

    /// Flush one room's pending deltas, if any.
    pub fn flush_room(&self, interaction_id: &str) {
        let deltas = {
            let mut buffers = self.buffers.lock();
            let Some(buffer) = buffers.get_mut(interaction_id) else {
                return;
            };
            buffer.flush_scheduled = false;
            std::mem::take(&mut buffer.deltas)
        };
        if deltas.is_empty() {
            return;
        }
        self.metrics.delta_flushes.incr();
        self.broadcast(interaction_id, EventKind::StateDelta { deltas });
    }

    /// Flush every room's buffer. Part of shutdown.
    pub fn flush_all(&self) {
        let rooms: Vec<String> = self.buffers.lock().keys().cloned().collect();
        for room in rooms {
            self.flush_room(&room);
        }
    }

    /// Drop buffered deltas for a destroyed room without emitting.
    pub fn drop_room(&self, interaction_id: &str) {
        self.buffers.lock().remove(interaction_id);
    }

    // ── Cleanup ──────────────────────────────────────────────────────

    /// Remove subscriptions idle past `subscription_timeout_ms`.
    pub fn reap_idle(&self) -> usize {
        let timeout = chrono::Duration::milliseconds(self.config.subscription_timeout_ms as i64);
        let now = Utc::now();
        let mut registry = self.registry.write();
        let idle: Vec<Uuid> = registry
            .subscriptions
            .values()
            .filter(|s| now - s.last_activity > timeout)
            .map(|s| s.id)
            .collect();
        for id in &idle {
            registry.unlink(*id);
            self.metrics.subscriptions_reaped.incr();
        }
        if !idle.is_empty() {
            tracing::info!(count = idle.len(), "idle subscriptions reaped");
        }
        idle.len()
    }

    /// Periodic idle-subscription reaper.
    pub fn spawn_cleanup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let broadcaster = Arc::clone(self);
        let interval = Duration::from_millis(broadcaster.config.cleanup_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                broadcaster.reap_idle();
            }
        })
    }

    /// Flush all pending delta buffers. In-flight deliveries are
    /// synchronous, so after this returns nothing is left queued.
    pub fn shutdown(&self) {
        self.flush_all();
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wr_domain::EventType;

    fn broadcaster() -> Arc<Broadcaster> {
        Arc::new(Broadcaster::new(BroadcastConfig::default()))
    }

    fn channel_sink() -> (Box<dyn EventSink>, mpsc::UnboundedReceiver<GameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Box::new(tx), rx)
    }

    #[tokio::test]
    async fn fan_out_reaches_matching_subscribers() {
        let b = broadcaster();
        let (sink_a, mut rx_a) = channel_sink();
        let (sink_b, mut rx_b) = channel_sink();
        b.subscribe("room", EventFilter::All, sink_a, Some("alice")).unwrap();
        b.subscribe(
            "room",
            EventFilter::types([EventType::ChatMessage]),
            sink_b,
            Some("bob"),
        )
        .unwrap();

        b.broadcast("room", EventKind::NewRound { round_number: 2 });

        let got = rx_a.try_recv().unwrap();
        assert_eq!(got.event_type(), EventType::NewRound);
        assert_eq!(got.interaction_id, "room");
        assert!(rx_b.try_recv().is_err(), "filter excludes new_round");
    }

    #[tokio::test]
    async fn failing_sink_is_isolated() {
        let b = broadcaster();
        let failing = Box::new(FnSink(|_: &GameEvent| -> std::result::Result<(), DeliveryError> {
            Err(DeliveryError("boom".into()))
        })) as Box<dyn EventSink>;
        let (healthy, mut rx) = channel_sink();
        b.subscribe("room", EventFilter::All, failing, Some("alice")).unwrap();
        b.subscribe("room", EventFilter::All, healthy, Some("bob")).unwrap();

        let before = b.metrics().failed_deliveries;
        b.broadcast("room", EventKind::NewRound { round_number: 2 });

        assert!(rx.try_recv().is_ok(), "healthy subscriber still receives");
        assert_eq!(b.metrics().failed_deliveries, before + 1);
    }

    #[tokio::test]
    async fn per_user_subscription_cap() {
        let mut config = BroadcastConfig::default();
        config.max_subscriptions_per_user = 2;
        let b = Arc::new(Broadcaster::new(config));
        for _ in 0..2 {
            let (sink, _rx) = channel_sink();
            b.subscribe("room", EventFilter::All, sink, Some("alice")).unwrap();
        }
        let (sink, _rx) = channel_sink();
        let err = b
            .subscribe("room", EventFilter::All, sink, Some("alice"))
            .unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted(_)));
    }

    #[tokio::test]
    async fn broadcast_to_user_targets_only_that_user() {
        let b = broadcaster();
        let (sink_a, mut rx_a) = channel_sink();
        let (sink_b, mut rx_b) = channel_sink();
        b.subscribe("room", EventFilter::All, sink_a, Some("alice")).unwrap();
        b.subscribe("room", EventFilter::All, sink_b, Some("bob")).unwrap();

        b.broadcast_to_user("room", "alice", EventKind::NewRound { round_number: 3 });
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let b = broadcaster();
        let (sink, mut rx) = channel_sink();
        b.subscribe("room", EventFilter::All, sink, None).unwrap();

        for round in 1..=5 {
            b.broadcast("room", EventKind::NewRound { round_number: round });
        }
        let mut last = 0;
        while let Ok(event) = rx.try_recv() {
            let EventKind::NewRound { round_number } = event.kind else {
                panic!("unexpected event");
            };
            assert!(round_number > last);
            last = round_number;
        }
        assert_eq!(last, 5);
    }

    #[tokio::test]
    async fn delta_batch_flushes_on_size() {
        let mut config = BroadcastConfig::default();
        config.max_batch_size = 3;
        config.batch_delay_ms = 60_000; // never by delay in this test
        let b = Arc::new(Broadcaster::new(config));
        let (sink, mut rx) = channel_sink();
        b.subscribe("room", EventFilter::All, sink, None).unwrap();

        for _ in 0..3 {
            let delta = StateDelta {
                round_number: Some(2),
                ..Default::default()
            };
            b.broadcast_delta("room", delta);
        }

        let event = rx.try_recv().expect("size threshold flushes immediately");
        let EventKind::StateDelta { deltas } = event.kind else {
            panic!("expected a state_delta event");
        };
        assert_eq!(deltas.len(), 3);
    }

    #[tokio::test]
    async fn delta_batch_flushes_on_delay() {
        let mut config = BroadcastConfig::default();
        config.batch_delay_ms = 20;
        let b = Arc::new(Broadcaster::new(config));
        let (sink, mut rx) = channel_sink();
        b.subscribe("room", EventFilter::All, sink, None).unwrap();

        let delta = StateDelta {
            round_number: Some(2),
            ..Default::default()
        };
        b.broadcast_delta("room", delta);
        assert!(rx.try_recv().is_err(), "not flushed yet");

        tokio::time::sleep(Duration::from_millis(80)).await;
        let event = rx.try_recv().expect("delay flushes the batch");
        assert_eq!(event.event_type(), EventType::StateDelta);
    }

    #[tokio::test]
    async fn shutdown_flushes_pending_buffers() {
        let mut config = BroadcastConfig::default();
        config.batch_delay_ms = 60_000;
        let b = Arc::new(Broadcaster::new(config));
        let (sink, mut rx) = channel_sink();
        b.subscribe("room", EventFilter::All, sink, None).unwrap();

        b.broadcast_delta(
            "room",
            StateDelta {
                round_number: Some(2),
                ..Default::default()
            },
        );
        b.shutdown();
        assert_eq!(
            rx.try_recv().unwrap().event_type(),
            EventType::StateDelta
        );
    }

    #[tokio::test]
    async fn idle_subscriptions_are_reaped() {
        let mut config = BroadcastConfig::default();
        config.subscription_timeout_ms = 0;
        let b = Arc::new(Broadcaster::new(config));
        let (sink, _rx) = channel_sink();
        b.subscribe("room", EventFilter::All, sink, Some("alice")).unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(b.reap_idle(), 1);
        assert_eq!(b.subscription_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_removes_all_traces() {
        let b = broadcaster();
        let (sink, mut rx) = channel_sink();
        let id = b.subscribe("room", EventFilter::All, sink, Some("alice")).unwrap();
        assert!(b.unsubscribe(id));
        assert!(!b.unsubscribe(id), "second unsubscribe is a no-op");

        b.broadcast("room", EventKind::NewRound { round_number: 2 });
        assert!(rx.try_recv().is_err());
    }
}
