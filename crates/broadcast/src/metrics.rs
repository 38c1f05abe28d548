//! Delivery counters surfaced on the metrics endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct BroadcastMetrics {
    pub events_broadcast: Counter,
    pub events_delivered: Counter,
    pub failed_deliveries: Counter,
    pub deltas_batched: Counter,
    pub delta_flushes: Counter,
    pub subscriptions_reaped: Counter,
}

/// Point-in-time copy of the counters, serializable for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_broadcast: u64,
    pub events_delivered: u64,
    pub failed_deliveries: u64,
    pub deltas_batched: u64,
    pub delta_flushes: u64,
    pub subscriptions_reaped: u64,
}

impl BroadcastMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_broadcast: self.events_broadcast.get(),
            events_delivered: self.events_delivered.get(),
            failed_deliveries: self.failed_deliveries.get(),
            deltas_batched: self.deltas_batched.get(),
            delta_flushes: self.delta_flushes.get(),
            subscriptions_reaped: self.subscriptions_reaped.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = BroadcastMetrics::default();
        metrics.events_broadcast.incr();
        metrics.events_broadcast.incr();
        metrics.failed_deliveries.incr();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_broadcast, 2);
        assert_eq!(snapshot.failed_deliveries, 1);
        assert_eq!(snapshot.events_delivered, 0);
    }
}
