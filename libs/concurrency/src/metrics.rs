//! Manager counters
//!
//! Relaxed atomics: the counters are written from the manager thread and
//! from pooled service calls and are only read for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Runtime counters shared by the manager and its execute tasks
#[derive(Debug, Default)]
pub struct ManagerMetrics {
    pub actors_added: AtomicU64,
    pub actors_removed: AtomicU64,
    pub services_dispatched: AtomicU64,
    pub frames_delivered: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub control_messages_handled: AtomicU64,
    pub interfaces_granted: AtomicU64,
    pub shutdowns_initiated: AtomicU64,
    pub iterations: AtomicU64,
}

/// Point-in-time copy of [`ManagerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub actors_added: u64,
    pub actors_removed: u64,
    pub services_dispatched: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub control_messages_handled: u64,
    pub interfaces_granted: u64,
    pub shutdowns_initiated: u64,
    pub iterations: u64,
}

impl ManagerMetrics {
    pub fn record_actor_added(&self) {
        self.actors_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_actor_removed(&self) {
        self.actors_removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_service_dispatched(&self) {
        self.services_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_control_message(&self) {
        self.control_messages_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_interface_granted(&self) {
        self.interfaces_granted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shutdown_initiated(&self) {
        self.shutdowns_initiated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Live actors according to the counters
    pub fn live_actors(&self) -> u64 {
        let added = self.actors_added.load(Ordering::Relaxed);
        let removed = self.actors_removed.load(Ordering::Relaxed);
        added.saturating_sub(removed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            actors_added: self.actors_added.load(Ordering::Relaxed),
            actors_removed: self.actors_removed.load(Ordering::Relaxed),
            services_dispatched: self.services_dispatched.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            control_messages_handled: self.control_messages_handled.load(Ordering::Relaxed),
            interfaces_granted: self.interfaces_granted.load(Ordering::Relaxed),
            shutdowns_initiated: self.shutdowns_initiated.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = ManagerMetrics::default();
        metrics.record_actor_added();
        metrics.record_actor_added();
        metrics.record_actor_removed();
        metrics.record_interface_granted();
        metrics.record_frame_dropped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.actors_added, 2);
        assert_eq!(snapshot.actors_removed, 1);
        assert_eq!(snapshot.interfaces_granted, 1);
        assert_eq!(snapshot.frames_dropped, 1);
        assert_eq!(metrics.live_actors(), 1);
    }
}
