//! Event fan-out — one broadcast channel per active run.
//!
//! Multiple producers (in practice only the run's orchestration task) and
//! any number of independent consumers per channel; every consumer sees
//! every event in publish order. Publishing never awaits: a slow listener
//! lags and loses events rather than applying backpressure to the
//! orchestration task. Events are not replayed to listeners that attach
//! late, and nothing here persists — the run store is the record of truth.

use dashmap::DashMap;
use metrics::gauge;
use tokio::sync::broadcast;
use tracing::debug;

use sift_core::events::RunEvent;

/// Default per-run channel capacity. A pipeline emits a handful of events
/// per step, so this lags only pathologically slow listeners.
const DEFAULT_CAPACITY: usize = 256;

/// Registry of per-run broadcast channels.
pub struct EventBus {
    channels: DashMap<String, broadcast::Sender<RunEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with a custom per-channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Get or create the channel for a run.
    fn channel(&self, run_id: &str) -> broadcast::Sender<RunEvent> {
        if let Some(sender) = self.channels.get(run_id) {
            return sender.clone();
        }
        let entry = self
            .channels
            .entry(run_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        gauge!("event_bus_channels").set(self.channels.len() as f64);
        entry.clone()
    }

    /// Subscribe to a run's events, creating the channel on first access.
    ///
    /// The receiver sees every event published after this call.
    pub fn subscribe(&self, run_id: &str) -> broadcast::Receiver<RunEvent> {
        self.channel(run_id).subscribe()
    }

    /// Publish an event to its run's channel. Non-blocking.
    ///
    /// Returns the number of listeners that received it (0 when nobody is
    /// listening — the orchestrator keeps running regardless).
    pub fn publish(&self, event: RunEvent) -> usize {
        let sender = self.channel(event.run_id());
        let receivers = sender.send(event).unwrap_or(0);
        debug!(receivers, "published run event");
        receivers
    }

    /// Number of active listeners on a run's channel.
    #[must_use]
    pub fn listener_count(&self, run_id: &str) -> usize {
        self.channels
            .get(run_id)
            .map_or(0, |sender| sender.receiver_count())
    }

    /// Number of live channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Release a run's channel unconditionally.
    pub fn remove(&self, run_id: &str) {
        let _ = self.channels.remove(run_id);
        gauge!("event_bus_channels").set(self.channels.len() as f64);
    }

    /// Release a run's channel if no listener remains. Returns whether the
    /// channel was removed.
    ///
    /// Called after the terminal event is published and whenever a listener
    /// disconnects, so abandoned channels are reclaimed without a sweeper.
    pub fn release_if_idle(&self, run_id: &str) -> bool {
        let removed = self
            .channels
            .remove_if(run_id, |_, sender| sender.receiver_count() == 0)
            .is_some();
        if removed {
            debug!(run_id, "released idle event channel");
            gauge!("event_bus_channels").set(self.channels.len() as f64);
        }
        removed
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::agents::AgentType;
    use sift_core::events::BaseEvent;

    fn running_event(run_id: &str, step_id: &str) -> RunEvent {
        RunEvent::StepRunning {
            base: BaseEvent::now(run_id),
            step_id: step_id.into(),
            agent: AgentType::QaConsultant,
            progress: 0,
            label: "Assessing QA strategy".into(),
        }
    }

    #[tokio::test]
    async fn publish_with_no_listeners_returns_zero() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(running_event("run_1", "step_1")), 0);
        assert_eq!(bus.channel_count(), 1);
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("run_1");

        let _ = bus.publish(running_event("run_1", "step_1"));
        let _ = bus.publish(RunEvent::finished("run_1", false));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_type(), "running");
        let second = rx.recv().await.unwrap();
        assert!(second.is_terminal());
    }

    #[tokio::test]
    async fn every_listener_sees_every_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe("run_1");
        let mut rx2 = bus.subscribe("run_1");

        let receivers = bus.publish(running_event("run_1", "step_1"));
        assert_eq!(receivers, 2);

        assert_eq!(rx1.recv().await.unwrap().event_type(), "running");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "running");
    }

    #[tokio::test]
    async fn runs_have_independent_channels() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("run_a");
        let mut rx_b = bus.subscribe("run_b");

        let _ = bus.publish(running_event("run_a", "step_1"));

        assert_eq!(rx_a.recv().await.unwrap().run_id(), "run_a");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        let _ = bus.publish(running_event("run_1", "step_1"));

        let mut rx = bus.subscribe("run_1");
        let _ = bus.publish(RunEvent::finished("run_1", false));

        // Only the event published after attaching arrives
        let event = rx.recv().await.unwrap();
        assert!(event.is_terminal());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_listener_lags_rather_than_blocking() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe("run_1");

        for i in 0..4 {
            let _ = bus.publish(running_event("run_1", &format!("step_{i}")));
        }

        // The first recv reports the lag; publishing never blocked
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn release_if_idle_keeps_channel_with_listeners() {
        let bus = EventBus::new();
        let _rx = bus.subscribe("run_1");
        assert!(!bus.release_if_idle("run_1"));
        assert_eq!(bus.channel_count(), 1);
    }

    #[tokio::test]
    async fn release_if_idle_removes_abandoned_channel() {
        let bus = EventBus::new();
        {
            let _rx = bus.subscribe("run_1");
            assert_eq!(bus.listener_count("run_1"), 1);
        }
        assert_eq!(bus.listener_count("run_1"), 0);
        assert!(bus.release_if_idle("run_1"));
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn remove_is_unconditional() {
        let bus = EventBus::new();
        let _rx = bus.subscribe("run_1");
        bus.remove("run_1");
        assert_eq!(bus.channel_count(), 0);
    }

    #[tokio::test]
    async fn dropping_listener_does_not_stop_publishing() {
        let bus = EventBus::new();
        let rx = bus.subscribe("run_1");
        drop(rx);
        // Disconnecting a viewer never cancels the underlying pipeline
        assert_eq!(bus.publish(running_event("run_1", "step_1")), 0);
    }
}
