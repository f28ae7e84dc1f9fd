//! Backend reachability and its observers.
//!
//! Observers subscribe through a channel rather than registering callbacks:
//! a subscriber that goes away (window closed, view torn down) simply stops
//! receiving, and dropping the subscription unregisters it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Last known reachability of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    /// `None` until the first request outcome after start-up or a base URL
    /// change.
    pub connected: Option<bool>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.connected.unwrap_or(false)
    }

    /// True when never checked or the last check is older than `max_age`.
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.last_checked {
            None => true,
            Some(at) => now
                .signed_duration_since(at)
                .to_std()
                .map(|age| age > max_age)
                .unwrap_or(false),
        }
    }
}

/// Identifies one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Debug, Default)]
struct TrackerInner {
    state: ConnectionState,
    observers: Vec<(ObserverId, mpsc::UnboundedSender<bool>)>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    inner: Mutex<TrackerInner>,
}

impl ConnectivityTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Record the outcome of a request attempt. Observers hear about it only
    /// when it differs from the recorded state. Returns whether it changed.
    pub fn record(&self, connected: bool) -> bool {
        let mut inner = self.inner.lock();
        inner.state.last_checked = Some(Utc::now());
        if inner.state.connected == Some(connected) {
            return false;
        }

        inner.state.connected = Some(connected);
        debug!(connected, "connection state changed");
        inner.observers.retain(|(id, tx)| {
            if tx.send(connected).is_ok() {
                true
            } else {
                debug!(observer = id.0, "dropping closed connection observer");
                false
            }
        });
        true
    }

    /// Forget the recorded state so the next outcome is always reported.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = ConnectionState::default();
    }

    pub fn subscribe(self: &Arc<Self>) -> ConnectionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.observers.push((id, tx));
        ConnectionSubscription {
            id,
            receiver: rx,
            tracker: Arc::downgrade(self),
        }
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.inner.lock().observers.retain(|(other, _)| *other != id);
    }

    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }
}

/// Receives every connectivity change after it was created.
#[derive(Debug)]
pub struct ConnectionSubscription {
    id: ObserverId,
    receiver: mpsc::UnboundedReceiver<bool>,
    tracker: Weak<ConnectivityTracker>,
}

impl ConnectionSubscription {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Wait for the next change. `None` once the tracker is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        self.receiver.recv().await
    }

    /// Next change if one is already queued.
    pub fn try_changed(&mut self) -> Option<bool> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ConnectionSubscription {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.upgrade() {
            tracker.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(sub: &mut ConnectionSubscription) -> Vec<bool> {
        std::iter::from_fn(|| sub.try_changed()).collect()
    }

    #[test]
    fn failure_then_success_notifies_twice() {
        let tracker = ConnectivityTracker::new();
        let mut sub = tracker.subscribe();

        assert!(tracker.record(false));
        assert!(tracker.record(true));

        assert_eq!(drain(&mut sub), vec![false, true]);
    }

    #[test]
    fn repeated_outcomes_are_silent() {
        let tracker = ConnectivityTracker::new();
        let mut sub = tracker.subscribe();

        tracker.record(true);
        assert!(!tracker.record(true));
        assert!(!tracker.record(true));
        tracker.record(false);
        assert!(!tracker.record(false));

        assert_eq!(drain(&mut sub), vec![true, false]);
    }

    #[test]
    fn reset_reports_next_outcome_again() {
        let tracker = ConnectivityTracker::new();
        let mut sub = tracker.subscribe();
        tracker.record(true);
        tracker.reset();
        assert_eq!(tracker.state().connected, None);
        tracker.record(true);
        assert_eq!(drain(&mut sub), vec![true, true]);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let tracker = ConnectivityTracker::new();
        let sub = tracker.subscribe();
        let _other = tracker.subscribe();
        assert_eq!(tracker.observer_count(), 2);
        drop(sub);
        assert_eq!(tracker.observer_count(), 1);
    }

    #[test]
    fn closed_receivers_are_pruned_on_change() {
        let tracker = ConnectivityTracker::new();
        let (tx, rx) = mpsc::unbounded_channel();
        tracker.inner.lock().observers.push((ObserverId(99), tx));
        drop(rx);

        tracker.record(true);
        assert_eq!(tracker.observer_count(), 0);
    }

    #[test]
    fn staleness_uses_last_check() {
        let now = Utc::now();
        let mut state = ConnectionState::default();
        assert!(state.is_stale(Duration::from_secs(300), now));
        state.last_checked = Some(now - chrono::Duration::seconds(10));
        assert!(!state.is_stale(Duration::from_secs(300), now));
        state.last_checked = Some(now - chrono::Duration::seconds(301));
        assert!(state.is_stale(Duration::from_secs(300), now));
    }
}
