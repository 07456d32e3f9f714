//! Subscription bridge: single-consumer stream lifecycle over a `SignalObserver`.
//!
//! The host drives the bridge with `on_attach` / `on_detach` / `on_teardown`.
//! While a consumer is attached, every power state produced by the observer is
//! pushed to it; otherwise events are dropped.

use crate::error::BridgeResult;
use crate::observer::SignalObserver;
use crate::power::PowerState;
use crate::source::{lock, SignalSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// Default event channel name.
pub const DEFAULT_CHANNEL: &str = "screenwatch/screen_state";

/// Consumer side of the event channel.
pub trait EventSink: Send + Sync {
    /// Deliver a single value.
    ///
    /// Called with the bridge's consumer slot locked, so `on_detach` waits
    /// for an in-flight push. Must not block or call back into the bridge.
    fn push(&self, state: PowerState);
}

/// Identity of an attached consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

impl ConsumerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Lifecycle state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeState {
    /// No consumer, observer inactive.
    Detached,
    /// A consumer is attached.
    Attached,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::Detached
    }
}

/// The attached consumer. Held weakly: the host owns the sink.
struct ActiveConsumer {
    id: ConsumerId,
    sink: Weak<dyn EventSink>,
}

type ConsumerSlot = Arc<Mutex<Option<ActiveConsumer>>>;

pub struct SubscriptionBridge {
    channel: String,
    observer: SignalObserver,
    consumer: ConsumerSlot,
}

impl SubscriptionBridge {
    /// Create a detached bridge over `source`.
    pub fn new(channel: impl Into<String>, source: Arc<dyn SignalSource>) -> Self {
        let channel = channel.into();
        let consumer: ConsumerSlot = Arc::new(Mutex::new(None));

        let slot = consumer.clone();
        let delivery_channel = channel.clone();
        let observer = SignalObserver::new(
            source,
            Arc::new(move |state| deliver(&delivery_channel, &slot, state)),
        );

        Self {
            channel,
            observer,
            consumer,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn state(&self) -> BridgeState {
        if lock(&self.consumer).is_some() {
            BridgeState::Attached
        } else {
            BridgeState::Detached
        }
    }

    /// Id of the attached consumer, if any.
    pub fn consumer_id(&self) -> Option<ConsumerId> {
        lock(&self.consumer).as_ref().map(|c| c.id)
    }

    /// Whether the underlying observer holds a registration.
    pub fn is_observing(&self) -> bool {
        self.observer.is_active()
    }

    /// Attach `sink` as the consumer and activate the observer.
    ///
    /// The last attach wins. If activation fails the consumer stays attached
    /// and the error is returned to the host; no events flow until a later
    /// attach activates successfully.
    pub fn on_attach(&mut self, sink: &Arc<dyn EventSink>) -> BridgeResult<()> {
        let id = ConsumerId::next();
        let weak = Arc::downgrade(sink);

        let previous = lock(&self.consumer).replace(ActiveConsumer { id, sink: weak });
        if let Some(previous) = previous {
            warn!(channel = %self.channel, replaced = %previous.id, consumer = %id, "Replacing attached consumer");
        }
        info!(channel = %self.channel, consumer = %id, "Consumer attached");

        if let Err(err) = self.observer.activate() {
            warn!(channel = %self.channel, error = %err, "Observer activation failed, no events will flow");
            return Err(err.into());
        }
        Ok(())
    }

    /// Deactivate the observer and clear the consumer. A no-op when detached.
    pub fn on_detach(&mut self) {
        if self.state() == BridgeState::Detached && !self.observer.is_active() {
            debug!(channel = %self.channel, "Detach while detached");
            return;
        }
        self.detach();
    }

    /// Forced detach for host shutdown, regardless of the current state.
    pub fn on_teardown(&mut self) {
        info!(channel = %self.channel, "Teardown");
        self.detach();
    }

    fn detach(&mut self) {
        if let Err(err) = self.observer.deactivate() {
            warn!(channel = %self.channel, error = %err, "Observer release failed");
        }
        if let Some(previous) = lock(&self.consumer).take() {
            info!(channel = %self.channel, consumer = %previous.id, "Consumer detached");
        }
    }
}

impl Drop for SubscriptionBridge {
    fn drop(&mut self) {
        self.on_teardown();
    }
}

/// Push `state` to the attached consumer.
///
/// The slot stays locked across `push`: `detach` takes the slot under the
/// same lock, so once it returns no delivery is in flight.
fn deliver(channel: &str, slot: &Mutex<Option<ActiveConsumer>>, state: PowerState) {
    let guard = lock(slot);

    let Some(consumer) = guard.as_ref() else {
        debug!(channel, %state, "No consumer attached, dropping event");
        return;
    };
    let id = consumer.id;
    match consumer.sink.upgrade() {
        Some(sink) => {
            debug!(channel, consumer = %id, %state, "Forwarding event");
            sink.push(state);
        }
        None => {
            debug!(channel, consumer = %id, %state, "Consumer gone, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BridgeError, ObserverError, SourceError};
    use crate::power::NotificationKind;
    use crate::source::ManualSignalSource;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        received: Mutex<Vec<&'static str>>,
    }

    impl RecordingSink {
        fn received(&self) -> Vec<&'static str> {
            self.received.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn push(&self, state: PowerState) {
            self.received.lock().unwrap().push(state.as_str());
        }
    }

    /// Attach handle for a concrete sink. The clone is dropped with the
    /// statement, leaving the test as the only owner.
    fn consumer<S: EventSink + 'static>(sink: &Arc<S>) -> Arc<dyn EventSink> {
        sink.clone()
    }

    fn bridge() -> (SubscriptionBridge, Arc<ManualSignalSource>) {
        let source = Arc::new(ManualSignalSource::new());
        let bridge = SubscriptionBridge::new(DEFAULT_CHANNEL, source.clone());
        (bridge, source)
    }

    #[test]
    fn test_initial_state() {
        let (bridge, source) = bridge();
        assert_eq!(bridge.state(), BridgeState::Detached);
        assert_eq!(bridge.channel(), DEFAULT_CHANNEL);
        assert!(!bridge.is_observing());
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_attach_forward_detach_scenario() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());

        bridge.on_attach(&consumer(&sink)).unwrap();
        assert_eq!(bridge.state(), BridgeState::Attached);

        source.raise(NotificationKind::ScreenOff);
        assert_eq!(sink.received(), vec!["OFF"]);
        source.raise(NotificationKind::ScreenOn);
        assert_eq!(sink.received(), vec!["OFF", "ON"]);

        bridge.on_detach();
        assert_eq!(bridge.state(), BridgeState::Detached);
        source.raise(NotificationKind::ScreenOff);
        assert_eq!(sink.received(), vec!["OFF", "ON"]);
    }

    #[test]
    fn test_ignores_other_kinds() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());
        bridge.on_attach(&consumer(&sink)).unwrap();

        source.raise(NotificationKind::Other("android.intent.action.USER_PRESENT".into()));
        assert!(sink.received().is_empty());
    }

    #[test]
    fn test_double_attach_single_registration() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());

        bridge.on_attach(&consumer(&sink)).unwrap();
        bridge.on_attach(&consumer(&sink)).unwrap();

        assert_eq!(source.registration_count(), 1);
        assert_eq!(source.listener_count(), 1);
        source.raise(NotificationKind::ScreenOn);
        assert_eq!(sink.received(), vec!["ON"]);
    }

    #[test]
    fn test_last_attach_wins() {
        let (mut bridge, source) = bridge();
        let first = Arc::new(RecordingSink::default());
        let second = Arc::new(RecordingSink::default());

        bridge.on_attach(&consumer(&first)).unwrap();
        let first_id = bridge.consumer_id();
        bridge.on_attach(&consumer(&second)).unwrap();
        assert_ne!(bridge.consumer_id(), first_id);

        source.raise(NotificationKind::ScreenOff);
        assert!(first.received().is_empty());
        assert_eq!(second.received(), vec!["OFF"]);
    }

    #[test]
    fn test_detach_when_never_attached() {
        let (mut bridge, source) = bridge();
        bridge.on_detach();
        bridge.on_detach();
        assert_eq!(bridge.state(), BridgeState::Detached);
        assert_eq!(source.listener_count(), 0);
        assert_eq!(source.registration_count(), 0);
    }

    #[test]
    fn test_teardown_releases_registration() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());
        bridge.on_attach(&consumer(&sink)).unwrap();

        bridge.on_teardown();
        assert_eq!(bridge.state(), BridgeState::Detached);
        assert!(!bridge.is_observing());
        assert_eq!(source.listener_count(), 0);

        // Teardown from the detached state is also fine.
        bridge.on_teardown();

        // A fresh attach registers cleanly again.
        bridge.on_attach(&consumer(&sink)).unwrap();
        assert_eq!(source.registration_count(), 2);
    }

    #[test]
    fn test_activation_failure_keeps_consumer_attached() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());
        source.fail_next_register(SourceError::Unavailable("display service down".into()));

        let err = bridge.on_attach(&consumer(&sink)).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Observer(ObserverError::ObserverUnavailable { .. })
        ));
        assert_eq!(bridge.state(), BridgeState::Attached);
        assert!(!bridge.is_observing());

        source.raise(NotificationKind::ScreenOff);
        assert!(sink.received().is_empty());

        // Next attach retries activation.
        bridge.on_attach(&consumer(&sink)).unwrap();
        source.raise(NotificationKind::ScreenOff);
        assert_eq!(sink.received(), vec!["OFF"]);
    }

    #[test]
    fn test_release_failure_still_detaches() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());
        bridge.on_attach(&consumer(&sink)).unwrap();

        source.fail_next_unregister(SourceError::Unavailable("gone".into()));
        bridge.on_detach();
        assert_eq!(bridge.state(), BridgeState::Detached);
        assert!(!bridge.is_observing());
    }

    #[test]
    fn test_dropped_consumer_is_not_kept_alive() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());
        bridge.on_attach(&consumer(&sink)).unwrap();

        let weak = Arc::downgrade(&sink);
        drop(sink);
        assert!(weak.upgrade().is_none());

        // Delivery to a dropped consumer is a silent drop.
        assert_eq!(source.raise(NotificationKind::ScreenOn), 1);
        assert_eq!(bridge.state(), BridgeState::Attached);
    }

    #[test]
    fn test_attach_trait_object() {
        let (mut bridge, source) = bridge();
        let recording = Arc::new(RecordingSink::default());
        let sink: Arc<dyn EventSink> = recording.clone();

        bridge.on_attach(&sink).unwrap();
        source.raise(NotificationKind::ScreenOff);
        assert_eq!(recording.received(), vec!["OFF"]);
    }

    /// Sink that parks inside `push` until released.
    struct GatedSink {
        entered: Sender<()>,
        release: Receiver<()>,
        received: Mutex<Vec<PowerState>>,
    }

    impl EventSink for GatedSink {
        fn push(&self, state: PowerState) {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            self.received.lock().unwrap().push(state);
        }
    }

    #[test]
    fn test_detach_waits_for_inflight_delivery() {
        let (mut bridge, source) = bridge();
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let sink = Arc::new(GatedSink {
            entered: entered_tx,
            release: release_rx,
            received: Mutex::new(Vec::new()),
        });
        bridge.on_attach(&consumer(&sink)).unwrap();

        let raiser = {
            let source = source.clone();
            thread::spawn(move || source.raise(NotificationKind::ScreenOff))
        };
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            release_tx.send(()).unwrap();
        });

        bridge.on_detach();
        // The push that was in flight completed before detach returned.
        assert_eq!(*sink.received.lock().unwrap(), vec![PowerState::Off]);
        assert_eq!(bridge.state(), BridgeState::Detached);

        assert_eq!(raiser.join().unwrap(), 1);
        releaser.join().unwrap();

        assert_eq!(source.raise(NotificationKind::ScreenOn), 0);
        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_drop_tears_down() {
        let (mut bridge, source) = bridge();
        let sink = Arc::new(RecordingSink::default());
        bridge.on_attach(&consumer(&sink)).unwrap();
        drop(bridge);
        assert_eq!(source.listener_count(), 0);
    }
}
