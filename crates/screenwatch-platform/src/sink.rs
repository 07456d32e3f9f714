//! Event sink over a bounded crossbeam channel.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use screenwatch_core::{EventSink, PowerState};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pushes power states into a channel read by the host.
///
/// A full or disconnected channel drops the event.
pub struct ChannelSink {
    event_tx: Sender<PowerState>,
}

impl ChannelSink {
    /// Create a sink and the receiver the host reads from.
    pub fn bounded(capacity: usize) -> (Arc<Self>, Receiver<PowerState>) {
        let (event_tx, event_rx) = bounded(capacity);
        (Arc::new(Self { event_tx }), event_rx)
    }
}

impl EventSink for ChannelSink {
    fn push(&self, state: PowerState) {
        match self.event_tx.try_send(state) {
            Ok(()) => {}
            Err(TrySendError::Full(state)) => {
                warn!(%state, "Event channel full, dropping event");
            }
            Err(TrySendError::Disconnected(state)) => {
                debug!(%state, "Event channel closed, dropping event");
            }
        }
    }
}
