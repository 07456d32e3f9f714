//! screenwatch-core: display power observer + single-consumer subscription bridge.
//!
//! Design goal: keep this crate platform-agnostic. Platform signal sources
//! (sysfs pollers, OS notification hooks) and channel-backed sinks live in
//! `screenwatch-platform`.
//!
//! - `power` - `PowerState` and raw notification kinds
//! - `source` - the `SignalSource` seam and the host-driven `ManualSignalSource`
//! - `observer` - `SignalObserver`, owner of the single source registration
//! - `bridge` - `SubscriptionBridge`, the attach/detach/teardown lifecycle

mod bridge;
mod error;
mod observer;
mod power;
mod source;

pub use bridge::{BridgeState, ConsumerId, EventSink, SubscriptionBridge, DEFAULT_CHANNEL};
pub use error::{BridgeError, BridgeResult, ObserverError, SourceError, SourceResult};
pub use observer::{PowerCallback, Registration, SignalObserver};
pub use power::{NotificationFilter, NotificationKind, PowerState};
pub use source::{ListenerId, ManualSignalSource, NotificationCallback, SignalSource};
