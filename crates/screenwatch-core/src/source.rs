//! Platform signal source seam.
//!
//! A `SignalSource` keeps a table of listeners keyed by `ListenerId` and
//! dispatches raw `NotificationKind`s to every listener whose filter matches.
//! Implementations live in `screenwatch-platform`; `ManualSignalSource` is the
//! in-process source driven directly by the host.

use crate::error::{SourceError, SourceResult};
use crate::power::{NotificationFilter, NotificationKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Callback invoked by a source for each matching notification.
pub type NotificationCallback = Arc<dyn Fn(&NotificationKind) + Send + Sync>;

/// Process-unique identity of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Mint a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Trait for platform signal sources (implemented by screenwatch-platform).
///
/// Both calls are synchronous and non-blocking. Registering an id twice must
/// fail with `SourceError::AlreadyRegistered`; unregistering an unknown id
/// must fail with `SourceError::NotRegistered`.
pub trait SignalSource: Send + Sync {
    fn register(
        &self,
        listener: ListenerId,
        filter: NotificationFilter,
        callback: NotificationCallback,
    ) -> SourceResult<()>;

    fn unregister(&self, listener: ListenerId) -> SourceResult<()>;
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Listener {
    filter: NotificationFilter,
    callback: NotificationCallback,
}

/// Signal source driven by the host: notifications are raised explicitly
/// and dispatched synchronously on the calling thread.
#[derive(Default)]
pub struct ManualSignalSource {
    listeners: Mutex<HashMap<ListenerId, Listener>>,
    registrations: AtomicUsize,
    fail_register: Mutex<Option<SourceError>>,
    fail_unregister: Mutex<Option<SourceError>>,
}

impl ManualSignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a notification. Returns how many listeners received it.
    pub fn raise(&self, kind: NotificationKind) -> usize {
        let callbacks: Vec<NotificationCallback> = lock(&self.listeners)
            .values()
            .filter(|listener| listener.filter.matches(&kind))
            .map(|listener| listener.callback.clone())
            .collect();

        debug!(%kind, listeners = callbacks.len(), "Raising notification");
        for callback in &callbacks {
            callback(&kind);
        }
        callbacks.len()
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Total number of successful registrations since creation.
    pub fn registration_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Make the next `register` call fail with `err`.
    pub fn fail_next_register(&self, err: SourceError) {
        *lock(&self.fail_register) = Some(err);
    }

    /// Make the next `unregister` call fail with `err`.
    pub fn fail_next_unregister(&self, err: SourceError) {
        *lock(&self.fail_unregister) = Some(err);
    }
}

impl SignalSource for ManualSignalSource {
    fn register(
        &self,
        listener: ListenerId,
        filter: NotificationFilter,
        callback: NotificationCallback,
    ) -> SourceResult<()> {
        if let Some(err) = lock(&self.fail_register).take() {
            return Err(err);
        }

        let mut listeners = lock(&self.listeners);
        if listeners.contains_key(&listener) {
            return Err(SourceError::AlreadyRegistered);
        }
        listeners.insert(listener, Listener { filter, callback });
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unregister(&self, listener: ListenerId) -> SourceResult<()> {
        if let Some(err) = lock(&self.fail_unregister).take() {
            // The failure is reported, but the listener is gone either way.
            lock(&self.listeners).remove(&listener);
            return Err(err);
        }

        match lock(&self.listeners).remove(&listener) {
            Some(_) => Ok(()),
            None => Err(SourceError::NotRegistered),
        }
    }
}
