//! Display power signal source backed by Linux sysfs.
//!
//! The kernel does not push DPMS changes to userspace through sysfs, so a
//! poller thread reads the connector/backlight attributes and raises a
//! notification on every transition. The poller starts with the first
//! registered listener and stops when the last one unregisters.

mod sysfs;

pub use sysfs::{
    aggregate, classify_bl_power, classify_dpms, discover, read_display_power, PowerFile,
    PowerFileKind,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use screenwatch_core::{
    ListenerId, NotificationCallback, NotificationFilter, NotificationKind, SignalSource,
    SourceError, SourceResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Configuration for the sysfs display power source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SysfsSourceConfig {
    /// DRM class directory holding connector `dpms` attributes.
    pub drm_root: PathBuf,
    /// Backlight class directory holding `bl_power` attributes.
    pub backlight_root: PathBuf,
    /// Poll interval (milliseconds).
    pub poll_interval_ms: u64,
}

impl Default for SysfsSourceConfig {
    fn default() -> Self {
        Self {
            drm_root: PathBuf::from("/sys/class/drm"),
            backlight_root: PathBuf::from("/sys/class/backlight"),
            poll_interval_ms: 250,
        }
    }
}

struct Listener {
    filter: NotificationFilter,
    callback: NotificationCallback,
}

type ListenerTable = Arc<Mutex<HashMap<ListenerId, Listener>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the running poller thread.
struct PollerHandle {
    stop_tx: Sender<()>,
    running: Arc<AtomicBool>,
    /// Not joined: the thread exits on its next wake-up after `stop`.
    #[allow(dead_code)]
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.try_send(());
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Signal source reading display power from sysfs.
pub struct SysfsSignalSource {
    config: SysfsSourceConfig,
    listeners: ListenerTable,
    poller: Mutex<Option<PollerHandle>>,
}

impl SysfsSignalSource {
    pub fn new(config: SysfsSourceConfig) -> Self {
        Self {
            config,
            listeners: Arc::new(Mutex::new(HashMap::new())),
            poller: Mutex::new(None),
        }
    }

    /// Whether the poller thread is running.
    pub fn is_polling(&self) -> bool {
        lock(&self.poller)
            .as_ref()
            .map_or(false, |p| p.running.load(Ordering::SeqCst))
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn start_poller(&self) {
        let mut poller = lock(&self.poller);
        if poller.as_ref().map_or(false, |p| p.running.load(Ordering::SeqCst)) {
            return;
        }

        let (stop_tx, stop_rx) = bounded(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let config = self.config.clone();
        let listeners = self.listeners.clone();

        let thread = thread::spawn(move || {
            run_poller(config, listeners, stop_rx, running_clone);
        });

        *poller = Some(PollerHandle {
            stop_tx,
            running,
            thread: Some(thread),
        });
    }

    fn stop_poller(&self) {
        if let Some(poller) = lock(&self.poller).take() {
            poller.stop();
        }
    }
}

impl SignalSource for SysfsSignalSource {
    fn register(
        &self,
        listener: ListenerId,
        filter: NotificationFilter,
        callback: NotificationCallback,
    ) -> SourceResult<()> {
        {
            let listeners = lock(&self.listeners);
            if listeners.contains_key(&listener) {
                return Err(SourceError::AlreadyRegistered);
            }
        }

        let files = discover(&self.config.drm_root, &self.config.backlight_root)?;
        if files.is_empty() {
            return Err(SourceError::Unavailable(format!(
                "no dpms or bl_power attributes under {} or {}",
                self.config.drm_root.display(),
                self.config.backlight_root.display()
            )));
        }

        lock(&self.listeners).insert(listener, Listener { filter, callback });
        debug!(%listener, files = files.len(), "Sysfs listener registered");
        self.start_poller();
        Ok(())
    }

    fn unregister(&self, listener: ListenerId) -> SourceResult<()> {
        let remaining = {
            let mut listeners = lock(&self.listeners);
            if listeners.remove(&listener).is_none() {
                return Err(SourceError::NotRegistered);
            }
            listeners.len()
        };

        debug!(%listener, remaining, "Sysfs listener unregistered");
        if remaining == 0 {
            self.stop_poller();
        }
        Ok(())
    }
}

impl Drop for SysfsSignalSource {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

/// Dispatch `kind` to matching listeners. Returns how many were called.
///
/// `running` is checked under the listener lock: `stop_poller` clears it
/// before `unregister` returns, so a stopped poller can never reach a
/// listener registered afterwards.
fn dispatch(listeners: &ListenerTable, running: &AtomicBool, kind: &NotificationKind) -> usize {
    let callbacks: Vec<NotificationCallback> = {
        let table = lock(listeners);
        if !running.load(Ordering::SeqCst) {
            debug!(%kind, "Poller stopped, dropping transition");
            return 0;
        }
        table
            .values()
            .filter(|l| l.filter.matches(kind))
            .map(|l| l.callback.clone())
            .collect()
    };

    debug!(%kind, listeners = callbacks.len(), "Display power transition");
    for callback in &callbacks {
        callback(kind);
    }
    callbacks.len()
}

/// Poll sysfs until stopped, dispatching on transitions.
///
/// The first reading is the baseline and is not dispatched.
fn run_poller(
    config: SysfsSourceConfig,
    listeners: ListenerTable,
    stop_rx: Receiver<()>,
    running: Arc<AtomicBool>,
) {
    info!(interval_ms = config.poll_interval_ms, "Display power poller started");

    let interval = Duration::from_millis(config.poll_interval_ms.max(1));
    let read = || read_display_power(&config.drm_root, &config.backlight_root);

    let mut last = match read() {
        Ok(kind) => kind,
        Err(error) => {
            error!(?error, "Initial display power read failed");
            None
        }
    };

    while running.load(Ordering::SeqCst) {
        match stop_rx.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        match read() {
            Ok(Some(kind)) => {
                if last.as_ref() != Some(&kind) {
                    dispatch(&listeners, &running, &kind);
                    last = Some(kind);
                }
            }
            Ok(None) => {}
            Err(error) => {
                error!(?error, "Display power read failed");
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    info!("Display power poller exiting");
}
