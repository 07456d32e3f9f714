//! Signal observer: owns at most one registration with a platform signal
//! source and turns raw notifications into `PowerState` values.

use crate::error::{ObserverError, SourceError};
use crate::power::{NotificationFilter, NotificationKind, PowerState};
use crate::source::{ListenerId, NotificationCallback, SignalSource};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Callback receiving normalized power states.
pub type PowerCallback = Arc<dyn Fn(PowerState) + Send + Sync>;

/// Live registration with the signal source.
#[derive(Debug, PartialEq, Eq)]
pub struct Registration {
    listener: ListenerId,
}

impl Registration {
    pub fn listener(&self) -> ListenerId {
        self.listener
    }
}

pub struct SignalObserver {
    source: Arc<dyn SignalSource>,
    on_event: PowerCallback,
    registration: Option<Registration>,
}

impl SignalObserver {
    /// Create an inactive observer that will deliver states to `on_event`.
    pub fn new(source: Arc<dyn SignalSource>, on_event: PowerCallback) -> Self {
        Self {
            source,
            on_event,
            registration: None,
        }
    }

    /// Whether a registration is currently held.
    pub fn is_active(&self) -> bool {
        self.registration.is_some()
    }

    pub fn registration(&self) -> Option<&Registration> {
        self.registration.as_ref()
    }

    /// Register with the source. A no-op when already active.
    ///
    /// `AlreadyRegistered` from the source counts as success. Any other
    /// failure leaves the observer inactive so a later call can retry.
    pub fn activate(&mut self) -> Result<(), ObserverError> {
        if self.registration.is_some() {
            debug!("Observer already active");
            return Ok(());
        }

        let listener = ListenerId::next();
        let on_event = self.on_event.clone();
        let callback: NotificationCallback = Arc::new(move |kind: &NotificationKind| {
            if let Some(state) = Self::on_notification(kind) {
                on_event(state);
            }
        });

        match self
            .source
            .register(listener, NotificationFilter::screen_power(), callback)
        {
            Ok(()) => {
                info!(%listener, "Observer registered");
            }
            Err(SourceError::AlreadyRegistered) => {
                debug!(%listener, "Observer was already registered");
            }
            Err(err) => {
                warn!(%listener, error = %err, "Observer registration failed");
                return Err(err.into());
            }
        }

        self.registration = Some(Registration { listener });
        Ok(())
    }

    /// Release the registration. A no-op when inactive.
    ///
    /// `NotRegistered` from the source is swallowed. Other failures are
    /// returned for the caller to report; the observer is inactive either way.
    pub fn deactivate(&mut self) -> Result<(), ObserverError> {
        let Some(registration) = self.registration.take() else {
            return Ok(());
        };

        let listener = registration.listener;
        match self.source.unregister(listener) {
            Ok(()) => {
                info!(%listener, "Observer unregistered");
                Ok(())
            }
            Err(SourceError::NotRegistered) => {
                debug!(%listener, "Observer was not registered");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Map a raw notification to a power state. Unrelated kinds yield `None`.
    pub fn on_notification(kind: &NotificationKind) -> Option<PowerState> {
        match kind {
            NotificationKind::ScreenOff => Some(PowerState::Off),
            NotificationKind::ScreenOn => Some(PowerState::On),
            NotificationKind::Other(_) => None,
        }
    }
}

impl Drop for SignalObserver {
    fn drop(&mut self) {
        if let Err(err) = self.deactivate() {
            warn!(error = %err, "Observer release failed on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ManualSignalSource;
    use std::sync::Mutex;

    fn observer_with_log() -> (SignalObserver, Arc<ManualSignalSource>, Arc<Mutex<Vec<PowerState>>>) {
        let source = Arc::new(ManualSignalSource::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let observer = SignalObserver::new(
            source.clone(),
            Arc::new(move |state: PowerState| log_clone.lock().unwrap().push(state)),
        );
        (observer, source, log)
    }

    #[test]
    fn test_on_notification_mapping() {
        assert_eq!(
            SignalObserver::on_notification(&NotificationKind::ScreenOff),
            Some(PowerState::Off)
        );
        assert_eq!(
            SignalObserver::on_notification(&NotificationKind::ScreenOn),
            Some(PowerState::On)
        );
        assert_eq!(
            SignalObserver::on_notification(&NotificationKind::Other("user_present".into())),
            None
        );
    }

    #[test]
    fn test_activate_is_idempotent() {
        let (mut observer, source, _) = observer_with_log();
        observer.activate().unwrap();
        let first = observer.registration().map(Registration::listener);
        for _ in 0..4 {
            observer.activate().unwrap();
        }
        assert!(observer.is_active());
        assert_eq!(observer.registration().map(Registration::listener), first);
        assert_eq!(source.registration_count(), 1);
        assert_eq!(source.listener_count(), 1);
    }

    #[test]
    fn test_already_registered_is_success() {
        let (mut observer, source, _) = observer_with_log();
        source.fail_next_register(SourceError::AlreadyRegistered);
        observer.activate().unwrap();
        assert!(observer.is_active());
    }

    #[test]
    fn test_activation_failure_then_retry() {
        let (mut observer, source, _) = observer_with_log();
        source.fail_next_register(SourceError::Unavailable("no display".into()));

        let err = observer.activate().unwrap_err();
        assert!(matches!(err, ObserverError::ObserverUnavailable { .. }));
        assert!(!observer.is_active());

        observer.activate().unwrap();
        assert!(observer.is_active());
        assert_eq!(source.registration_count(), 1);
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let (mut observer, source, _) = observer_with_log();
        observer.deactivate().unwrap();

        observer.activate().unwrap();
        observer.deactivate().unwrap();
        for _ in 0..3 {
            observer.deactivate().unwrap();
        }
        assert!(!observer.is_active());
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_not_registered_is_swallowed() {
        let (mut observer, source, _) = observer_with_log();
        observer.activate().unwrap();
        source.fail_next_unregister(SourceError::NotRegistered);
        observer.deactivate().unwrap();
        assert!(!observer.is_active());
    }

    #[test]
    fn test_deactivate_failure_still_inactive() {
        let (mut observer, source, _) = observer_with_log();
        observer.activate().unwrap();
        source.fail_next_unregister(SourceError::Unavailable("gone".into()));

        assert!(observer.deactivate().is_err());
        assert!(!observer.is_active());
        // Releasing again is a clean no-op.
        observer.deactivate().unwrap();
    }

    #[test]
    fn test_forwards_only_power_kinds() {
        let (mut observer, source, log) = observer_with_log();
        observer.activate().unwrap();

        source.raise(NotificationKind::ScreenOff);
        source.raise(NotificationKind::Other("standby".into()));
        source.raise(NotificationKind::ScreenOn);

        assert_eq!(*log.lock().unwrap(), vec![PowerState::Off, PowerState::On]);
    }

    #[test]
    fn test_drop_releases_registration() {
        let (mut observer, source, _) = observer_with_log();
        observer.activate().unwrap();
        drop(observer);
        assert_eq!(source.listener_count(), 0);
    }
}
