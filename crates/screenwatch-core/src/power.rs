//! Display power values: the normalized state forwarded to consumers and the
//! raw notification kinds raised by a platform signal source.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Normalized display power state.
///
/// Serialized (and displayed) as the literal strings `"ON"` / `"OFF"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl PowerState {
    /// Wire form delivered to consumers.
    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::On => "ON",
            PowerState::Off => "OFF",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw notification kind raised by a platform signal source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Display powered on.
    ScreenOn,
    /// Display powered off.
    ScreenOff,
    /// Anything else the platform reports (standby, suspend, unrelated actions).
    Other(String),
}

impl NotificationKind {
    /// Parse a platform action string.
    ///
    /// Accepts `screen_on` / `screen_off` (any case) and the Android intent
    /// actions `android.intent.action.SCREEN_ON` / `SCREEN_OFF`.
    pub fn from_action(action: &str) -> Self {
        let action = action.trim();
        let short = action
            .strip_prefix("android.intent.action.")
            .unwrap_or(action);

        if short.eq_ignore_ascii_case("screen_on") {
            NotificationKind::ScreenOn
        } else if short.eq_ignore_ascii_case("screen_off") {
            NotificationKind::ScreenOff
        } else {
            NotificationKind::Other(action.to_string())
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::ScreenOn => f.write_str("screen_on"),
            NotificationKind::ScreenOff => f.write_str("screen_off"),
            NotificationKind::Other(action) => write!(f, "other({})", action),
        }
    }
}

/// Set of notification kinds a listener is interested in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    kinds: HashSet<NotificationKind>,
}

impl NotificationFilter {
    /// Empty filter (matches nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// The two display power kinds: screen on and screen off.
    pub fn screen_power() -> Self {
        Self::new()
            .with(NotificationKind::ScreenOff)
            .with(NotificationKind::ScreenOn)
    }

    /// Add a kind to the filter.
    pub fn with(mut self, kind: NotificationKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    /// Whether `kind` passes the filter.
    pub fn matches(&self, kind: &NotificationKind) -> bool {
        self.kinds.contains(kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
