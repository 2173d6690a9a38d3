//! Update delivery modes and re-entrancy policy.
//!
//! [`UpdateMode`] is the three-state machine behind `disable_updates` and
//! `enable_updates`:
//!
//! | Mode                | Enabled | Deferred | `notify_observers()`      |
//! |---------------------|---------|----------|---------------------------|
//! | `Enabled`           | yes     | no       | deliver immediately       |
//! | `DisabledDropping`  | no      | no       | drop the notification     |
//! | `DisabledDeferring` | no      | yes      | queue observer for flush  |

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Delivery state of an observable settings instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Notifications are delivered immediately.
    #[default]
    Enabled,
    /// Notifications are silently dropped.
    DisabledDropping,
    /// Notifications are queued and delivered once on `enable_updates()`.
    DisabledDeferring,
}

/// What `notify_observers()` does with a captured observer snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Call `update()` now.
    Immediate,
    /// Discard the notification.
    Drop,
    /// Add the observers to the pending set.
    Defer,
}

impl UpdateMode {
    /// Mode entered by `disable_updates(deferred)`.
    #[inline]
    pub fn disabled(deferred: bool) -> Self {
        if deferred {
            UpdateMode::DisabledDeferring
        } else {
            UpdateMode::DisabledDropping
        }
    }

    /// Whether notifications are delivered immediately.
    #[inline]
    pub fn updates_enabled(self) -> bool {
        matches!(self, UpdateMode::Enabled)
    }

    /// Whether disabled notifications are remembered for a later flush.
    #[inline]
    pub fn updates_deferred(self) -> bool {
        matches!(self, UpdateMode::DisabledDeferring)
    }

    /// Resolves how a notification is handled in this mode.
    #[inline]
    pub fn delivery(self) -> Delivery {
        match self {
            UpdateMode::Enabled => Delivery::Immediate,
            UpdateMode::DisabledDropping => Delivery::Drop,
            UpdateMode::DisabledDeferring => Delivery::Defer,
        }
    }

    /// Configuration string for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::Enabled => "enabled",
            UpdateMode::DisabledDropping => "dropping",
            UpdateMode::DisabledDeferring => "deferring",
        }
    }
}

impl FromStr for UpdateMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enabled" | "on" => Ok(UpdateMode::Enabled),
            "dropping" | "disabled" | "off" => Ok(UpdateMode::DisabledDropping),
            "deferring" | "deferred" => Ok(UpdateMode::DisabledDeferring),
            _ => Err(ConfigError::InvalidUpdateMode(s.to_string())),
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UpdateMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UpdateMode::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Outcome of a successful deferred flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Distinct pending observers that were attempted.
    pub attempted: usize,
    /// Observers whose `update()` was called.
    pub delivered: usize,
    /// Pending observers that had been dropped or unlinked in the meantime.
    pub skipped: usize,
}

/// Behaviour of `notify_observers()` when called re-entrantly on a source
/// that is already delivering on the current thread.
///
/// A re-entrant call happens when an observer's `update()` notifies,
/// directly or through a cycle in the link graph, the source that is
/// currently notifying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReentrancyPolicy {
    /// Plain synchronous fan-out; callers are responsible for cycles.
    #[default]
    Allow,
    /// A nested notification of a source that is mid-delivery is a no-op.
    Suppress,
}

impl ReentrancyPolicy {
    /// Configuration string for this policy.
    pub fn as_str(self) -> &'static str {
        match self {
            ReentrancyPolicy::Allow => "allow",
            ReentrancyPolicy::Suppress => "suppress",
        }
    }
}

impl FromStr for ReentrancyPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(ReentrancyPolicy::Allow),
            "suppress" => Ok(ReentrancyPolicy::Suppress),
            _ => Err(ConfigError::InvalidReentrancy(s.to_string())),
        }
    }
}

impl fmt::Display for ReentrancyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReentrancyPolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ReentrancyPolicy::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode_is_enabled() {
        let mode = UpdateMode::default();
        assert!(mode.updates_enabled());
        assert!(!mode.updates_deferred());
        assert_eq!(mode.delivery(), Delivery::Immediate);
    }

    #[test]
    fn test_disabled_modes() {
        let dropping = UpdateMode::disabled(false);
        assert_eq!(dropping, UpdateMode::DisabledDropping);
        assert!(!dropping.updates_enabled());
        assert!(!dropping.updates_deferred());
        assert_eq!(dropping.delivery(), Delivery::Drop);

        let deferring = UpdateMode::disabled(true);
        assert_eq!(deferring, UpdateMode::DisabledDeferring);
        assert!(!deferring.updates_enabled());
        assert!(deferring.updates_deferred());
        assert_eq!(deferring.delivery(), Delivery::Defer);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(UpdateMode::from_str("Enabled").unwrap(), UpdateMode::Enabled);
        assert_eq!(
            UpdateMode::from_str("off").unwrap(),
            UpdateMode::DisabledDropping
        );
        assert_eq!(
            UpdateMode::from_str("DEFERRED").unwrap(),
            UpdateMode::DisabledDeferring
        );
        assert!(UpdateMode::from_str("paused").is_err());
    }

    #[test]
    fn test_mode_display_round_trips_through_parser() {
        for mode in [
            UpdateMode::Enabled,
            UpdateMode::DisabledDropping,
            UpdateMode::DisabledDeferring,
        ] {
            assert_eq!(UpdateMode::from_str(&mode.to_string()).unwrap(), mode);
        }
    }

    #[test]
    fn test_reentrancy_parsing() {
        assert_eq!(
            ReentrancyPolicy::from_str("SUPPRESS").unwrap(),
            ReentrancyPolicy::Suppress
        );
        assert_eq!(ReentrancyPolicy::default(), ReentrancyPolicy::Allow);
        assert!(ReentrancyPolicy::from_str("detect").is_err());
    }
}
