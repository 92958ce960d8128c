//! # Restart policy for app restarters.
//!
//! [`RestartPolicy`] controls how an [`AppRestarter`](crate::AppRestarter)
//! behaves once the app it watches has died:
//! - [`RestartPolicy::delay`] how long to wait after death before relaunching;
//! - [`RestartPolicy::max_tries`] how many relaunches the app gets in total.
//!
//! The policy is written inline in an app definition as a small TOML block:
//! ```text
//! delay = 2.5      # seconds, default 1.0
//! maxTries = 5     # -1 = unlimited (default)
//! ```
//!
//! The block is parsed and validated exactly once, when the restarter is
//! constructed. Unknown keys, a negative/non-finite delay and a `maxTries`
//! below `-1` are rejected.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use fleetvisor::{RestartPolicy, RestartsRemaining};
//!
//! let policy = RestartPolicy::from_block("delay = 2.5\nmaxTries = 5").unwrap();
//! assert_eq!(policy.delay, Duration::from_millis(2500));
//! assert_eq!(policy.max_tries, RestartsRemaining::count(5));
//!
//! let defaults = RestartPolicy::from_block("").unwrap();
//! assert_eq!(defaults, RestartPolicy::default());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::RestartsRemaining;
use crate::error::ConfigError;

const DEFAULT_DELAY_SECS: f64 = 1.0;
const DEFAULT_MAX_TRIES: i32 = -1;

/// Validated restart parameters of one app.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RestartBlock", into = "RestartBlock")]
pub struct RestartPolicy {
    /// Wait between the app's death and the relaunch.
    pub delay: Duration,
    /// Total relaunch budget, seeded into `AppState::restarts_remaining`.
    /// Never [`RestartsRemaining::UNINITIALIZED`].
    pub max_tries: RestartsRemaining,
}

impl Default for RestartPolicy {
    /// `delay = 1s`, `max_tries = unlimited`.
    fn default() -> Self {
        Self {
            delay: Duration::from_secs_f64(DEFAULT_DELAY_SECS),
            max_tries: RestartsRemaining::UNLIMITED,
        }
    }
}

/// Raw on-disk form of the block.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct RestartBlock {
    delay: f64,
    max_tries: i32,
}

impl Default for RestartBlock {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY_SECS,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }
}

impl TryFrom<RestartBlock> for RestartPolicy {
    type Error = ConfigError;

    fn try_from(block: RestartBlock) -> Result<Self, Self::Error> {
        let delay = Duration::try_from_secs_f64(block.delay)
            .map_err(|_| ConfigError::InvalidDelay { delay: block.delay })?;
        if block.max_tries < -1 {
            return Err(ConfigError::InvalidMaxTries {
                max_tries: block.max_tries,
            });
        }
        Ok(Self {
            delay,
            max_tries: RestartsRemaining::from_raw(block.max_tries),
        })
    }
}

impl From<RestartPolicy> for RestartBlock {
    fn from(policy: RestartPolicy) -> Self {
        Self {
            delay: policy.delay.as_secs_f64(),
            max_tries: policy.max_tries.raw(),
        }
    }
}

impl RestartPolicy {
    /// Parses an inline restart block; a blank block yields the defaults.
    pub fn from_block(block: &str) -> Result<Self, ConfigError> {
        if block.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RestartBlock = toml::from_str(block).map_err(|e| ConfigError::Malformed {
            what: "restart policy",
            detail: e.message().to_string(),
        })?;
        Self::try_from(raw)
    }

    /// Parses an optional block, falling back to `default` when absent.
    pub fn from_optional_block(block: Option<&str>, default: RestartPolicy) -> Result<Self, ConfigError> {
        match block {
            Some(text) if !text.trim().is_empty() => Self::from_block(text),
            _ => Ok(default),
        }
    }

    /// Renders the policy back into block form.
    pub fn to_block(&self) -> Result<String, ConfigError> {
        toml::to_string(&RestartBlock::from(*self)).map_err(|e| ConfigError::Malformed {
            what: "restart policy",
            detail: e.to_string(),
        })
    }

    /// True when `max_tries` is unlimited.
    pub fn is_unlimited(&self) -> bool {
        self.max_tries.is_unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_round_trips_effective_parameters() {
        let policy = RestartPolicy::from_block("delay = 2.5\nmaxTries = 5").unwrap();
        assert_eq!(policy.delay, Duration::from_secs_f64(2.5));
        assert_eq!(policy.max_tries.raw(), 5);

        let rendered = policy.to_block().unwrap();
        let reparsed = RestartPolicy::from_block(&rendered).unwrap();
        assert_eq!(reparsed, policy);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let policy = RestartPolicy::from_block("maxTries = 3").unwrap();
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(policy.max_tries, RestartsRemaining::count(3));

        let policy = RestartPolicy::from_block("delay = 0.25").unwrap();
        assert!(policy.is_unlimited());
    }

    #[test]
    fn integer_delay_is_accepted() {
        let policy = RestartPolicy::from_block("delay = 2").unwrap();
        assert_eq!(policy.delay, Duration::from_secs(2));
    }

    #[test]
    fn malformed_markup_is_rejected() {
        let err = RestartPolicy::from_block("delay = = 2").unwrap_err();
        assert_eq!(err.as_label(), "config_malformed");

        let err = RestartPolicy::from_block("delay = \"soon\"").unwrap_err();
        assert_eq!(err.as_label(), "config_malformed");

        let err = RestartPolicy::from_block("retries = 3").unwrap_err();
        assert_eq!(err.as_label(), "config_malformed");
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert_eq!(
            RestartPolicy::from_block("delay = -1.0").unwrap_err(),
            ConfigError::InvalidDelay { delay: -1.0 }
        );
        assert_eq!(
            RestartPolicy::from_block("maxTries = -2").unwrap_err(),
            ConfigError::InvalidMaxTries { max_tries: -2 }
        );
        assert!(RestartPolicy::from_block("delay = nan").is_err());
        assert_eq!(
            RestartPolicy::from_block("delay = 1e30").unwrap_err(),
            ConfigError::InvalidDelay { delay: 1e30 }
        );
    }

    #[test]
    fn absent_block_uses_given_default() {
        let fallback = RestartPolicy {
            delay: Duration::from_secs(4),
            max_tries: RestartsRemaining::count(1),
        };
        assert_eq!(RestartPolicy::from_optional_block(None, fallback).unwrap(), fallback);
        assert_eq!(RestartPolicy::from_optional_block(Some("  "), fallback).unwrap(), fallback);
    }
}
