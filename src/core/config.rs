//! # Scheduler configuration.
//!
//! Provides [`SchedulerConfig`], loaded from TOML. Every field has a default,
//! so a missing file or a partial one is fine:
//! ```toml
//! tick_period_ms = 100
//! bus_capacity = 1024
//! offline_after_ms = 3000
//!
//! [default_restart]
//! delay = 1.0
//! maxTries = -1
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policies::RestartPolicy;

/// Settings of the scheduling loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period of one tick of every automaton. Must be `> 0`.
    pub tick_period_ms: u64,
    /// Capacity of the event bus and of the message wire (min 1; clamped).
    pub bus_capacity: usize,
    /// Remote app records older than this are shown as offline.
    pub offline_after_ms: u64,
    /// Restart policy for apps whose definition has no restart block.
    pub default_restart: RestartPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 100,
            bus_capacity: 1024,
            offline_after_ms: 3000,
            default_restart: RestartPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_period_ms",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    #[inline]
    pub fn offline_after(&self) -> Duration {
        Duration::from_millis(self.offline_after_ms)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

/// Loads the scheduler config from a TOML file.
///
/// A missing file yields [`SchedulerConfig::default`].
pub fn load_config(path: &Path) -> Result<SchedulerConfig> {
    if !path.exists() {
        let cfg = SchedulerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SchedulerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RestartsRemaining;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, SchedulerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("scheduler.toml");
        fs::write(
            &path,
            "tick_period_ms = 250\n\n[default_restart]\ndelay = 0.5\nmaxTries = 4\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.tick_period(), Duration::from_millis(250));
        assert_eq!(cfg.bus_capacity, 1024);
        assert_eq!(cfg.default_restart.delay, Duration::from_millis(500));
        assert_eq!(cfg.default_restart.max_tries, RestartsRemaining::count(4));
    }

    #[test]
    fn zero_tick_period_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("scheduler.toml");
        fs::write(&path, "tick_period_ms = 0\n").expect("write");

        let err = load_config(&path).expect_err("zero period");
        let cause = err.downcast_ref::<ConfigError>().expect("config error");
        assert_eq!(cause.as_label(), "config_invalid");
    }

    #[test]
    fn invalid_restart_block_fails_parse() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("scheduler.toml");
        fs::write(&path, "[default_restart]\nmaxTries = -5\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = SchedulerConfig {
            bus_capacity: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
