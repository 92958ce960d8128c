//! Error types used by restarters, task controllers and scripts.
//!
//! This module defines four error enums:
//!
//! - [`ConfigError`]: malformed configuration, raised synchronously at construction/load time.
//! - [`ScriptError`]: failures raised by controller/worker scripts while they execute.
//! - [`LaunchError`]: failures reported by the process-launch capability.
//! - [`SchedulerError`]: failures of scheduler operations (wraps the first two).
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

/// # Configuration errors.
///
/// Raised when an inline restart-policy block or a scheduler configuration
/// cannot be parsed or fails validation. The object being constructed is never
/// created when one of these is returned.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The markup could not be parsed at all.
    #[error("malformed {what}: {detail}")]
    Malformed {
        /// What was being parsed (e.g. "restart policy").
        what: &'static str,
        /// Parser diagnostic.
        detail: String,
    },

    /// Restart delay is negative, NaN or infinite.
    #[error("invalid restart delay {delay}s: must be finite and >= 0")]
    InvalidDelay {
        /// The rejected delay in seconds.
        delay: f64,
    },

    /// `maxTries` below `-1` (values under `-1` are reserved sentinels).
    #[error("invalid maxTries {max_tries}: must be >= -1")]
    InvalidMaxTries {
        /// The rejected value.
        max_tries: i32,
    },

    /// A named field holds a value outside its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fleetvisor::ConfigError;
    ///
    /// let err = ConfigError::InvalidMaxTries { max_tries: -7 };
    /// assert_eq!(err.as_label(), "config_invalid_max_tries");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Malformed { .. } => "config_malformed",
            ConfigError::InvalidDelay { .. } => "config_invalid_delay",
            ConfigError::InvalidMaxTries { .. } => "config_invalid_max_tries",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ConfigError::Malformed { what, detail } => format!("malformed {what}: {detail}"),
            ConfigError::InvalidDelay { delay } => format!("delay={delay}"),
            ConfigError::InvalidMaxTries { max_tries } => format!("maxTries={max_tries}"),
            ConfigError::Invalid { field, reason } => format!("{field}: {reason}"),
        }
    }
}

/// # Errors produced by scripts.
///
/// Script errors are never caught or retried by the task controller; they
/// propagate to the scheduler, which tears the task down as if it had completed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Script logic failed.
    #[error("script failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The script body panicked.
    #[error("script panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },

    /// Script was cancelled by its owner.
    #[error("script cancelled")]
    Canceled,

    /// The factory does not know the requested script.
    #[error("unknown script '{name}'")]
    UnknownScript {
        /// Name that was looked up.
        name: String,
    },

    /// A controller was asked to start while it already holds a script.
    #[error("task '{id}' is already running")]
    AlreadyRunning {
        /// Definition id of the running task.
        id: String,
    },

    /// Async scripts need a tokio runtime to spawn onto.
    #[error("no tokio runtime available to host the script")]
    NoRuntime,
}

impl ScriptError {
    /// Convenience constructor for [`ScriptError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ScriptError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use fleetvisor::ScriptError;
    ///
    /// assert_eq!(ScriptError::fail("boom").as_label(), "script_failed");
    /// assert_eq!(ScriptError::Canceled.as_label(), "script_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ScriptError::Fail { .. } => "script_failed",
            ScriptError::Panicked { .. } => "script_panicked",
            ScriptError::Canceled => "script_canceled",
            ScriptError::UnknownScript { .. } => "script_unknown",
            ScriptError::AlreadyRunning { .. } => "task_already_running",
            ScriptError::NoRuntime => "script_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ScriptError::Fail { error } => format!("error: {error}"),
            ScriptError::Panicked { info } => format!("panic: {info}"),
            ScriptError::Canceled => "cancelled".to_string(),
            ScriptError::UnknownScript { name } => format!("unknown script: {name}"),
            ScriptError::AlreadyRunning { id } => format!("already running: {id}"),
            ScriptError::NoRuntime => "no tokio runtime".to_string(),
        }
    }
}

/// # Errors reported by an [`AppLauncher`](crate::AppLauncher).
///
/// A failed relaunch never changes the restarter's outcome: the episode still
/// ends and the automaton still deactivates.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// The app identity is not known to the launcher.
    #[error("unknown app '{app}'")]
    UnknownApp {
        /// App identity in `machine.app` form.
        app: String,
    },

    /// The process could not be spawned.
    #[error("spawn failed for '{app}': {reason}")]
    SpawnFailed {
        /// App identity in `machine.app` form.
        app: String,
        /// OS or launcher diagnostic.
        reason: String,
    },
}

impl LaunchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LaunchError::UnknownApp { .. } => "launch_unknown_app",
            LaunchError::SpawnFailed { .. } => "launch_spawn_failed",
        }
    }
}

/// # Errors returned by [`Scheduler`](crate::Scheduler) operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// The app was never registered.
    #[error("unknown app '{app}'")]
    UnknownApp {
        /// App identity in `machine.app` form.
        app: String,
    },

    /// Restart policy or scheduler config rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The task's controller script could not be started.
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::UnknownApp { .. } => "scheduler_unknown_app",
            SchedulerError::Config(e) => e.as_label(),
            SchedulerError::Script(e) => e.as_label(),
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(
            ConfigError::Malformed {
                what: "restart policy",
                detail: "x".into()
            }
            .as_label(),
            "config_malformed"
        );
        assert_eq!(
            ScriptError::AlreadyRunning { id: "t".into() }.as_label(),
            "task_already_running"
        );
        assert_eq!(
            LaunchError::UnknownApp { app: "m1.a".into() }.as_label(),
            "launch_unknown_app"
        );
    }

    #[test]
    fn scheduler_error_forwards_labels() {
        let err = SchedulerError::from(ScriptError::NoRuntime);
        assert_eq!(err.as_label(), "script_no_runtime");
        assert_eq!(err.to_string(), ScriptError::NoRuntime.to_string());
    }

    #[test]
    fn display_includes_details() {
        let err = ConfigError::InvalidDelay { delay: -1.0 };
        assert!(err.to_string().contains("-1"));

        let err = ScriptError::UnknownScript {
            name: "gather".into(),
        };
        assert_eq!(err.to_string(), "unknown script 'gather'");
    }
}
