//! # Live app status record.
//!
//! [`AppState`] is written by two logical owners: the process watcher
//! (started/running/exit code/...) and the [`AppRestarter`](crate::AppRestarter)
//! (restarting/restarts remaining). Both reach it through an [`AppStateHandle`],
//! which serializes every read and mutation behind one lock, so per-app
//! supervision can be moved off the scheduler thread without changing callers.
//!
//! ## Rules
//! - Every write to a lifecycle flag (and to the plan name) refreshes `last_change`.
//! - Gauges (`cpu`, `gpu`, `memory`), `exit_code` and `restarts_remaining` do not.
//! - `restarts_remaining` survives across restart episodes.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remaining restart budget of one app.
///
/// Stored and transmitted as a plain integer. Two values are reserved:
/// [`RestartsRemaining::UNLIMITED`] (`-1`) and
/// [`RestartsRemaining::UNINITIALIZED`] (`-2`, seeded from the app's
/// `maxTries` by the first restarter). Any other value is a literal count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestartsRemaining(i32);

impl RestartsRemaining {
    /// Keep restarting forever.
    pub const UNLIMITED: Self = Self(-1);
    /// Not yet seeded; the first restarter replaces it with the configured `maxTries`.
    pub const UNINITIALIZED: Self = Self(-2);

    /// Wraps a raw wire value.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Literal remaining count, saturating at `i32::MAX`.
    pub const fn count(n: u32) -> Self {
        if n > i32::MAX as u32 {
            Self(i32::MAX)
        } else {
            Self(n as i32)
        }
    }

    /// Raw wire value.
    pub const fn raw(self) -> i32 {
        self.0
    }

    pub fn is_unlimited(self) -> bool {
        self == Self::UNLIMITED
    }

    pub fn is_uninitialized(self) -> bool {
        self == Self::UNINITIALIZED
    }

    /// True when a literal count of zero is left.
    pub fn is_exhausted(self) -> bool {
        self.0 == 0
    }

    /// Remaining tries as a number, `None` for the sentinels.
    pub fn remaining(self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl Default for RestartsRemaining {
    fn default() -> Self {
        Self::UNINITIALIZED
    }
}

impl fmt::Display for RestartsRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNLIMITED => f.write_str("unlimited"),
            Self::UNINITIALIZED => f.write_str("uninitialized"),
            Self(n) => write!(f, "{n}"),
        }
    }
}

/// Status of one app instance, shared among all fleet participants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    started: bool,
    start_failed: bool,
    running: bool,
    killed: bool,
    dying: bool,
    restarting: bool,
    initialized: bool,
    plan_applied: bool,
    disabled: bool,
    exit_code: i32,
    last_change: DateTime<Utc>,
    cpu: i32,
    gpu: i32,
    memory: i32,
    restarts_remaining: RestartsRemaining,
    plan_name: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            started: false,
            start_failed: false,
            running: false,
            killed: false,
            dying: false,
            restarting: false,
            initialized: false,
            plan_applied: false,
            disabled: false,
            exit_code: 0,
            last_change: Utc::now(),
            cpu: 0,
            gpu: 0,
            memory: 0,
            restarts_remaining: RestartsRemaining::UNINITIALIZED,
            plan_name: String::new(),
        }
    }
}

macro_rules! lifecycle_flag {
    ($(#[$doc:meta])* $field:ident, $setter:ident) => {
        $(#[$doc])*
        pub fn $field(&self) -> bool {
            self.$field
        }

        #[doc = concat!("Sets `", stringify!($field), "` and refreshes `last_change`.")]
        pub fn $setter(&mut self, value: bool) {
            self.$field = value;
            self.touch();
        }
    };
}

impl AppState {
    /// Fresh record: nothing started, restart budget uninitialized.
    pub fn new() -> Self {
        Self::default()
    }

    lifecycle_flag!(
        /// Process was launched successfully.
        started, set_started
    );
    lifecycle_flag!(
        /// Process was launched but failed to start.
        start_failed, set_start_failed
    );
    lifecycle_flag!(
        /// Process is currently running.
        running, set_running
    );
    lifecycle_flag!(
        /// Forced to terminate by an explicit kill request.
        killed, set_killed
    );
    lifecycle_flag!(
        /// Still dying after a termination request.
        dying, set_dying
    );
    lifecycle_flag!(
        /// A restart episode is in progress.
        restarting, set_restarting
    );
    lifecycle_flag!(
        /// Process init condition satisfied.
        initialized, set_initialized
    );
    lifecycle_flag!(
        /// Already processed by the launch plan.
        plan_applied, set_plan_applied
    );
    lifecycle_flag!(
        /// Disabled from execution as part of the plan.
        disabled, set_disabled
    );

    /// Exit code; meaningful only when [`AppState::exit_code_valid`].
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn set_exit_code(&mut self, code: i32) {
        self.exit_code = code;
    }

    /// `started && !running && !killed`.
    pub fn exit_code_valid(&self) -> bool {
        self.started && !self.running && !self.killed
    }

    /// Time of the last lifecycle change.
    pub fn last_change(&self) -> DateTime<Utc> {
        self.last_change
    }

    pub fn set_last_change(&mut self, at: DateTime<Utc>) {
        self.last_change = at;
    }

    pub fn cpu(&self) -> i32 {
        self.cpu
    }

    pub fn set_cpu(&mut self, percent: i32) {
        self.cpu = percent;
    }

    pub fn gpu(&self) -> i32 {
        self.gpu
    }

    pub fn set_gpu(&mut self, percent: i32) {
        self.gpu = percent;
    }

    /// Allocated memory in MiB.
    pub fn memory(&self) -> i32 {
        self.memory
    }

    pub fn set_memory(&mut self, mib: i32) {
        self.memory = mib;
    }

    pub fn restarts_remaining(&self) -> RestartsRemaining {
        self.restarts_remaining
    }

    pub fn set_restarts_remaining(&mut self, value: RestartsRemaining) {
        self.restarts_remaining = value;
    }

    /// Plan in whose context the app was started.
    pub fn plan_name(&self) -> &str {
        &self.plan_name
    }

    pub fn set_plan_name(&mut self, name: impl Into<String>) {
        self.plan_name = name.into();
        self.touch();
    }

    /// Renders the one-line status shown to operators.
    ///
    /// Remote records older than `offline_after` get an `(Offline for N sec)` suffix.
    pub fn status_code(&self, now: DateTime<Utc>, is_remote: bool, offline_after: Duration) -> String {
        let mut code = if self.started {
            if self.running {
                if self.dying {
                    "Dying".to_string()
                } else if !self.initialized {
                    "Initializing".to_string()
                } else {
                    "Running".to_string()
                }
            } else if self.restarting {
                match self.restarts_remaining.remaining() {
                    Some(n) => format!("Restarting ({n} remaining)"),
                    None => "Restarting".to_string(),
                }
            } else if self.killed {
                "Killed".to_string()
            } else {
                format!("Terminated ({})", self.exit_code)
            }
        } else if self.start_failed {
            "Failed to start".to_string()
        } else {
            "Not running".to_string()
        };

        if is_remote {
            let age = (now - self.last_change).to_std().unwrap_or_default();
            if age > offline_after {
                code.push_str(&format!(" (Offline for {} sec)", age.as_secs()));
            }
        }
        code
    }

    fn touch(&mut self) {
        self.last_change = Utc::now();
    }
}

/// Shared handle to one app's live [`AppState`].
///
/// Cloning is cheap; all clones refer to the same record. Each call to
/// [`read`](Self::read) or [`update`](Self::update) holds the lock only for the
/// duration of the closure.
#[derive(Clone, Debug, Default)]
pub struct AppStateHandle {
    inner: Arc<Mutex<AppState>>,
}

impl AppStateHandle {
    pub fn new(state: AppState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Runs `f` with shared access to the record.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Runs `f` with exclusive access to the record.
    pub fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> AppState {
        self.read(AppState::clone)
    }

    /// True if both handles point at the same record.
    pub fn same_record(&self, other: &AppStateHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_ago() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn lifecycle_writes_refresh_last_change() {
        let mut st = AppState::new();
        st.set_last_change(long_ago());
        st.set_running(true);
        assert!(st.last_change() > long_ago());

        st.set_last_change(long_ago());
        st.set_plan_name("plan1");
        assert!(st.last_change() > long_ago());
    }

    #[test]
    fn gauges_and_counters_leave_last_change_alone() {
        let mut st = AppState::new();
        st.set_last_change(long_ago());
        st.set_cpu(50);
        st.set_gpu(10);
        st.set_memory(512);
        st.set_exit_code(3);
        st.set_restarts_remaining(RestartsRemaining::count(4));
        assert_eq!(st.last_change(), long_ago());
    }

    #[test]
    fn restarts_remaining_sentinels_keep_wire_values() {
        assert_eq!(RestartsRemaining::UNLIMITED.raw(), -1);
        assert_eq!(RestartsRemaining::UNINITIALIZED.raw(), -2);
        assert_eq!(AppState::new().restarts_remaining(), RestartsRemaining::UNINITIALIZED);
        assert_eq!(serde_json::to_string(&RestartsRemaining::UNLIMITED).unwrap(), "-1");
        assert_eq!(RestartsRemaining::UNLIMITED.remaining(), None);
        assert_eq!(RestartsRemaining::count(3).remaining(), Some(3));
        assert_eq!(RestartsRemaining::count(u32::MAX).raw(), i32::MAX);
        assert!(!RestartsRemaining::count(u32::MAX).is_unlimited());
    }

    #[test]
    fn exit_code_valid_only_after_clean_exit() {
        let mut st = AppState::new();
        assert!(!st.exit_code_valid());
        st.set_started(true);
        st.set_running(true);
        assert!(!st.exit_code_valid());
        st.set_running(false);
        assert!(st.exit_code_valid());
        st.set_killed(true);
        assert!(!st.exit_code_valid());
    }

    #[test]
    fn status_code_covers_lifecycle() {
        let now = Utc::now();
        let grace = Duration::from_secs(3);
        let mut st = AppState::new();
        assert_eq!(st.status_code(now, false, grace), "Not running");

        st.set_start_failed(true);
        assert_eq!(st.status_code(now, false, grace), "Failed to start");

        st.set_started(true);
        st.set_running(true);
        assert_eq!(st.status_code(now, false, grace), "Initializing");
        st.set_initialized(true);
        assert_eq!(st.status_code(now, false, grace), "Running");
        st.set_dying(true);
        assert_eq!(st.status_code(now, false, grace), "Dying");

        st.set_running(false);
        st.set_exit_code(7);
        assert_eq!(st.status_code(now, false, grace), "Terminated (7)");

        st.set_restarting(true);
        st.set_restarts_remaining(RestartsRemaining::count(2));
        assert_eq!(st.status_code(now, false, grace), "Restarting (2 remaining)");
        st.set_restarts_remaining(RestartsRemaining::UNLIMITED);
        assert_eq!(st.status_code(now, false, grace), "Restarting");

        st.set_restarting(false);
        st.set_killed(true);
        assert_eq!(st.status_code(now, false, grace), "Killed");
    }

    #[test]
    fn stale_remote_record_is_marked_offline() {
        let mut st = AppState::new();
        st.set_last_change(Utc::now() - chrono::Duration::seconds(10));
        let code = st.status_code(Utc::now(), true, Duration::from_secs(3));
        assert!(code.starts_with("Not running (Offline for "), "{code}");

        let local = st.status_code(Utc::now(), false, Duration::from_secs(3));
        assert_eq!(local, "Not running");
    }

    #[test]
    fn handle_clones_share_the_record() {
        let a = AppStateHandle::default();
        let b = a.clone();
        b.update(|st| st.set_running(true));
        assert!(a.read(AppState::running));
        assert!(a.same_record(&b));
        assert!(!a.same_record(&AppStateHandle::default()));
    }
}
