//! Compound app identity: one app on one machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identifies one app instance on one machine.
///
/// The text form is `machine.app`; the machine part never contains a dot,
/// everything after the first dot is the app name.
///
/// ```
/// use fleetvisor::AppId;
///
/// let id: AppId = "m1.web.api".parse().unwrap();
/// assert_eq!(id.machine(), "m1");
/// assert_eq!(id.app(), "web.api");
/// assert_eq!(id.to_string(), "m1.web.api");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId {
    machine: String,
    app: String,
}

impl AppId {
    /// Creates an identity from its two parts.
    pub fn new(machine: impl Into<String>, app: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            app: app.into(),
        }
    }

    /// Machine (agent) the app lives on.
    pub fn machine(&self) -> &str {
        &self.machine
    }

    /// App name, unique within its machine.
    pub fn app(&self) -> &str {
        &self.app
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.machine, self.app)
    }
}

impl FromStr for AppId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((machine, app)) if !machine.is_empty() && !app.is_empty() => {
                Ok(AppId::new(machine, app))
            }
            _ => Err(ConfigError::Invalid {
                field: "app id",
                reason: format!("'{s}' is not in machine.app form"),
            }),
        }
    }
}

impl TryFrom<String> for AppId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AppId> for String {
    fn from(id: AppId) -> Self {
        id.to_string()
    }
}
