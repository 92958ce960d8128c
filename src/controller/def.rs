//! Static definition of a distributed task.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Read-only definition of one distributed task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DTaskDef {
    /// Unique task id.
    pub id: String,
    /// Controller script to run on the master.
    pub script_name: String,
    /// Folder the script is looked up in first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_folder: Option<String>,
    /// Variables exposed to the scripts of every instance.
    #[serde(default, rename = "vars")]
    pub local_vars: HashMap<String, String>,
}

impl DTaskDef {
    pub fn new(id: impl Into<String>, script_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            script_name: script_name.into(),
            ..Self::default()
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.script_folder = Some(folder.into());
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.local_vars.insert(name.into(), value.into());
        self
    }

    /// Script environment for a new instance.
    pub fn resolved_vars(&self) -> HashMap<String, String> {
        self.local_vars.clone()
    }
}
