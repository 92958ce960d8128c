//! Table of known apps: definition plus live state, keyed by [`AppId`].

use std::collections::HashMap;

use crate::app::{AppDef, AppId, AppStateHandle};

struct Entry {
    def: AppDef,
    state: AppStateHandle,
}

/// Apps known to the scheduler.
///
/// The state handle stays the same record for the lifetime of the entry, so
/// restarters and process watchers created at different times agree on it.
#[derive(Default)]
pub struct AppRegistry {
    apps: HashMap<AppId, Entry>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or redefines) an app and returns its state handle.
    ///
    /// Redefining keeps the existing state record.
    pub fn register(&mut self, def: AppDef) -> AppStateHandle {
        match self.apps.get_mut(&def.id) {
            Some(entry) => {
                entry.def = def;
                entry.state.clone()
            }
            None => {
                let state = AppStateHandle::default();
                self.apps.insert(
                    def.id.clone(),
                    Entry {
                        def,
                        state: state.clone(),
                    },
                );
                state
            }
        }
    }

    pub fn state(&self, id: &AppId) -> Option<AppStateHandle> {
        self.apps.get(id).map(|e| e.state.clone())
    }

    pub fn def(&self, id: &AppId) -> Option<&AppDef> {
        self.apps.get(id).map(|e| &e.def)
    }

    /// Forgets an app. Returns `false` if it was unknown.
    pub fn remove_app(&mut self, id: &AppId) -> bool {
        self.apps.remove(id).is_some()
    }

    pub fn contains(&self, id: &AppId) -> bool {
        self.apps.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &AppId> {
        self.apps.keys()
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
