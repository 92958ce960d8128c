//! # Script creation.
//!
//! [`ScriptFactory`] turns a [`ScriptRequest`] into a fresh, uninitialized
//! [`Script`]. [`ScriptRegistry`] is the stock factory: a name → constructor
//! table, with helpers to register async [`Routine`]s.
//!
//! ## Lookup
//! With a `folder`, `"{folder}/{name}"` is tried before the bare `name`. The
//! `source` override is passed through untouched for factories that compile
//! scripts; the registry itself ignores it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::Master;
use crate::error::ScriptError;
use crate::protocol::{ControllerToken, TaskInstanceId};
use crate::tasks::{AsyncScript, RoutineRef, Script, ScriptContext};

/// Which side of the task protocol a script runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptRole {
    /// Master side, owned by a `DTaskController`.
    Controller,
    /// Agent side, owned by a `WorkerHost`.
    Worker,
}

/// Everything a factory needs to build one script instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptRequest {
    pub controller: ControllerToken,
    pub task: TaskInstanceId,
    pub role: ScriptRole,
    /// Id of the task definition (or of the worker script on agents).
    pub id: String,
    /// Script name to resolve.
    pub name: String,
    pub folder: Option<String>,
    /// Script source overriding the named one.
    pub source: Option<String>,
    pub args: Option<String>,
    /// Resolved local variables.
    pub vars: HashMap<String, String>,
    /// Hosting agent, for worker scripts.
    pub agent: Option<String>,
}

impl ScriptRequest {
    /// Request whose id and name are both `name`.
    pub fn new(
        controller: ControllerToken,
        task: TaskInstanceId,
        role: ScriptRole,
        name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            controller,
            task,
            role,
            id: name.clone(),
            name,
            folder: None,
            source: None,
            args: None,
            vars: HashMap::new(),
            agent: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_folder(mut self, folder: Option<String>) -> Self {
        self.folder = folder;
        self
    }

    pub fn with_args(mut self, args: Option<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Creates fresh, uninitialized scripts.
pub trait ScriptFactory: Send + Sync + 'static {
    fn create(&self, req: &ScriptRequest, master: &Master) -> Result<Box<dyn Script>, ScriptError>;
}

type Constructor =
    Arc<dyn Fn(&ScriptRequest, &Master) -> Result<Box<dyn Script>, ScriptError> + Send + Sync>;

/// Name → constructor table.
#[derive(Clone, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, Constructor>,
}

impl ScriptRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in `gather` and `report` scripts.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        crate::tasks::builtin::register(&mut reg);
        reg
    }

    /// Registers a constructor, replacing any previous one under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn(&ScriptRequest, &Master) -> Result<Box<dyn Script>, ScriptError> + Send + Sync + 'static,
    {
        self.scripts.insert(name.into(), Arc::new(ctor));
        self
    }

    /// Registers a routine; each request gets its own [`AsyncScript`] running it.
    pub fn register_routine(&mut self, name: impl Into<String>, routine: RoutineRef) -> &mut Self {
        self.register(name, move |req, master| {
            let ctx = ScriptContext::new(req, master.wire().clone());
            let script = AsyncScript::new(Arc::clone(&routine), ctx)?;
            Ok(Box::new(script) as Box<dyn Script>)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scripts.keys().map(String::as_str)
    }

    fn lookup(&self, req: &ScriptRequest) -> Option<&Constructor> {
        req.folder
            .as_deref()
            .and_then(|folder| self.scripts.get(&format!("{folder}/{}", req.name)))
            .or_else(|| self.scripts.get(&req.name))
    }
}

impl ScriptFactory for ScriptRegistry {
    fn create(&self, req: &ScriptRequest, master: &Master) -> Result<Box<dyn Script>, ScriptError> {
        let ctor = self.lookup(req).ok_or_else(|| ScriptError::UnknownScript {
            name: req.name.clone(),
        })?;
        ctor(req, master)
    }
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ScriptRegistry").field("scripts", &names).finish()
    }
}
