//! Services shared by every controller, worker host and script factory.

use std::fmt;
use std::sync::Arc;

use crate::error::ScriptError;
use crate::events::Bus;
use crate::protocol::MessageBus;
use crate::tasks::{Script, ScriptFactory, ScriptRequest};

/// Handle to the master-side runtime services.
///
/// Cheap to clone; clones share the factory, the wire and the event bus.
#[derive(Clone)]
pub struct Master {
    factory: Arc<dyn ScriptFactory>,
    wire: MessageBus,
    bus: Bus,
}

impl Master {
    /// Master with a fresh wire and event bus.
    pub fn new(factory: Arc<dyn ScriptFactory>) -> Self {
        Self {
            factory,
            wire: MessageBus::default(),
            bus: Bus::default(),
        }
    }

    pub fn with_wire(mut self, wire: MessageBus) -> Self {
        self.wire = wire;
        self
    }

    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    pub fn factory(&self) -> &Arc<dyn ScriptFactory> {
        &self.factory
    }

    /// Transport for protocol messages.
    pub fn wire(&self) -> &MessageBus {
        &self.wire
    }

    /// Runtime event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Asks the factory for a fresh, uninitialized script.
    pub fn create_script(&self, req: &ScriptRequest) -> Result<Box<dyn Script>, ScriptError> {
        self.factory.create(req, self)
    }
}

impl fmt::Debug for Master {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Master")
            .field("wire", &self.wire)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
