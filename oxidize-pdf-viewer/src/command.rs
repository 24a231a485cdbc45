//! Typed navigation/zoom commands and the bus that broadcasts them.

use tokio::sync::broadcast;

use crate::config::DEFAULT_COMMAND_CAPACITY;
use crate::registry::{InstanceId, InstanceRegistry};
use crate::zoom::ZoomSpec;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    NextPage,
    PrevPage,
    GotoPage(u32),
    ChangeZoom(ZoomSpec),
}

/// A command plus the instance it is meant for.
///
/// `target == None` is the legacy unaddressed form every instance accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: Option<InstanceId>,
    pub command: Command,
}

impl Envelope {
    pub fn is_for(&self, id: &InstanceId) -> bool {
        self.target.as_ref().map_or(true, |target| target == id)
    }
}

/// Broadcast channel shared by all instances of one embedding application.
#[derive(Debug, Clone)]
pub struct CommandBus {
    sender: broadcast::Sender<Envelope>,
    registry: InstanceRegistry,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_CAPACITY)
    }
}

impl CommandBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            registry: InstanceRegistry::new(),
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    /// Deliver `command` to every live instance; those whose id differs from
    /// `target` ignore it. Returns the number of instances reached.
    pub fn broadcast(&self, command: Command, target: Option<&InstanceId>) -> usize {
        let envelope = Envelope {
            target: target.cloned(),
            command,
        };
        match self.sender.send(envelope) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(?command, "No live viewer instance to receive command");
                0
            }
        }
    }

    /// Unaddressed next page. Only well defined with a single live instance.
    pub fn next_page(&self) -> usize {
        self.warn_if_ambiguous("next_page");
        self.broadcast(Command::NextPage, None)
    }

    /// Unaddressed previous page. Only well defined with a single live instance.
    pub fn prev_page(&self) -> usize {
        self.warn_if_ambiguous("prev_page");
        self.broadcast(Command::PrevPage, None)
    }

    /// Commands addressed to the instance registered as `id`.
    pub fn instance(&self, id: impl Into<InstanceId>) -> InstanceCommands {
        InstanceCommands {
            id: id.into(),
            bus: self.clone(),
        }
    }

    fn warn_if_ambiguous(&self, operation: &str) {
        let live = self.registry.len();
        if live > 1 {
            tracing::warn!(
                operation,
                live,
                "Unaddressed command reaches every viewer instance; address it by id instead"
            );
        }
    }
}

/// Per-instance command surface.
#[derive(Debug, Clone)]
pub struct InstanceCommands {
    id: InstanceId,
    bus: CommandBus,
}

impl InstanceCommands {
    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn prev_page(&self) -> usize {
        self.bus.broadcast(Command::PrevPage, Some(&self.id))
    }

    pub fn next_page(&self) -> usize {
        self.bus.broadcast(Command::NextPage, Some(&self.id))
    }

    pub fn goto_page(&self, page: u32) -> usize {
        self.bus.broadcast(Command::GotoPage(page), Some(&self.id))
    }

    pub fn change_zoom(&self, zoom: impl Into<ZoomSpec>) -> usize {
        self.bus
            .broadcast(Command::ChangeZoom(zoom.into()), Some(&self.id))
    }
}
