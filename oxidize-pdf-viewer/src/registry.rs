//! Instance identifiers and the registry routing commands to live instances.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::command::Command;
use crate::error::{Result, ViewerError};
use crate::instance::{Control, ViewSnapshot};

/// Identifier distinguishing instances that share one command bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(Arc<str>);

impl InstanceId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// A fresh identifier for embedders that do not name their instances.
    pub fn generate() -> Self {
        Self::new(format!("viewer-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Handle to a spawned instance.
///
/// Requests are queued to the instance task and applied in order.
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    id: InstanceId,
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ViewSnapshot>,
}

impl ViewerHandle {
    pub(crate) fn new(
        id: InstanceId,
        control: mpsc::UnboundedSender<Control>,
        state: watch::Receiver<ViewSnapshot>,
    ) -> Self {
        Self { id, control, state }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    /// Replace the displayed document.
    pub fn set_source(&self, locator: impl Into<String>) -> Result<()> {
        self.control(Control::SetSource(locator.into()))
    }

    /// Report a new container width for fit-width zoom.
    pub fn resize(&self, available_width: f32) -> Result<()> {
        self.control(Control::Resize(available_width))
    }

    /// Deliver `command` to this instance only, bypassing the bus.
    pub fn send(&self, command: Command) -> Result<()> {
        self.control(Control::Command(command))
    }

    pub fn dispose(&self) -> Result<()> {
        self.control(Control::Dispose)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> ViewSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&ViewSnapshot) -> bool,
    ) -> Result<ViewSnapshot> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| ViewerError::Disposed(self.id.clone()))?;
        Ok(snapshot.clone())
    }

    fn control(&self, message: Control) -> Result<()> {
        self.control
            .send(message)
            .map_err(|_| ViewerError::Disposed(self.id.clone()))
    }
}

/// Maps instance ids to live instances.
///
/// Instances register when spawned and deregister when disposed.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: Arc<RwLock<HashMap<InstanceId, ViewerHandle>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: ViewerHandle) -> Result<()> {
        let mut instances = self
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if instances.contains_key(handle.id()) {
            return Err(ViewerError::DuplicateInstance(handle.id().clone()));
        }
        tracing::debug!(instance = %handle.id(), "Registered viewer instance");
        instances.insert(handle.id().clone(), handle);
        Ok(())
    }

    pub fn deregister(&self, id: &InstanceId) -> Option<ViewerHandle> {
        let removed = self
            .instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            tracing::debug!(instance = %id, "Deregistered viewer instance");
        }
        removed
    }

    pub fn get(&self, id: &InstanceId) -> Option<ViewerHandle> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<_> = self
            .instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Route `command` straight to the instance registered as `id`.
    pub fn send(&self, id: &InstanceId, command: Command) -> Result<()> {
        self.get(id)
            .ok_or_else(|| ViewerError::UnknownInstance(id.clone()))?
            .send(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Phase;
    use crate::viewport::ViewState;

    fn detached_handle(id: &str) -> (ViewerHandle, mpsc::UnboundedReceiver<Control>) {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (_, state) = watch::channel(ViewSnapshot {
            phase: Phase::Empty,
            view: ViewState::new(1.5),
            locator: None,
        });
        (ViewerHandle::new(id.into(), control, state), control_rx)
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("viewer-"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = InstanceRegistry::new();
        let (first, _rx1) = detached_handle("left");
        let (second, _rx2) = detached_handle("left");

        registry.register(first).unwrap();
        assert_eq!(
            registry.register(second),
            Err(ViewerError::DuplicateInstance("left".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn send_routes_to_the_named_instance() {
        let registry = InstanceRegistry::new();
        let (left, mut left_rx) = detached_handle("left");
        let (right, mut right_rx) = detached_handle("right");
        registry.register(left).unwrap();
        registry.register(right).unwrap();

        registry
            .send(&"right".into(), Command::GotoPage(4))
            .unwrap();

        assert!(left_rx.try_recv().is_err());
        assert!(matches!(
            right_rx.try_recv(),
            Ok(Control::Command(Command::GotoPage(4)))
        ));
    }

    #[test]
    fn unknown_and_deregistered_ids_fail() {
        let registry = InstanceRegistry::new();
        let (left, _rx) = detached_handle("left");
        registry.register(left).unwrap();

        assert!(registry.deregister(&"left".into()).is_some());
        assert!(registry.is_empty());
        assert_eq!(
            registry.send(&"left".into(), Command::NextPage),
            Err(ViewerError::UnknownInstance("left".into()))
        );
    }

    #[test]
    fn closed_instance_reports_disposed() {
        let (handle, rx) = detached_handle("gone");
        drop(rx);
        assert_eq!(
            handle.set_source("a.pdf"),
            Err(ViewerError::Disposed("gone".into()))
        );
    }
}
