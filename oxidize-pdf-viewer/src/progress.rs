//! Notifications sent from viewer instances to the embedding application.
//!
//! All notifications are fire-and-forget: instances push them into an
//! unbounded channel and never wait on the consumer.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::RenderError;
use crate::registry::InstanceId;

/// Progress of a document acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Loading { loaded: u64, total: u64 },
    Finished,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    Loading,
    Finished,
    Error,
}

/// Flat `{state, loaded, total}` record handed to embedders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadProgress {
    pub state: ProgressState,
    pub loaded: u64,
    pub total: u64,
}

impl From<ProgressEvent> for LoadProgress {
    fn from(event: ProgressEvent) -> Self {
        match event {
            ProgressEvent::Loading { loaded, total } => Self {
                state: ProgressState::Loading,
                loaded,
                total,
            },
            ProgressEvent::Finished => Self {
                state: ProgressState::Finished,
                loaded: 0,
                total: 0,
            },
            ProgressEvent::Error => Self {
                state: ProgressState::Error,
                loaded: 0,
                total: 0,
            },
        }
    }
}

/// Fired after every successful render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageLoaded {
    pub page: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEventKind {
    PageLoaded(PageLoaded),
    Progress(ProgressEvent),
    LoadFailed { message: String },
    RenderFailed {
        page: u32,
        scale: f32,
        error: RenderError,
    },
}

/// A notification tagged with the instance that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerEvent {
    pub instance: InstanceId,
    pub kind: ViewerEventKind,
}

pub type EventSender = mpsc::UnboundedSender<ViewerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ViewerEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
