use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use iced::widget::image::Handle;
use oxidize_pdf_viewer::{
    DrawingSurface, InstanceCommands, ProgressEvent, RasterFrame, ViewerEventKind, ViewerHandle,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct SurfaceState {
    container_width: f32,
    size: (u32, u32),
    frame: Option<Handle>,
}

/// Drawing surface shared between a viewer instance and the iced view.
///
/// The instance paints from its own task; the view picks up the latest
/// image handle on the next redraw.
#[derive(Clone, Default)]
pub struct PaneSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl PaneSurface {
    pub fn new(container_width: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                container_width,
                ..SurfaceState::default()
            })),
        }
    }

    pub fn frame(&self) -> Option<Handle> {
        lock(&self.state).frame.clone()
    }

    pub fn size(&self) -> (u32, u32) {
        lock(&self.state).size
    }
}

impl DrawingSurface for PaneSurface {
    fn container_width(&self) -> f32 {
        lock(&self.state).container_width
    }

    fn set_container_width(&mut self, width: f32) {
        lock(&self.state).container_width = width;
    }

    fn resize(&mut self, width: u32, height: u32) {
        lock(&self.state).size = (width, height);
    }

    fn paint(&mut self, frame: &RasterFrame) {
        let (width, height) = frame.pixel_size();
        let handle = Handle::from_rgba(width, height, frame.image.as_raw().clone());
        lock(&self.state).frame = Some(handle);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaneStatus {
    Idle,
    Loading { loaded: u64, total: u64 },
    Ready { page: u32, total: u32 },
    Failed(String),
}

impl PaneStatus {
    pub fn line(&self) -> String {
        match self {
            Self::Idle => "No document".to_string(),
            Self::Loading { loaded, total } if *total > 0 => {
                format!("Loading... {}%", loaded.saturating_mul(100) / total)
            }
            Self::Loading { .. } => "Loading...".to_string(),
            Self::Ready { page, total } => format!("Page {page} of {total}"),
            Self::Failed(message) => message.clone(),
        }
    }
}

/// One viewer instance plus the UI state around it.
pub struct Pane {
    pub title: String,
    pub handle: ViewerHandle,
    pub commands: InstanceCommands,
    pub surface: PaneSurface,
    pub status: PaneStatus,
    pub page_input: String,
}

impl Pane {
    pub fn new(
        title: String,
        handle: ViewerHandle,
        commands: InstanceCommands,
        surface: PaneSurface,
    ) -> Self {
        Self {
            title,
            handle,
            commands,
            surface,
            status: PaneStatus::Idle,
            page_input: String::new(),
        }
    }

    pub fn apply(&mut self, event: ViewerEventKind) {
        self.status = match event {
            ViewerEventKind::Progress(ProgressEvent::Loading { loaded, total }) => {
                PaneStatus::Loading { loaded, total }
            }
            ViewerEventKind::Progress(ProgressEvent::Finished | ProgressEvent::Error) => return,
            ViewerEventKind::PageLoaded(loaded) => PaneStatus::Ready {
                page: loaded.page,
                total: loaded.total,
            },
            ViewerEventKind::LoadFailed { message } => PaneStatus::Failed(message),
            ViewerEventKind::RenderFailed { page, error, .. } => {
                PaneStatus::Failed(format!("Page {page} could not be rendered: {error}"))
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines() {
        assert_eq!(PaneStatus::Idle.line(), "No document");
        assert_eq!(
            PaneStatus::Loading {
                loaded: 512,
                total: 2048
            }
            .line(),
            "Loading... 25%"
        );
        assert_eq!(PaneStatus::Loading { loaded: 0, total: 0 }.line(), "Loading...");
        assert_eq!(PaneStatus::Ready { page: 3, total: 9 }.line(), "Page 3 of 9");
    }

    #[test]
    fn surface_keeps_latest_frame() {
        let mut surface = PaneSurface::new(640.0);
        assert_eq!(surface.container_width(), 640.0);
        assert!(surface.frame().is_none());

        let frame = RasterFrame::new(1, 1.0, 4.0, 2.0, image::RgbaImage::new(4, 2));
        surface.resize(4, 2);
        surface.paint(&frame);

        assert_eq!(surface.size(), (4, 2));
        assert!(surface.frame().is_some());
    }

    #[test]
    fn clones_share_the_container_width() {
        let shown = PaneSurface::new(640.0);
        let mut owned = shown.clone();
        owned.set_container_width(900.0);
        assert_eq!(shown.container_width(), 900.0);
    }
}
