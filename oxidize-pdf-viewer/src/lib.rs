//! Single-page document viewer core.
//!
//! Each [`ViewerInstance`] shows one page of one document on its own
//! [`DrawingSurface`], rendering through an external [`RasterService`].
//! Instances share a [`CommandBus`]; commands carry an [`InstanceId`] and
//! every instance ignores commands addressed to someone else.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use oxidize_pdf_viewer::*;
//! # async fn demo<L, R, S>(loader: Arc<L>, raster: Arc<R>, surface: S) -> Result<()>
//! # where L: DocumentLoader, R: RasterService<L::Doc>, S: DrawingSurface {
//! let bus = CommandBus::default();
//! let (events, _notifications) = event_channel();
//! let instance = ViewerInstance::new(
//!     "left".into(),
//!     ViewerConfig::default(),
//!     loader,
//!     raster,
//!     surface,
//!     events,
//! )?;
//! let handle = instance.spawn(&bus)?;
//! handle.set_source("manual.pdf")?;
//! bus.instance("left").goto_page(3);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod document;
pub mod error;
pub mod instance;
pub mod progress;
pub mod registry;
pub mod renderer;
pub mod surface;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod viewport;
pub mod zoom;

pub use command::{Command, CommandBus, Envelope, InstanceCommands};
pub use config::ViewerConfig;
pub use document::{Document, DocumentHandle, DocumentLoader, ProgressReporter};
pub use error::{LoadError, RenderError, Result, ViewerError};
pub use instance::{Phase, RenderRequest, ViewSnapshot, ViewerInstance};
pub use progress::{
    event_channel, EventReceiver, EventSender, LoadProgress, PageLoaded, ProgressEvent,
    ProgressState, ViewerEvent, ViewerEventKind,
};
pub use registry::{InstanceId, InstanceRegistry, ViewerHandle};
pub use renderer::{RasterFrame, RasterService};
pub use surface::DrawingSurface;
pub use viewport::ViewState;
pub use zoom::ZoomSpec;
