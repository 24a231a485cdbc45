//! The per-view state machine.
//!
//! A `ViewerInstance` owns one document, its `ViewState` and its drawing
//! surface. Loads and renders run as separate tasks and report back through
//! a completion channel; every completion carries the generation it was
//! issued under and is dropped if a newer request superseded it. That keeps
//! a slow, stale render from ever painting over a fresher page.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandBus, Envelope};
use crate::config::ViewerConfig;
use crate::document::{DocumentHandle, DocumentLoader, ProgressReporter};
use crate::error::{LoadError, RenderError, Result};
use crate::progress::{EventSender, PageLoaded, ProgressEvent, ViewerEvent, ViewerEventKind};
use crate::registry::{InstanceId, InstanceRegistry, ViewerHandle};
use crate::renderer::{RasterFrame, RasterService};
use crate::surface::DrawingSurface;
use crate::viewport::ViewState;
use crate::zoom::ZoomSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No document.
    Empty,
    /// A document load is in flight.
    Loading,
    /// Document loaded and the current page is on the surface (or failed to render).
    Ready,
    /// The latest render request has not completed yet.
    Rendering,
    Disposed,
}

/// What an instance publishes to its handles after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub phase: Phase,
    pub view: ViewState,
    pub locator: Option<Arc<str>>,
}

/// A raster job as issued; `generation` orders it against other requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub generation: u64,
    pub page: u32,
    pub scale: f32,
}

/// Requests queued from a `ViewerHandle`.
#[derive(Debug)]
pub(crate) enum Control {
    SetSource(String),
    Resize(f32),
    Command(Command),
    Dispose,
}

/// Results of spawned load/render jobs.
pub enum Completion<D> {
    Progress {
        generation: u64,
        event: ProgressEvent,
    },
    Loaded {
        generation: u64,
        locator: Arc<str>,
        result: std::result::Result<D, LoadError>,
    },
    Rendered {
        request: RenderRequest,
        result: std::result::Result<RasterFrame, RenderError>,
    },
}

enum LoopEvent<D> {
    Control(Control),
    Completion(Completion<D>),
    Broadcast(std::result::Result<Envelope, broadcast::error::RecvError>),
}

struct PendingLoad {
    generation: u64,
    locator: Arc<str>,
}

pub struct ViewerInstance<L, R, S>
where
    L: DocumentLoader,
{
    id: InstanceId,
    config: ViewerConfig,
    view: ViewState,
    document: Option<DocumentHandle<L::Doc>>,
    loading: Option<PendingLoad>,
    load_generation: u64,
    render_generation: u64,
    pending_render: Option<RenderRequest>,
    renders_in_flight: usize,
    awaiting_first_frame: bool,
    disposed: bool,
    loader: Arc<L>,
    raster: Arc<R>,
    surface: S,
    events: EventSender,
    completions_tx: mpsc::UnboundedSender<Completion<L::Doc>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<L::Doc>>,
    snapshot_tx: watch::Sender<ViewSnapshot>,
}

impl<L, R, S> ViewerInstance<L, R, S>
where
    L: DocumentLoader,
    R: RasterService<L::Doc>,
    S: DrawingSurface,
{
    pub fn new(
        id: InstanceId,
        config: ViewerConfig,
        loader: Arc<L>,
        raster: Arc<R>,
        surface: S,
        events: EventSender,
    ) -> Result<Self> {
        config.validate()?;

        let mut view = ViewState::new(config.initial_scale);
        view.set_available_width(surface.container_width());
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(ViewSnapshot {
            phase: Phase::Empty,
            view: view.clone(),
            locator: None,
        });

        Ok(Self {
            id,
            config,
            view,
            document: None,
            loading: None,
            load_generation: 0,
            render_generation: 0,
            pending_render: None,
            renders_in_flight: 0,
            awaiting_first_frame: false,
            disposed: false,
            loader,
            raster,
            surface,
            events,
            completions_tx,
            completions_rx,
            snapshot_tx,
        })
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn document(&self) -> Option<&DocumentHandle<L::Doc>> {
        self.document.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn phase(&self) -> Phase {
        if self.disposed {
            Phase::Disposed
        } else if self.loading.is_some() {
            Phase::Loading
        } else if self.document.is_none() {
            Phase::Empty
        } else if self.pending_render.is_some() {
            Phase::Rendering
        } else {
            Phase::Ready
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            phase: self.phase(),
            view: self.view.clone(),
            locator: self
                .loading
                .as_ref()
                .map(|pending| Arc::clone(&pending.locator))
                .or_else(|| {
                    self.document
                        .as_ref()
                        .map(|document| Arc::from(document.locator()))
                }),
        }
    }

    /// True while a load or any render job has not reported back.
    pub fn is_busy(&self) -> bool {
        self.loading.is_some() || self.renders_in_flight > 0
    }

    /// Replace the document with the one at `locator`.
    ///
    /// The current document is dropped immediately; any job still running
    /// for it is ignored when it completes.
    pub fn set_source(&mut self, locator: impl Into<Arc<str>>) {
        if self.disposed {
            return;
        }
        let locator: Arc<str> = locator.into();
        if locator.is_empty() {
            debug!(instance = %self.id, "Ignoring empty document source");
            return;
        }

        self.load_generation += 1;
        self.render_generation += 1;
        self.pending_render = None;
        self.awaiting_first_frame = false;
        self.document = None;
        self.view.reset(0);
        self.view.set_available_width(self.surface.container_width());
        self.loading = Some(PendingLoad {
            generation: self.load_generation,
            locator: Arc::clone(&locator),
        });
        info!(instance = %self.id, %locator, "Loading document");

        let generation = self.load_generation;
        let loader = Arc::clone(&self.loader);
        let done = self.completions_tx.clone();
        let progress = self.completions_tx.clone();
        let reporter = ProgressReporter::new(move |event| {
            let _ = progress.send(Completion::Progress { generation, event });
        });
        tokio::spawn(async move {
            let result = loader.load(&locator, reporter).await;
            let _ = done.send(Completion::Loaded {
                generation,
                locator,
                result,
            });
        });

        self.publish();
    }

    pub fn next_page(&mut self) {
        if !self.is_navigable("next_page") {
            return;
        }
        if self.view.next_page() {
            self.render_current_page();
        } else {
            debug!(instance = %self.id, page = self.view.current_page(), "Already on the last page");
        }
    }

    pub fn prev_page(&mut self) {
        if !self.is_navigable("prev_page") {
            return;
        }
        if self.view.previous_page() {
            self.render_current_page();
        } else {
            debug!(instance = %self.id, "Already on the first page");
        }
    }

    /// Jump to 1-based `page`; out of range pages are ignored.
    pub fn goto_page(&mut self, page: u32) {
        if !self.is_navigable("goto_page") {
            return;
        }
        if self.view.set_page(page) {
            self.render_current_page();
        } else {
            debug!(
                instance = %self.id,
                page,
                page_count = self.view.page_count(),
                "Ignoring out of range page"
            );
        }
    }

    pub fn change_zoom(&mut self, zoom: ZoomSpec) {
        if self.disposed {
            return;
        }
        let Some(scale) = zoom.resolve(
            self.view.available_width(),
            self.view.natural_width(),
            &self.config,
        ) else {
            debug!(instance = %self.id, %zoom, "Ignoring zoom request without a finite scale");
            return;
        };
        if !self.view.set_scale(scale) {
            return;
        }
        debug!(instance = %self.id, scale, "Zoom changed");

        if self.document.is_some() {
            self.render_current_page();
        } else {
            self.publish();
        }
    }

    pub fn resize(&mut self, available_width: f32) {
        if self.disposed {
            return;
        }
        self.surface.set_container_width(available_width);
        self.view.set_available_width(self.surface.container_width());
        self.publish();
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::NextPage => self.next_page(),
            Command::PrevPage => self.prev_page(),
            Command::GotoPage(page) => self.goto_page(page),
            Command::ChangeZoom(zoom) => self.change_zoom(zoom),
        }
    }

    /// Issue a raster job for the current page at the current scale.
    ///
    /// Supersedes any job still in flight: only the newest one may paint.
    pub fn render_current_page(&mut self) {
        let Some(document) = self.document.clone() else {
            return;
        };
        if document.page_count() == 0 {
            return;
        }

        self.render_generation += 1;
        let request = RenderRequest {
            generation: self.render_generation,
            page: self.view.current_page(),
            scale: self.view.scale(),
        };
        self.pending_render = Some(request);
        self.renders_in_flight += 1;

        let raster = Arc::clone(&self.raster);
        let done = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = raster
                .rasterize(document.document(), request.page, request.scale)
                .await;
            let _ = done.send(Completion::Rendered { request, result });
        });

        self.publish();
    }

    pub fn handle_completion(&mut self, completion: Completion<L::Doc>) {
        match completion {
            Completion::Progress { generation, event } => {
                if self.is_current_load(generation) {
                    self.emit(ViewerEventKind::Progress(event));
                }
            }
            Completion::Loaded {
                generation,
                locator,
                result,
            } => self.on_loaded(generation, locator, result),
            Completion::Rendered { request, result } => self.on_rendered(request, result),
        }
    }

    /// Wait for the next job to report back and apply it.
    ///
    /// Returns false if the completion channel is closed.
    pub async fn process_next(&mut self) -> bool {
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.handle_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Apply completions until no load or render is outstanding.
    pub async fn settle(&mut self) {
        while self.is_busy() {
            if !self.process_next().await {
                break;
            }
        }
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.loading = None;
        self.pending_render = None;
        self.document = None;
        debug!(instance = %self.id, "Viewer instance disposed");
        self.publish();
    }

    /// Register with `bus` and move the instance onto its own task.
    ///
    /// The registry keeps a handle for direct routing, so dropping the
    /// returned handles does not stop the task. It runs until
    /// [`ViewerHandle::dispose`] is called or the bus is dropped, then
    /// deregisters itself.
    pub fn spawn(self, bus: &CommandBus) -> Result<ViewerHandle> {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let handle = ViewerHandle::new(
            self.id.clone(),
            control_tx,
            self.snapshot_tx.subscribe(),
        );
        bus.registry().register(handle.clone())?;

        let commands = bus.subscribe();
        let registry = bus.registry().clone();
        tokio::spawn(self.run(commands, control_rx, registry));
        Ok(handle)
    }

    async fn run(
        mut self,
        mut commands: broadcast::Receiver<Envelope>,
        mut control: mpsc::UnboundedReceiver<Control>,
        registry: InstanceRegistry,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                Some(message) = control.recv() => LoopEvent::Control(message),
                Some(completion) = self.completions_rx.recv() => LoopEvent::Completion(completion),
                received = commands.recv() => LoopEvent::Broadcast(received),
            };

            match event {
                LoopEvent::Control(Control::SetSource(locator)) => self.set_source(locator),
                LoopEvent::Control(Control::Resize(width)) => self.resize(width),
                LoopEvent::Control(Control::Command(command)) => self.apply(command),
                LoopEvent::Control(Control::Dispose) => break,
                LoopEvent::Completion(completion) => self.handle_completion(completion),
                LoopEvent::Broadcast(Ok(envelope)) => {
                    if envelope.is_for(&self.id) {
                        self.apply(envelope.command);
                    }
                }
                LoopEvent::Broadcast(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(instance = %self.id, skipped, "Viewer fell behind the command bus");
                }
                LoopEvent::Broadcast(Err(broadcast::error::RecvError::Closed)) => break,
            }
        }

        registry.deregister(&self.id);
        self.dispose();
    }

    fn on_loaded(
        &mut self,
        generation: u64,
        locator: Arc<str>,
        result: std::result::Result<L::Doc, LoadError>,
    ) {
        if !self.is_current_load(generation) {
            debug!(instance = %self.id, %locator, "Discarding superseded document load");
            return;
        }
        self.loading = None;

        match result {
            Ok(document) => {
                let document = DocumentHandle::new(locator, document);
                let page_count = document.page_count();
                info!(
                    instance = %self.id,
                    locator = document.locator(),
                    page_count,
                    "Document loaded"
                );
                self.view.reset(page_count);
                self.document = Some(document);

                if page_count == 0 {
                    self.emit(ViewerEventKind::Progress(ProgressEvent::Finished));
                    self.publish();
                } else {
                    self.awaiting_first_frame = true;
                    self.render_current_page();
                }
            }
            Err(error) => {
                warn!(instance = %self.id, %locator, "PDF load error: {}", error);
                self.view.reset(0);
                self.emit(ViewerEventKind::Progress(ProgressEvent::Error));
                self.emit(ViewerEventKind::LoadFailed {
                    message: error.to_string(),
                });
                self.publish();
            }
        }
    }

    fn on_rendered(
        &mut self,
        request: RenderRequest,
        result: std::result::Result<RasterFrame, RenderError>,
    ) {
        self.renders_in_flight = self.renders_in_flight.saturating_sub(1);

        let is_latest = self
            .pending_render
            .is_some_and(|pending| pending.generation == request.generation);
        if !is_latest {
            debug!(
                instance = %self.id,
                page = request.page,
                generation = request.generation,
                "Dropping superseded render"
            );
            return;
        }
        self.pending_render = None;

        match result {
            Ok(frame) => {
                if request.scale == 1.0 {
                    self.view.capture_natural_size(frame.width, frame.height);
                }
                let (width, height) = frame.pixel_size();
                self.surface.resize(width, height);
                self.surface.paint(&frame);

                if self.awaiting_first_frame {
                    self.awaiting_first_frame = false;
                    self.emit(ViewerEventKind::Progress(ProgressEvent::Finished));
                }
                self.emit(ViewerEventKind::PageLoaded(PageLoaded {
                    page: request.page,
                    total: self.view.page_count(),
                }));
            }
            Err(error) => {
                warn!(
                    instance = %self.id,
                    page = request.page,
                    scale = request.scale,
                    "Render failed: {}",
                    error
                );
                self.emit(ViewerEventKind::RenderFailed {
                    page: request.page,
                    scale: request.scale,
                    error,
                });
            }
        }

        self.publish();
    }

    fn is_current_load(&self, generation: u64) -> bool {
        self.loading
            .as_ref()
            .is_some_and(|pending| pending.generation == generation)
    }

    fn is_navigable(&self, operation: &str) -> bool {
        if self.disposed || self.document.is_none() {
            debug!(instance = %self.id, operation, phase = ?self.phase(), "No document to navigate");
            return false;
        }
        true
    }

    fn emit(&self, kind: ViewerEventKind) {
        let _ = self.events.send(ViewerEvent {
            instance: self.id.clone(),
            kind,
        });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{event_channel, EventReceiver};
    use crate::testing::{MemoryLoader, MemoryRaster, RecordingSurface, SurfaceOp};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    type TestInstance = ViewerInstance<MemoryLoader, MemoryRaster, RecordingSurface>;

    struct Fixture {
        instance: TestInstance,
        raster: Arc<MemoryRaster>,
        loader: Arc<MemoryLoader>,
        surface: RecordingSurface,
        events: EventReceiver,
    }

    fn fixture(loader: MemoryLoader) -> Fixture {
        let loader = Arc::new(loader);
        let raster = Arc::new(MemoryRaster::new());
        let surface = RecordingSurface::new(1200.0);
        let (events_tx, events) = event_channel();
        let instance = ViewerInstance::new(
            "test".into(),
            ViewerConfig::default(),
            Arc::clone(&loader),
            Arc::clone(&raster),
            surface.clone(),
            events_tx,
        )
        .unwrap();
        Fixture {
            instance,
            raster,
            loader,
            surface,
            events,
        }
    }

    async fn loaded(pages: u32) -> Fixture {
        let mut fx = fixture(MemoryLoader::new().with_document("doc.pdf", pages));
        fx.instance.set_source("doc.pdf");
        fx.instance.settle().await;
        fx
    }

    /// Apply completions until nothing arrives for a while, stale ones included.
    async fn drain_completions(instance: &mut TestInstance) {
        while tokio::time::timeout(Duration::from_millis(50), instance.process_next())
            .await
            .is_ok()
        {}
    }

    fn drain(events: &mut EventReceiver) -> Vec<ViewerEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn new_instance_is_empty_with_default_scale() {
        let fx = fixture(MemoryLoader::new());
        assert_eq!(fx.instance.phase(), Phase::Empty);
        assert_eq!(fx.instance.view().current_page(), 1);
        assert_eq!(fx.instance.view().scale(), 1.5);
        assert_eq!(fx.instance.view().available_width(), 1200.0);
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let (events_tx, _events) = event_channel();
        let result = TestInstance::new(
            "bad".into(),
            ViewerConfig::default().with_initial_scale(0.1),
            Arc::new(MemoryLoader::new()),
            Arc::new(MemoryRaster::new()),
            RecordingSurface::new(800.0),
            events_tx,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn load_renders_first_page_and_reports_progress() {
        let mut fx = fixture(MemoryLoader::new().with_document("doc.pdf", 3));
        fx.instance.set_source("doc.pdf");
        assert_eq!(fx.instance.phase(), Phase::Loading);

        fx.instance.settle().await;

        assert_eq!(fx.instance.phase(), Phase::Ready);
        assert_eq!(fx.instance.view().current_page(), 1);
        assert_eq!(fx.instance.view().page_count(), 3);
        assert_eq!(fx.surface.painted_pages(), vec![1]);

        let kinds = drain(&mut fx.events);
        let tail = &kinds[kinds.len() - 2..];
        assert_eq!(
            tail,
            &[
                ViewerEventKind::Progress(ProgressEvent::Finished),
                ViewerEventKind::PageLoaded(PageLoaded { page: 1, total: 3 }),
            ]
        );
        assert!(kinds[..kinds.len() - 2]
            .iter()
            .all(|kind| matches!(kind, ViewerEventKind::Progress(ProgressEvent::Loading { .. }))));
    }

    #[tokio::test]
    async fn surface_is_resized_to_frame_before_painting() {
        let fx = loaded(1).await;
        assert_eq!(
            fx.surface.ops(),
            vec![
                SurfaceOp::Resize {
                    width: 918,
                    height: 1188
                },
                SurfaceOp::Paint { page: 1, scale: 1.5 },
            ]
        );
    }

    #[tokio::test]
    async fn navigation_stays_within_bounds() {
        let mut fx = loaded(10).await;

        for _ in 0..9 {
            fx.instance.next_page();
        }
        fx.instance.settle().await;
        assert_eq!(fx.instance.view().current_page(), 10);

        fx.instance.next_page();
        assert_eq!(fx.instance.phase(), Phase::Ready);
        assert_eq!(fx.instance.view().current_page(), 10);

        fx.instance.prev_page();
        fx.instance.settle().await;
        assert_eq!(fx.instance.view().current_page(), 9);
        assert_eq!(fx.surface.painted_pages().last(), Some(&9));
    }

    #[tokio::test]
    async fn prev_page_on_first_page_is_a_no_op() {
        let mut fx = loaded(4).await;
        let before = fx.instance.snapshot();
        fx.instance.prev_page();
        assert_eq!(fx.instance.snapshot(), before);
        assert!(!fx.instance.is_busy());
    }

    #[tokio::test]
    async fn goto_ignores_out_of_range_pages() {
        let mut fx = loaded(5).await;
        let before = fx.instance.snapshot();

        fx.instance.goto_page(0);
        fx.instance.goto_page(6);
        assert_eq!(fx.instance.snapshot(), before);

        fx.instance.goto_page(5);
        fx.instance.settle().await;
        assert_eq!(fx.instance.view().current_page(), 5);
    }

    #[tokio::test]
    async fn navigation_without_document_is_ignored() {
        let mut fx = fixture(MemoryLoader::new());
        fx.instance.next_page();
        fx.instance.goto_page(2);
        assert_eq!(fx.instance.phase(), Phase::Empty);
        assert!(fx.raster.calls().is_empty());
    }

    #[tokio::test]
    async fn zoom_is_floored_and_same_scale_is_skipped() {
        let mut fx = loaded(2).await;
        let calls = fx.raster.calls().len();

        fx.instance.change_zoom(ZoomSpec::Scale(-4.0));
        assert_eq!(fx.instance.view().scale(), 0.5);
        fx.instance.settle().await;

        fx.instance.change_zoom(ZoomSpec::Scale(0.2));
        assert!(!fx.instance.is_busy());
        assert_eq!(fx.raster.calls().len(), calls + 1);
    }

    #[tokio::test]
    async fn fit_width_falls_back_to_nominal_width() {
        let mut fx = loaded(2).await;
        fx.instance.change_zoom(ZoomSpec::FitWidth);
        assert_eq!(fx.instance.view().scale(), 2.0);
        // the fallback is not recorded as the page width
        assert_eq!(fx.instance.view().page_width(), 0.0);
    }

    #[tokio::test]
    async fn scale_one_render_captures_natural_size_for_fit_width() {
        let mut fx = loaded(2).await;
        fx.instance.change_zoom(ZoomSpec::Scale(1.0));
        fx.instance.settle().await;
        assert_eq!(fx.instance.view().page_width(), 612.0);
        assert_eq!(fx.instance.view().page_height(), 792.0);

        fx.instance.resize(918.0);
        fx.instance.change_zoom(ZoomSpec::FitWidth);
        assert_eq!(fx.instance.view().scale(), 1.5);
    }

    #[tokio::test]
    async fn resized_width_survives_the_next_load() {
        let mut fx = fixture(MemoryLoader::new().with_document("doc.pdf", 2));
        fx.instance.resize(1800.0);
        assert_eq!(fx.surface.container_width(), 1800.0);

        fx.instance.set_source("doc.pdf");
        fx.instance.settle().await;
        assert_eq!(fx.instance.view().available_width(), 1800.0);

        fx.instance.change_zoom(ZoomSpec::FitWidth);
        assert_eq!(fx.instance.view().scale(), 3.0);
    }

    #[tokio::test]
    async fn load_reads_the_current_container_width() {
        let mut fx = fixture(MemoryLoader::new().with_document("doc.pdf", 2));
        fx.surface.set_container_width(1500.0);

        fx.instance.set_source("doc.pdf");
        assert_eq!(fx.instance.view().available_width(), 1500.0);
        fx.instance.settle().await;

        fx.instance.change_zoom(ZoomSpec::FitWidth);
        assert_eq!(fx.instance.view().scale(), 2.5);
    }

    #[tokio::test]
    async fn zoom_before_load_applies_to_first_render() {
        let mut fx = fixture(MemoryLoader::new().with_document("doc.pdf", 1));
        fx.instance.change_zoom(ZoomSpec::Scale(3.0));
        assert_eq!(fx.instance.phase(), Phase::Empty);

        fx.instance.set_source("doc.pdf");
        fx.instance.settle().await;
        assert_eq!(fx.raster.calls(), vec![(1, 3.0)]);
    }

    #[tokio::test]
    async fn stale_render_never_paints_over_newer_page() {
        let mut fx = loaded(5).await;
        fx.raster.hold(2);

        fx.instance.next_page();
        fx.instance.next_page();
        assert_eq!(fx.instance.view().current_page(), 3);

        // page 3 completes first and paints
        assert!(fx.instance.process_next().await);
        assert_eq!(fx.surface.painted_pages(), vec![1, 3]);
        assert_eq!(fx.instance.phase(), Phase::Ready);

        fx.raster.release(2);
        fx.instance.settle().await;
        assert_eq!(fx.surface.painted_pages(), vec![1, 3]);

        let loaded_pages: Vec<u32> = drain(&mut fx.events)
            .into_iter()
            .filter_map(|kind| match kind {
                ViewerEventKind::PageLoaded(loaded) => Some(loaded.page),
                _ => None,
            })
            .collect();
        assert_eq!(loaded_pages, vec![1, 3]);
    }

    #[tokio::test]
    async fn render_failure_is_reported_and_keeps_old_pixels() {
        let mut fx = loaded(3).await;
        drain(&mut fx.events);
        fx.raster.fail_page(2);

        fx.instance.next_page();
        fx.instance.settle().await;

        assert_eq!(fx.instance.phase(), Phase::Ready);
        assert_eq!(fx.instance.view().current_page(), 2);
        assert_eq!(fx.surface.painted_pages(), vec![1]);
        assert_eq!(
            drain(&mut fx.events),
            vec![ViewerEventKind::RenderFailed {
                page: 2,
                scale: 1.5,
                error: RenderError::backend(2, "injected failure"),
            }]
        );
    }

    #[tokio::test]
    async fn load_failure_returns_to_empty() {
        let mut fx = loaded(3).await;
        drain(&mut fx.events);

        fx.instance.set_source("missing.pdf");
        fx.instance.settle().await;

        assert_eq!(fx.instance.phase(), Phase::Empty);
        assert!(fx.instance.document().is_none());
        let kinds = drain(&mut fx.events);
        assert_eq!(kinds[0], ViewerEventKind::Progress(ProgressEvent::Error));
        assert!(matches!(kinds[1], ViewerEventKind::LoadFailed { .. }));

        fx.instance.next_page();
        assert_eq!(fx.instance.view().current_page(), 1);
    }

    #[tokio::test]
    async fn newer_source_supersedes_slow_load() {
        let loader = MemoryLoader::new()
            .with_document("slow.pdf", 8)
            .with_document("fast.pdf", 2);
        let mut fx = fixture(loader);
        fx.loader.hold("slow.pdf");

        fx.instance.set_source("slow.pdf");
        fx.instance.set_source("fast.pdf");
        fx.instance.settle().await;
        assert_eq!(fx.instance.document().unwrap().locator(), "fast.pdf");

        fx.loader.release("slow.pdf");
        drain_completions(&mut fx.instance).await;

        let document = fx.instance.document().unwrap();
        assert_eq!(document.locator(), "fast.pdf");
        assert_eq!(fx.instance.view().page_count(), 2);
        assert_eq!(fx.surface.painted_pages(), vec![1]);
    }

    #[tokio::test]
    async fn source_change_drops_renders_for_old_document() {
        let mut fx = loaded(4).await;
        fx.raster.hold(2);
        fx.instance.next_page();

        fx.instance.set_source("doc.pdf");
        fx.raster.release(2);
        fx.instance.settle().await;

        assert_eq!(fx.instance.view().current_page(), 1);
        assert_eq!(fx.surface.painted_pages(), vec![1, 1]);
    }

    #[tokio::test]
    async fn zero_page_document_is_ready_but_inert() {
        let mut fx = fixture(MemoryLoader::new().with_document("blank.pdf", 0));
        fx.instance.set_source("blank.pdf");
        fx.instance.settle().await;

        assert_eq!(fx.instance.phase(), Phase::Ready);
        fx.instance.next_page();
        fx.instance.goto_page(1);
        assert!(fx.raster.calls().is_empty());
        assert_eq!(
            drain(&mut fx.events).last(),
            Some(&ViewerEventKind::Progress(ProgressEvent::Finished))
        );
    }

    #[tokio::test]
    async fn disposed_instance_ignores_everything() {
        let mut fx = loaded(3).await;
        fx.instance.dispose();
        fx.instance.next_page();
        fx.instance.set_source("doc.pdf");
        fx.instance.change_zoom(ZoomSpec::Scale(2.0));

        assert_eq!(fx.instance.phase(), Phase::Disposed);
        assert_eq!(fx.instance.view().scale(), 1.5);
        assert!(!fx.instance.is_busy());
    }
}
