use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use iced::{
    keyboard::{self, key::Named, Key},
    widget::{
        button, column, container, horizontal_space, image as img, row, scrollable, text,
        text_input,
    },
    window, Element, Length, Subscription, Task, Theme,
};
use oxidize_pdf_viewer::{
    event_channel, CommandBus, EventReceiver, InstanceId, ViewerConfig, ViewerEvent, ViewerInstance,
    ZoomSpec,
};

mod pane;
mod renderer;

use pane::{Pane, PaneSurface};
use renderer::{PdfRenderer, PdfiumLoader, PdfiumRaster};

const ZOOM_STEP: f32 = 1.25;
const INITIAL_WINDOW_WIDTH: f32 = 1024.0;
const PANE_PADDING: f32 = 20.0;
const LOG_FILTER: &str = "oxidize_pdf_viewer=debug,info";

/// Show one or more PDF documents side by side.
#[derive(Debug, Parser)]
#[command(name = "oxidize-pdf-viewer", version, about)]
struct Args {
    /// Documents to open, one pane each
    #[arg(required = true)]
    documents: Vec<PathBuf>,

    /// Initial render scale
    #[arg(long, default_value_t = 1.5)]
    scale: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(LOG_FILTER)
        .init();

    let config = ViewerConfig::default().with_initial_scale(args.scale);
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("viewer")
        .build()
        .context("Failed to start the async runtime")?;

    let (app, notifications) = {
        let _guard = runtime.enter();
        ViewerApp::start(&args.documents, config)?
    };

    iced::application("PDF Viewer", ViewerApp::update, ViewerApp::view)
        .subscription(ViewerApp::subscription)
        .theme(|_| Theme::Dark)
        .run_with(move || (app, listen(notifications)))?;

    drop(runtime);
    Ok(())
}

/// Forward instance notifications into the iced update loop.
fn listen(notifications: EventReceiver) -> Task<Message> {
    let events = iced::futures::stream::unfold(notifications, |mut notifications| async move {
        notifications
            .recv()
            .await
            .map(|event| (event, notifications))
    });
    Task::run(events, Message::Viewer)
}

#[derive(Debug, Clone)]
enum Message {
    Previous(usize),
    Next(usize),
    ZoomIn(usize),
    ZoomOut(usize),
    FitWidth(usize),
    PageInput(usize, String),
    GotoSubmitted(usize),
    PreviousAll,
    NextAll,
    Viewer(ViewerEvent),
    WindowResized(f32),
}

struct ViewerApp {
    bus: CommandBus,
    panes: Vec<Pane>,
}

impl ViewerApp {
    fn start(documents: &[PathBuf], config: ViewerConfig) -> Result<(Self, EventReceiver)> {
        let bus = CommandBus::default();
        let (events, notifications) = event_channel();
        let renderer = PdfRenderer::spawn()?;
        let loader = Arc::new(PdfiumLoader::new(Arc::clone(&renderer)));
        let raster = Arc::new(PdfiumRaster);
        let pane_width = pane_width(INITIAL_WINDOW_WIDTH, documents.len());

        let mut panes = Vec::with_capacity(documents.len());
        for path in documents {
            let id = InstanceId::generate();
            let surface = PaneSurface::new(pane_width);
            let instance = ViewerInstance::new(
                id.clone(),
                config.clone(),
                Arc::clone(&loader),
                Arc::clone(&raster),
                surface.clone(),
                events.clone(),
            )?;
            let handle = instance.spawn(&bus)?;
            handle.set_source(path.to_string_lossy())?;

            let title = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            tracing::info!("Opening {} in {}", path.display(), id);
            panes.push(Pane::new(title, handle, bus.instance(id), surface));
        }

        Ok((Self { bus, panes }, notifications))
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Previous(index) => {
                if let Some(pane) = self.panes.get(index) {
                    pane.commands.prev_page();
                }
            }
            Message::Next(index) => {
                if let Some(pane) = self.panes.get(index) {
                    pane.commands.next_page();
                }
            }
            Message::ZoomIn(index) => self.zoom_by(index, ZOOM_STEP),
            Message::ZoomOut(index) => self.zoom_by(index, 1.0 / ZOOM_STEP),
            Message::FitWidth(index) => {
                if let Some(pane) = self.panes.get(index) {
                    pane.commands.change_zoom(ZoomSpec::FitWidth);
                }
            }
            Message::PageInput(index, value) => {
                if let Some(pane) = self.panes.get_mut(index) {
                    pane.page_input = value;
                }
            }
            Message::GotoSubmitted(index) => {
                if let Some(pane) = self.panes.get_mut(index) {
                    match pane.page_input.trim().parse::<u32>() {
                        Ok(page) => {
                            pane.commands.goto_page(page);
                        }
                        Err(_) => tracing::debug!("Ignoring page input {:?}", pane.page_input),
                    }
                    pane.page_input.clear();
                }
            }
            Message::PreviousAll => {
                if self.panes.len() > 1 {
                    self.panes.iter().for_each(|pane| {
                        pane.commands.prev_page();
                    });
                } else {
                    self.bus.prev_page();
                }
            }
            Message::NextAll => {
                if self.panes.len() > 1 {
                    self.panes.iter().for_each(|pane| {
                        pane.commands.next_page();
                    });
                } else {
                    self.bus.next_page();
                }
            }
            Message::Viewer(event) => {
                match self
                    .panes
                    .iter_mut()
                    .find(|pane| pane.handle.id() == &event.instance)
                {
                    Some(pane) => pane.apply(event.kind),
                    None => tracing::debug!("Notification for closed pane {}", event.instance),
                }
            }
            Message::WindowResized(width) => {
                let width = pane_width(width, self.panes.len());
                for pane in &self.panes {
                    if let Err(e) = pane.handle.resize(width) {
                        tracing::warn!("Failed to resize {}: {}", pane.title, e);
                    }
                }
            }
        }
        Task::none()
    }

    fn zoom_by(&self, index: usize, factor: f32) {
        if let Some(pane) = self.panes.get(index) {
            let scale = pane.handle.snapshot().view.scale();
            pane.commands.change_zoom(ZoomSpec::Scale(scale * factor));
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            keyboard::on_key_press(|key, _modifiers| match key.as_ref() {
                Key::Named(Named::ArrowRight | Named::PageDown) => Some(Message::NextAll),
                Key::Named(Named::ArrowLeft | Named::PageUp) => Some(Message::PreviousAll),
                _ => None,
            }),
            window::resize_events().map(|(_id, size)| Message::WindowResized(size.width)),
        ])
    }

    fn view(&self) -> Element<'_, Message> {
        let mut panes = row![].spacing(10).padding(10);
        for (index, pane) in self.panes.iter().enumerate() {
            panes = panes.push(self.pane_view(index, pane));
        }
        panes.into()
    }

    fn pane_view<'a>(&'a self, index: usize, pane: &'a Pane) -> Element<'a, Message> {
        let snapshot = pane.handle.snapshot();

        let toolbar = row![
            text(&pane.title).size(14),
            horizontal_space(),
            button("−").on_press(Message::ZoomOut(index)),
            text(format!("{}%", (snapshot.view.scale() * 100.0).round() as i32)),
            button("+").on_press(Message::ZoomIn(index)),
            button("Fit").on_press(Message::FitWidth(index)),
        ]
        .spacing(10);

        let navigation = row![
            button("◀").on_press_maybe(
                (snapshot.view.current_page() > 1).then_some(Message::Previous(index))
            ),
            text(pane.status.line()),
            button("▶").on_press_maybe(
                (snapshot.view.current_page() < snapshot.view.page_count())
                    .then_some(Message::Next(index))
            ),
            horizontal_space(),
            text_input("Page", &pane.page_input)
                .on_input(move |value| Message::PageInput(index, value))
                .on_submit(Message::GotoSubmitted(index))
                .width(Length::Fixed(80.0)),
        ]
        .spacing(10);

        let page_view = match pane.surface.frame() {
            Some(frame) => scrollable(container(img(frame).width(Length::Shrink)))
                .width(Length::Fill)
                .height(Length::Fill),
            None => scrollable(
                container(text(pane.status.line()))
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .center_x(Length::Fill)
                    .center_y(Length::Fill),
            )
            .width(Length::Fill)
            .height(Length::Fill),
        };

        container(column![toolbar, navigation, page_view].spacing(10))
            .width(Length::FillPortion(1))
            .height(Length::Fill)
            .into()
    }
}

fn pane_width(window_width: f32, panes: usize) -> f32 {
    let panes = panes.max(1) as f32;
    (window_width / panes - PANE_PADDING).max(0.0)
}
