//! PDFium backed loader and rasterizer.
//!
//! PDFium documents are not thread-safe, so a single worker thread owns the
//! library binding and every open document. Async callers talk to it over a
//! job channel and await a oneshot reply.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use oxidize_pdf_viewer::{
    Document, DocumentLoader, LoadError, ProgressReporter, RasterFrame, RasterService,
    RenderError,
};
use pdfium_render::prelude::*;
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Error)]
enum WorkerError {
    #[error("PDFium is unavailable: {0}")]
    Unavailable(String),

    #[error("PDFium worker stopped")]
    Stopped,
}

type OpenReply = std::result::Result<(u64, u32), LoadError>;
type RenderReply = std::result::Result<RasterFrame, RenderError>;

enum Job {
    Open {
        path: PathBuf,
        reply: oneshot::Sender<OpenReply>,
    },
    Render {
        key: u64,
        page: u32,
        scale: f32,
        reply: oneshot::Sender<RenderReply>,
    },
    Close {
        key: u64,
    },
}

impl Job {
    fn fail(self, error: &WorkerError) {
        match self {
            Job::Open { reply, .. } => {
                let _ = reply.send(Err(LoadError::backend(error.to_string())));
            }
            Job::Render { page, reply, .. } => {
                let _ = reply.send(Err(RenderError::backend(page, error.to_string())));
            }
            Job::Close { .. } => {}
        }
    }
}

/// Handle to the PDFium worker thread.
pub struct PdfRenderer {
    jobs: mpsc::Sender<Job>,
}

impl PdfRenderer {
    pub fn spawn() -> Result<Arc<Self>> {
        let (jobs, queue) = mpsc::channel();
        std::thread::Builder::new()
            .name("pdfium".to_string())
            .spawn(move || run_worker(queue))
            .context("Failed to start the PDFium worker thread")?;
        Ok(Arc::new(Self { jobs }))
    }

    async fn open(&self, path: PathBuf) -> OpenReply {
        let (reply, response) = oneshot::channel();
        self.submit(Job::Open { path, reply });
        response
            .await
            .unwrap_or_else(|_| Err(LoadError::backend(WorkerError::Stopped.to_string())))
    }

    async fn render(&self, key: u64, page: u32, scale: f32) -> RenderReply {
        let (reply, response) = oneshot::channel();
        self.submit(Job::Render {
            key,
            page,
            scale,
            reply,
        });
        response
            .await
            .unwrap_or_else(|_| Err(RenderError::backend(page, WorkerError::Stopped.to_string())))
    }

    fn close(&self, key: u64) {
        self.submit(Job::Close { key });
    }

    fn submit(&self, job: Job) {
        if let Err(mpsc::SendError(job)) = self.jobs.send(job) {
            job.fail(&WorkerError::Stopped);
        }
    }
}

fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .context("Failed to bind to PDFium library. Please install PDFium or download the library from https://github.com/bblanchon/pdfium-binaries")?;
    Ok(Pdfium::new(bindings))
}

fn run_worker(queue: mpsc::Receiver<Job>) {
    let pdfium = match bind_pdfium() {
        Ok(pdfium) => pdfium,
        Err(e) => {
            tracing::error!("{:#}", e);
            let error = WorkerError::Unavailable(format!("{e:#}"));
            for job in queue {
                job.fail(&error);
            }
            return;
        }
    };

    let mut documents: HashMap<u64, PdfDocument<'_>> = HashMap::new();
    let mut next_key = 1u64;

    for job in queue {
        match job {
            Job::Open { path, reply } => {
                let result = open_document(&pdfium, &path).map(|document| {
                    let key = next_key;
                    next_key += 1;
                    let page_count = u32::from(document.pages().len());
                    documents.insert(key, document);
                    (key, page_count)
                });
                let _ = reply.send(result);
            }
            Job::Render {
                key,
                page,
                scale,
                reply,
            } => {
                let result = match documents.get(&key) {
                    Some(document) => render_page(document, page, scale),
                    None => Err(RenderError::backend(page, "document is closed")),
                };
                let _ = reply.send(result);
            }
            Job::Close { key } => {
                documents.remove(&key);
            }
        }
    }
    tracing::debug!("PDFium worker shutting down");
}

fn open_document<'a>(pdfium: &'a Pdfium, path: &Path) -> std::result::Result<PdfDocument<'a>, LoadError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| LoadError::malformed(path.display().to_string(), e.to_string()))
}

fn render_page(document: &PdfDocument<'_>, page: u32, scale: f32) -> RenderReply {
    let page_count = u32::from(document.pages().len());
    let index = page
        .checked_sub(1)
        .filter(|index| *index < page_count)
        .and_then(|index| u16::try_from(index).ok())
        .ok_or(RenderError::PageOutOfRange { page, page_count })?;

    let pdf_page = document
        .pages()
        .get(index)
        .map_err(|e| RenderError::backend(page, e.to_string()))?;

    // Viewport size at the requested scale
    let width = pdf_page.width().value * scale;
    let height = pdf_page.height().value * scale;

    let render_config = PdfRenderConfig::new()
        .set_target_width(width.round() as i32)
        .set_maximum_height(height.round() as i32)
        .rotate_if_landscape(PdfPageRenderRotation::None, false);

    let bitmap = pdf_page
        .render_with_config(&render_config)
        .map_err(|e| RenderError::backend(page, e.to_string()))?;

    // PDFium hands out BGRA
    let mut pixels = bitmap.as_raw_bytes().to_vec();
    for pixel in pixels.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    let image = image::RgbaImage::from_raw(bitmap.width() as u32, bitmap.height() as u32, pixels)
        .ok_or_else(|| RenderError::backend(page, "bitmap size does not match its pixel buffer"))?;

    Ok(RasterFrame::new(page, scale, width, height, image))
}

/// A document open in the PDFium worker; closed when dropped.
pub struct PdfiumDocument {
    key: u64,
    page_count: u32,
    renderer: Arc<PdfRenderer>,
}

impl Document for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }
}

impl Drop for PdfiumDocument {
    fn drop(&mut self) {
        self.renderer.close(self.key);
    }
}

/// Opens local PDF files through the PDFium worker.
pub struct PdfiumLoader {
    renderer: Arc<PdfRenderer>,
}

impl PdfiumLoader {
    pub fn new(renderer: Arc<PdfRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl DocumentLoader for PdfiumLoader {
    type Doc = PdfiumDocument;

    async fn load(
        &self,
        locator: &str,
        progress: ProgressReporter,
    ) -> std::result::Result<PdfiumDocument, LoadError> {
        let path = PathBuf::from(locator);
        let total = tokio::fs::metadata(&path)
            .await
            .map_err(|source| LoadError::Io {
                locator: locator.to_string(),
                source,
            })?
            .len();
        progress.report(0, total);

        let (key, page_count) = self.renderer.open(path).await?;
        progress.report(total, total);

        Ok(PdfiumDocument {
            key,
            page_count,
            renderer: Arc::clone(&self.renderer),
        })
    }
}

/// Rasterizes pages of documents opened by [`PdfiumLoader`].
pub struct PdfiumRaster;

#[async_trait]
impl RasterService<PdfiumDocument> for PdfiumRaster {
    async fn rasterize(
        &self,
        document: &PdfiumDocument,
        page: u32,
        scale: f32,
    ) -> std::result::Result<RasterFrame, RenderError> {
        document.renderer.render(document.key, page, scale).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let loader = PdfiumLoader::new(PdfRenderer::spawn().unwrap());
        let result = loader
            .load("/definitely/not/here.pdf", ProgressReporter::silent())
            .await;
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[tokio::test]
    async fn garbage_file_is_rejected_after_progress() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a PDF").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(move |event| sink.lock().unwrap().push(event));

        let loader = PdfiumLoader::new(PdfRenderer::spawn().unwrap());
        let result = loader
            .load(file.path().to_str().unwrap(), reporter)
            .await;

        assert!(matches!(
            result,
            Err(LoadError::Malformed { .. } | LoadError::Backend(_))
        ));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![oxidize_pdf_viewer::ProgressEvent::Loading { loaded: 0, total: 17 }]
        );
    }
}
