//! In-memory collaborators for exercising viewer instances without a real
//! document engine.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::document::{Document, DocumentLoader, ProgressReporter};
use crate::error::{LoadError, RenderError};
use crate::renderer::{RasterFrame, RasterService};
use crate::surface::DrawingSurface;

/// US Letter in points.
pub const LETTER: (f32, f32) = (612.0, 792.0);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keys whose jobs must wait until released.
struct Gates<K> {
    held: Mutex<HashMap<K, Arc<Semaphore>>>,
}

impl<K: Eq + Hash> Default for Gates<K> {
    fn default() -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash> Gates<K> {
    fn hold(&self, key: K) {
        lock(&self.held).insert(key, Arc::new(Semaphore::new(0)));
    }

    fn release(&self, key: &K) {
        if let Some(gate) = lock(&self.held).remove(key) {
            gate.close();
        }
    }

    async fn pass(&self, key: &K) {
        let gate = lock(&self.held).get(key).cloned();
        if let Some(gate) = gate {
            // closed on release
            let _ = gate.acquire().await;
        }
    }
}

/// A document made of page sizes only.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    pages: Vec<(f32, f32)>,
}

impl MemoryDocument {
    pub fn new(pages: Vec<(f32, f32)>) -> Self {
        Self { pages }
    }

    pub fn page_size(&self, page: u32) -> Option<(f32, f32)> {
        let index = page.checked_sub(1)?;
        self.pages.get(index as usize).copied()
    }
}

impl Document for MemoryDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }
}

/// Serves documents registered by locator; unknown locators fail with
/// `NotFound`.
#[derive(Default)]
pub struct MemoryLoader {
    documents: HashMap<String, Vec<(f32, f32)>>,
    failures: HashMap<String, String>,
    gates: Gates<String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `page_count` letter-sized pages under `locator`.
    pub fn with_document(self, locator: &str, page_count: u32) -> Self {
        self.with_pages(locator, vec![LETTER; page_count as usize])
    }

    pub fn with_pages(mut self, locator: &str, pages: Vec<(f32, f32)>) -> Self {
        self.documents.insert(locator.to_string(), pages);
        self
    }

    /// Make loads of `locator` fail as malformed.
    pub fn with_failure(mut self, locator: &str, message: &str) -> Self {
        self.failures
            .insert(locator.to_string(), message.to_string());
        self
    }

    /// Hold loads of `locator` until `release`.
    pub fn hold(&self, locator: &str) {
        self.gates.hold(locator.to_string());
    }

    pub fn release(&self, locator: &str) {
        self.gates.release(&locator.to_string());
    }
}

#[async_trait]
impl DocumentLoader for MemoryLoader {
    type Doc = MemoryDocument;

    async fn load(
        &self,
        locator: &str,
        progress: ProgressReporter,
    ) -> Result<MemoryDocument, LoadError> {
        self.gates.pass(&locator.to_string()).await;

        if let Some(message) = self.failures.get(locator) {
            return Err(LoadError::malformed(locator, message.as_str()));
        }
        let Some(pages) = self.documents.get(locator) else {
            return Err(LoadError::Io {
                locator: locator.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
            });
        };

        let total = (pages.len() as u64 + 1) * 1024;
        for step in 0..=4 {
            progress.report(total * step / 4, total);
            tokio::task::yield_now().await;
        }
        Ok(MemoryDocument::new(pages.clone()))
    }
}

/// Renders blank frames sized like the requested page.
#[derive(Default)]
pub struct MemoryRaster {
    failing: Mutex<HashSet<u32>>,
    calls: Mutex<Vec<(u32, f32)>>,
    gates: Gates<u32>,
}

impl MemoryRaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every render of `page` fail.
    pub fn fail_page(&self, page: u32) {
        lock(&self.failing).insert(page);
    }

    /// Hold renders of `page` until `release`.
    pub fn hold(&self, page: u32) {
        self.gates.hold(page);
    }

    pub fn release(&self, page: u32) {
        self.gates.release(&page);
    }

    /// Every `(page, scale)` rasterization started so far.
    pub fn calls(&self) -> Vec<(u32, f32)> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl RasterService<MemoryDocument> for MemoryRaster {
    async fn rasterize(
        &self,
        document: &MemoryDocument,
        page: u32,
        scale: f32,
    ) -> Result<RasterFrame, RenderError> {
        lock(&self.calls).push((page, scale));
        self.gates.pass(&page).await;

        if lock(&self.failing).contains(&page) {
            return Err(RenderError::backend(page, "injected failure"));
        }
        let (width, height) = document
            .page_size(page)
            .ok_or(RenderError::PageOutOfRange {
                page,
                page_count: document.page_count(),
            })?;

        let (width, height) = (width * scale, height * scale);
        let image = image::RgbaImage::new(width.ceil() as u32, height.ceil() as u32);
        Ok(RasterFrame::new(page, scale, width, height, image))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Resize { width: u32, height: u32 },
    Paint { page: u32, scale: f32 },
}

/// Records what was drawn. Clones share the same log.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    container_width: Arc<Mutex<f32>>,
    ops: Arc<Mutex<Vec<SurfaceOp>>>,
}

impl RecordingSurface {
    pub fn new(container_width: f32) -> Self {
        Self {
            container_width: Arc::new(Mutex::new(container_width)),
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_container_width(&self, width: f32) {
        *lock(&self.container_width) = width;
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        lock(&self.ops).clone()
    }

    pub fn painted_pages(&self) -> Vec<u32> {
        lock(&self.ops)
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Paint { page, .. } => Some(*page),
                SurfaceOp::Resize { .. } => None,
            })
            .collect()
    }

    pub fn last_paint(&self) -> Option<(u32, f32)> {
        lock(&self.ops).iter().rev().find_map(|op| match op {
            SurfaceOp::Paint { page, scale } => Some((*page, *scale)),
            SurfaceOp::Resize { .. } => None,
        })
    }
}

impl DrawingSurface for RecordingSurface {
    fn container_width(&self) -> f32 {
        *lock(&self.container_width)
    }

    fn set_container_width(&mut self, width: f32) {
        *lock(&self.container_width) = width;
    }

    fn resize(&mut self, width: u32, height: u32) {
        lock(&self.ops).push(SurfaceOp::Resize { width, height });
    }

    fn paint(&mut self, frame: &RasterFrame) {
        lock(&self.ops).push(SurfaceOp::Paint {
            page: frame.page,
            scale: frame.scale,
        });
    }
}
