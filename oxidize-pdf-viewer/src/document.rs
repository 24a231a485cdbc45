use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LoadError;
use crate::progress::ProgressEvent;

/// A decoded document as seen by the viewer core.
pub trait Document: Send + Sync + 'static {
    fn page_count(&self) -> u32;
}

/// Opens documents from a source locator.
#[async_trait]
pub trait DocumentLoader: Send + Sync + 'static {
    type Doc: Document;

    /// Open `locator`, reporting transfer progress through `progress`.
    async fn load(&self, locator: &str, progress: ProgressReporter)
        -> Result<Self::Doc, LoadError>;
}

/// Shared reference to a loaded document plus the locator it came from.
///
/// Cheap to clone; render jobs hold a clone while they run.
pub struct DocumentHandle<D> {
    locator: Arc<str>,
    page_count: u32,
    inner: Arc<D>,
}

impl<D: Document> DocumentHandle<D> {
    pub fn new(locator: impl Into<Arc<str>>, document: D) -> Self {
        Self {
            locator: locator.into(),
            page_count: document.page_count(),
            inner: Arc::new(document),
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn document(&self) -> &D {
        &self.inner
    }
}

impl<D> Clone for DocumentHandle<D> {
    fn clone(&self) -> Self {
        Self {
            locator: Arc::clone(&self.locator),
            page_count: self.page_count,
            inner: Arc::clone(&self.inner),
        }
    }
}

// Manual Debug impl since backend documents rarely implement it
impl<D> fmt::Debug for DocumentHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("locator", &self.locator)
            .field("page_count", &self.page_count)
            .finish()
    }
}

type ProgressSink = dyn Fn(ProgressEvent) + Send + Sync;

/// Callback a loader uses to report bytes transferred.
///
/// Reports whose `loaded` value goes backwards are dropped so consumers
/// see a non-decreasing sequence.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<ProgressSink>,
    high_water: Arc<AtomicU64>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            high_water: Arc::new(AtomicU64::new(0)),
        }
    }

    /// A reporter that discards everything.
    pub fn silent() -> Self {
        Self::new(|_| {})
    }

    pub fn report(&self, loaded: u64, total: u64) {
        let previous = self.high_water.fetch_max(loaded, Ordering::AcqRel);
        if loaded < previous {
            tracing::debug!(loaded, previous, "Dropping regressing progress report");
            return;
        }
        (self.sink)(ProgressEvent::Loading { loaded, total });
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("loaded", &self.high_water.load(Ordering::Acquire))
            .finish()
    }
}
