use async_trait::async_trait;

use crate::document::Document;
use crate::error::RenderError;

/// Rasterizes single pages of a document.
#[async_trait]
pub trait RasterService<D: Document>: Send + Sync + 'static {
    /// Render 1-based `page` of `document` at `scale`.
    async fn rasterize(&self, document: &D, page: u32, scale: f32)
        -> Result<RasterFrame, RenderError>;
}

/// Pixels of one rendered page.
///
/// `width`/`height` are the viewport dimensions at the render scale; at
/// scale 1.0 they are the natural size of the page.
#[derive(Clone)]
pub struct RasterFrame {
    pub page: u32,
    pub scale: f32,
    pub width: f32,
    pub height: f32,
    pub image: image::RgbaImage,
}

impl RasterFrame {
    pub fn new(page: u32, scale: f32, width: f32, height: f32, image: image::RgbaImage) -> Self {
        Self {
            page,
            scale,
            width,
            height,
            image,
        }
    }

    /// Pixel dimensions of the image.
    pub fn pixel_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl std::fmt::Debug for RasterFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterFrame")
            .field("page", &self.page)
            .field("scale", &self.scale)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixels", &self.pixel_size())
            .finish()
    }
}
