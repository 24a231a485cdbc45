use crate::renderer::RasterFrame;

/// The drawing target owned by one viewer instance.
///
/// The surface is the only record of the container width; the instance
/// re-reads it on every load and resize.
pub trait DrawingSurface: Send + 'static {
    /// Width of the enclosing container, used by fit-width zoom.
    fn container_width(&self) -> f32;

    /// Record a new container width reported by the embedder.
    fn set_container_width(&mut self, width: f32);

    fn resize(&mut self, width: u32, height: u32);

    fn paint(&mut self, frame: &RasterFrame);
}
