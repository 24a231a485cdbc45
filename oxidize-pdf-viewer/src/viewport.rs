use serde::Serialize;

/// ViewState tracks which page is shown and at which scale
///
/// Pages are 1-based. `page_width`/`page_height` hold the natural (scale 1.0)
/// size of the page and stay at 0 until a page has been rendered at 1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    current_page: u32,
    page_count: u32,
    scale: f32,
    page_width: f32,
    page_height: f32,
    available_width: f32,
}

impl ViewState {
    pub fn new(scale: f32) -> Self {
        Self {
            current_page: 1,
            page_count: 0,
            scale,
            page_width: 0.0,
            page_height: 0.0,
            available_width: 0.0,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn page_width(&self) -> f32 {
        self.page_width
    }

    pub fn page_height(&self) -> f32 {
        self.page_height
    }

    /// Natural page width, once one has been captured.
    pub fn natural_width(&self) -> Option<f32> {
        (self.page_width > 0.0).then_some(self.page_width)
    }

    pub fn available_width(&self) -> f32 {
        self.available_width
    }

    pub fn set_available_width(&mut self, width: f32) {
        self.available_width = if width.is_finite() { width.max(0.0) } else { 0.0 };
    }

    /// Back to page 1 of a document with `page_count` pages.
    pub fn reset(&mut self, page_count: u32) {
        self.current_page = 1;
        self.page_count = page_count;
    }

    pub fn next_page(&mut self) -> bool {
        if self.current_page < self.page_count {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.current_page > 1 && self.page_count > 0 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    /// Jump to `page`; out of range requests leave the state untouched.
    pub fn set_page(&mut self, page: u32) -> bool {
        if (1..=self.page_count).contains(&page) {
            self.current_page = page;
            true
        } else {
            false
        }
    }

    /// Returns false when `scale` is already the current scale.
    pub fn set_scale(&mut self, scale: f32) -> bool {
        // exact comparison: any difference is worth a re-render
        if scale == self.scale {
            return false;
        }
        self.scale = scale;
        true
    }

    pub fn capture_natural_size(&mut self, width: f32, height: f32) {
        self.page_width = width;
        self.page_height = height;
    }
}
