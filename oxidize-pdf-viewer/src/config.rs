use serde::Deserialize;

use crate::error::{Result, ViewerError};

/// Scale a freshly created instance renders at.
pub const DEFAULT_SCALE: f32 = 1.5;
/// Hard zoom floor; smaller requests are clamped up to it.
pub const MIN_SCALE: f32 = 0.5;
/// Natural page width assumed by fit-width before a page was rendered at 1.0.
pub const FIT_WIDTH_FALLBACK: f32 = 600.0;
/// Broadcast buffer of the command bus.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Per-instance settings supplied at creation time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub initial_scale: f32,
    pub min_scale: f32,
    pub fit_width_fallback: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial_scale: DEFAULT_SCALE,
            min_scale: MIN_SCALE,
            fit_width_fallback: FIT_WIDTH_FALLBACK,
        }
    }
}

impl ViewerConfig {
    pub fn with_initial_scale(mut self, scale: f32) -> Self {
        self.initial_scale = scale;
        self
    }

    pub fn with_min_scale(mut self, scale: f32) -> Self {
        self.min_scale = scale;
        self
    }

    pub fn with_fit_width_fallback(mut self, width: f32) -> Self {
        self.fit_width_fallback = width;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            return Err(ViewerError::InvalidConfig(format!(
                "min_scale must be a positive number, got {}",
                self.min_scale
            )));
        }
        if !self.initial_scale.is_finite() || self.initial_scale < self.min_scale {
            return Err(ViewerError::InvalidConfig(format!(
                "initial_scale {} is below the zoom floor {}",
                self.initial_scale, self.min_scale
            )));
        }
        if !(self.fit_width_fallback.is_finite() && self.fit_width_fallback > 0.0) {
            return Err(ViewerError::InvalidConfig(format!(
                "fit_width_fallback must be a positive width, got {}",
                self.fit_width_fallback
            )));
        }
        Ok(())
    }
}
