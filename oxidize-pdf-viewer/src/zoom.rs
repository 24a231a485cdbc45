//! Zoom requests and their resolution to a numeric scale.

use std::fmt;
use std::str::FromStr;

use crate::config::ViewerConfig;

/// A zoom request: an explicit scale factor or "fit the container width".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomSpec {
    Scale(f32),
    FitWidth,
}

impl ZoomSpec {
    /// Resolve to the scale that should be rendered.
    ///
    /// `page_width` is the natural width captured at scale 1.0, if any.
    /// Returns `None` for requests that cannot produce a finite scale.
    pub fn resolve(
        self,
        available_width: f32,
        page_width: Option<f32>,
        config: &ViewerConfig,
    ) -> Option<f32> {
        let scale = match self {
            Self::Scale(scale) => scale,
            Self::FitWidth => {
                let page_width = page_width
                    .filter(|width| *width > 0.0)
                    .unwrap_or(config.fit_width_fallback);
                available_width / page_width
            }
        };

        if !scale.is_finite() {
            return None;
        }
        Some(scale.max(config.min_scale))
    }
}

impl From<f32> for ZoomSpec {
    fn from(scale: f32) -> Self {
        Self::Scale(scale)
    }
}

impl fmt::Display for ZoomSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale(scale) => write!(f, "{scale}"),
            Self::FitWidth => f.write_str("fit-width"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a number or \"fit-width\", got {0:?}")]
pub struct ParseZoomError(String);

impl FromStr for ZoomSpec {
    type Err = ParseZoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            // "width" is the older spelling still sent by some embedders
            "fit-width" | "width" => Ok(Self::FitWidth),
            _ => {
                let number = trimmed.strip_suffix('%').map_or_else(
                    || trimmed.parse::<f32>(),
                    |percent| percent.trim().parse::<f32>().map(|p| p / 100.0),
                );
                number
                    .map(Self::Scale)
                    .map_err(|_| ParseZoomError(s.to_string()))
            }
        }
    }
}
