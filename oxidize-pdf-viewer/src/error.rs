use thiserror::Error;

use crate::registry::InstanceId;

/// Document acquisition failed.
///
/// Never fatal: the instance returns to `Empty` and a later `set_source`
/// can retry.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {locator}: {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{locator} is not a readable document: {message}")]
    Malformed { locator: String, message: String },

    #[error("document backend: {0}")]
    Backend(String),
}

impl LoadError {
    pub fn malformed(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            locator: locator.into(),
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Rasterization of a page failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("page {page} is outside 1..={page_count}")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("failed to render page {page}: {message}")]
    Backend { page: u32, message: String },
}

impl RenderError {
    pub fn backend(page: u32, message: impl Into<String>) -> Self {
        Self::Backend {
            page,
            message: message.into(),
        }
    }
}

/// Errors surfaced to the embedding application.
#[derive(Debug, Error, PartialEq)]
pub enum ViewerError {
    #[error("invalid viewer configuration: {0}")]
    InvalidConfig(String),

    #[error("an instance with id {0} is already registered")]
    DuplicateInstance(InstanceId),

    #[error("no live instance with id {0}")]
    UnknownInstance(InstanceId),

    #[error("instance {0} has been disposed")]
    Disposed(InstanceId),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
