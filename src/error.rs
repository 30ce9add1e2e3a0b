//! Error types for the progressive renderer.

use std::path::PathBuf;
use thiserror::Error;

use crate::render_system::backend::ImageFormat;

/// Failures raised by a render backend or one of its kernels.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Requested image format cannot back a storage image on this backend
    #[error("Unsupported storage image format: {0:?}")]
    UnsupportedFormat(ImageFormat),

    /// Device memory could not be allocated
    #[error("Image allocation failed: {0}")]
    Allocation(String),

    /// Device or kernel cannot run work
    #[error("Compute device unavailable: {0}")]
    Unavailable(String),

    /// Kernel dispatch failed
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Blending into the display surface failed
    #[error("Composite failed: {0}")]
    Composite(String),
}

/// Main error type for rendering operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Zero-area accumulation target requested
    #[error("Invalid target dimension {width}x{height}")]
    InvalidDimension { width: u32, height: u32 },

    /// Fatal backend failure for the current frame
    #[error("Render backend error: {0}")]
    RenderBackend(#[from] BackendError),

    /// Camera projection cannot be inverted
    #[error("Camera projection matrix is singular")]
    SingularProjection,

    /// Config file does not exist or cannot be accessed
    #[error("Config not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Config file is not valid JSON for `RenderConfig`
    #[error("Invalid config: {0}")]
    Config(#[from] serde_json::Error),

    /// Config parsed but describes an unusable setup
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error aborted a frame without changing any render state.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::RenderBackend(_) | Self::SingularProjection)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
