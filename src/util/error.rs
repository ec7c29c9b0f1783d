//! Error types for the renderer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for renderer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Acceleration structure could not be built (invalid geometry, over budget)
    #[error("Acceleration structure build failed: {0}")]
    AccelBuild(String),

    /// Handle refers to an acceleration structure generation that was replaced
    #[error("Stale acceleration structure handle (generation {handle}, current {current})")]
    StaleAccel { handle: u32, current: u32 },

    /// Integrator pipeline failed to build
    #[error("Pipeline build failed: {0}")]
    PipelineBuild(String),

    /// Handle does not name a live resource
    #[error("Invalid {kind} handle: {index}")]
    InvalidHandle { kind: &'static str, index: u32 },

    /// Resource exists but cannot be used for the requested operation
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Operation requires state that has not been set up yet
    #[error("Not ready: {0}")]
    NotReady(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid resource error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidResource(msg.into())
    }
}

/// Result type alias for renderer operations.
pub type Result<T> = std::result::Result<T, Error>;
