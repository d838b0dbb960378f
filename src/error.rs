//! Error types for the wallpaper pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating or serving the wallpaper
///
/// `Lookup` is a soft failure: the dictionary client logs it and drops the
/// word. Every other variant raised inside a generation cycle aborts that
/// cycle only.
#[derive(Error, Debug)]
pub enum Error {
    /// More words were requested than the vocabulary pool holds
    #[error("Vocabulary pool has {available} words but {requested} were requested")]
    InsufficientPool { requested: usize, available: usize },

    /// A single word could not be resolved by the dictionary provider
    #[error("Lookup failed for '{word}': {reason}")]
    Lookup { word: String, reason: String },

    /// Every lookup in the cycle failed
    #[error("No words could be resolved for this cycle")]
    EmptyBatch,

    /// Failed to initialize the rendering surface
    #[error("Renderer initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load the layout document into the surface
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// The layout element could not be located after load
    #[error("Render target '{0}' not found after load")]
    RenderTargetMissing(String),

    /// Failed to rasterize the layout
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Persisting the raster bytes failed
    #[error("Failed to write wallpaper to {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Network error outside of a per-word lookup
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serving endpoint failure
    #[error("Server error: {0}")]
    ServerError(String),

    /// A DevTools protocol call failed
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}
