//! Error types for PDF to PNG conversion.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Main error type for the pdf2img library.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The pdfium library could not be bound.
    #[error("Failed to load PDF rendering engine: {0}")]
    EngineLoad(String),

    /// An engine load attempt shared by several callers failed.
    #[error(transparent)]
    Shared(Arc<ConversionError>),

    /// Input file not found.
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// Reading the input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input bytes are not a readable PDF document.
    #[error("Failed to parse PDF document: {0}")]
    Decode(String),

    /// The requested page does not exist.
    #[error("Page {page} not found (document has {page_count} pages)")]
    PageNotFound { page: u16, page_count: u16 },

    /// PDF rendering failed.
    #[error("PDF rendering failed: {0}")]
    Render(String),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncodingError(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A task on the blocking pool panicked or was cancelled.
    #[error("Background worker failed: {0}")]
    Worker(String),

    /// Writing an output file failed.
    #[error("Failed to write output to '{path}': {message}")]
    OutputDirError { path: PathBuf, message: String },
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, ConversionError>;

impl From<tokio::task::JoinError> for ConversionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ConversionError::Worker(err.to_string())
    }
}
