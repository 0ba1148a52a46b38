//! # pdf2img-core
//!
//! Render the first page of a PDF to a PNG image.
//!
//! - **pdfium** (Google's PDF engine) is bound lazily, once per process
//! - the page is rendered at 4x scale on tokio's blocking pool
//! - the result is a named `image/png` file plus a `blob:` URL for it
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2img_core::{convert_pdf_to_image, global_blob_registry, InputFile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let result = convert_pdf_to_image(&InputFile::from_path("invoice.pdf")).await;
//!
//!     match result.error {
//!         None => {
//!             let file = result.file.expect("file is set on success");
//!             println!("{} -> {}", file.name(), result.image_url);
//!             // The URL is ours to release.
//!             global_blob_registry().revoke_object_url(&result.image_url);
//!         }
//!         Some(error) => eprintln!("{}", error),
//!     }
//!     Ok(())
//! }
//! ```

pub mod blob;
pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod loader;
pub mod render;

// Re-export main types for convenience
pub use blob::{global_blob_registry, png_file_name, Blob, BlobRegistry, NamedFile};
pub use converter::{convert_pdf_to_image, ConversionResult, Converter, FileSource, InputFile};
pub use config::EngineConfig;
pub use engine::{acquire_engine, configure_global_engine, global_engine_config, EngineHandle};
pub use error::{ConversionError, Result};
pub use loader::LazyLoader;
pub use render::{RasterSurface, Viewport, MAX_SURFACE_PIXELS, RENDER_SCALE};

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
