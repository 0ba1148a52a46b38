//! First-page PDF to PNG conversion.
//!
//! [`Converter::convert`] never fails: every error is reported through
//! [`ConversionResult::error`].

use crate::blob::{global_blob_registry, png_file_name, BlobRegistry, NamedFile};
use crate::config::EngineConfig;
use crate::engine::{engine_loader, global_engine_loader, EngineHandle};
use crate::error::{ConversionError, Result};
use crate::loader::LazyLoader;
use crate::render::{encode_png, render_first_page};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, error, info};

/// Error reported when the surface could not be encoded.
pub const BLOB_ERROR: &str = "Failed to create image blob";

/// Prefix of the error reported for every other failure.
pub const CONVERT_ERROR_PREFIX: &str = "Failed to convert PDF: ";

/// Error reported by [`ConversionResult::into_result`] for a result that is
/// neither a success nor a failure.
pub const INCONSISTENT_RESULT_ERROR: &str = "Inconsistent conversion result: no error, file or URL";

/// Where the bytes of an [`InputFile`] come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Memory(Vec<u8>),
    Path(PathBuf),
}

/// A named PDF to convert.
#[derive(Debug, Clone)]
pub struct InputFile {
    name: String,
    source: FileSource,
}

impl InputFile {
    /// An in-memory file, e.g. an upload.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(data),
        }
    }

    /// A file on disk, named after the last path component. Invalid UTF-8 in
    /// the name is replaced rather than dropped.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Read the full contents.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(data) => Ok(data.clone()),
            FileSource::Path(path) => read_path(path).await,
        }
    }
}

async fn read_path(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConversionError::InputNotFound(path.to_path_buf()),
        _ => ConversionError::Io(e),
    })
}

/// Outcome of a conversion.
///
/// Either `file` is set and `image_url` is non-empty, or `error` is set,
/// `file` is `None` and `image_url` is empty.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    /// Object URL of the PNG; empty on failure. The caller must revoke it.
    pub image_url: String,
    /// The PNG named after the input.
    pub file: Option<NamedFile>,
    /// What went wrong.
    pub error: Option<String>,
}

impl ConversionResult {
    pub fn success(image_url: String, file: NamedFile) -> Self {
        Self {
            image_url,
            file: Some(file),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            image_url: String::new(),
            file: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.file.is_some() && !self.image_url.is_empty()
    }

    /// `(image_url, file)` on success, the error message otherwise.
    pub fn into_result(self) -> std::result::Result<(String, NamedFile), String> {
        match (self.error, self.file) {
            (None, Some(file)) if !self.image_url.is_empty() => Ok((self.image_url, file)),
            (Some(error), _) => Err(error),
            _ => Err(INCONSISTENT_RESULT_ERROR.to_string()),
        }
    }
}

/// Renders page one of PDFs to PNG files.
#[derive(Debug, Clone)]
pub struct Converter {
    /// Lazily bound pdfium engine.
    engine: Arc<LazyLoader<EngineHandle>>,
    /// Registry that owns minted object URLs.
    blobs: Arc<BlobRegistry>,
}

impl Converter {
    /// Create a converter with its own engine loader and URL registry.
    ///
    /// pdfium is bound on the first conversion, not here.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_loader(
            engine_loader(config),
            Arc::new(BlobRegistry::new()),
        ))
    }

    /// Create a converter from an existing engine loader and registry.
    pub fn with_loader(engine: Arc<LazyLoader<EngineHandle>>, blobs: Arc<BlobRegistry>) -> Self {
        Self { engine, blobs }
    }

    /// The converter backed by the process-wide engine and registry.
    pub fn global() -> &'static Converter {
        static CONVERTER: OnceLock<Converter> = OnceLock::new();
        CONVERTER.get_or_init(|| {
            Converter::with_loader(
                Arc::clone(global_engine_loader()),
                Arc::clone(global_blob_registry()),
            )
        })
    }

    /// Registry holding the object URLs this converter mints.
    pub fn blob_registry(&self) -> &Arc<BlobRegistry> {
        &self.blobs
    }

    /// Whether pdfium has been bound yet.
    pub fn engine_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    /// Render the first page of `file` to a PNG.
    pub async fn convert(&self, file: &InputFile) -> ConversionResult {
        let start = Instant::now();
        let outcome = self.render_to_file(file).await;
        self.finish(file, outcome, start)
    }

    /// Turn the outcome of the pipeline into a result, minting a URL on success.
    fn finish(
        &self,
        file: &InputFile,
        outcome: Result<Option<NamedFile>>,
        start: Instant,
    ) -> ConversionResult {
        match outcome {
            Ok(Some(png)) => {
                let image_url = self.blobs.create_object_url(png.blob().clone());
                info!(
                    "Converted {:?} to {:?} ({} bytes) in {:?}",
                    file.name(),
                    png.name(),
                    png.len(),
                    start.elapsed()
                );
                ConversionResult::success(image_url, png)
            }
            Ok(None) => ConversionResult::failure(BLOB_ERROR),
            Err(e) => {
                error!("PDF conversion failed: {}", e);
                ConversionResult::failure(format!("{}{}", CONVERT_ERROR_PREFIX, e))
            }
        }
    }

    async fn render_to_file(&self, file: &InputFile) -> Result<Option<NamedFile>> {
        let engine = self.engine.acquire().await?;

        let bytes = file.read_bytes().await?;
        debug!("Read {} bytes from {:?}", bytes.len(), file.name());

        let surface =
            tokio::task::spawn_blocking(move || render_first_page(&engine, &bytes)).await??;

        let blob = tokio::task::spawn_blocking(move || encode_png(&surface)).await?;

        Ok(blob.map(|blob| NamedFile::new(png_file_name(file.name()), blob)))
    }
}

/// Render the first page of `file` with the process-wide converter.
pub async fn convert_pdf_to_image(file: &InputFile) -> ConversionResult {
    Converter::global().convert(file).await
}
