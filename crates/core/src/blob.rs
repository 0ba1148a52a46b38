//! In-memory binary objects, named files and transient object URLs.

use crate::error::{ConversionError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::debug;
use uuid::Uuid;

/// MIME type of encoded pages.
pub const PNG_MIME_TYPE: &str = "image/png";

/// Prefix of every URL minted by [`BlobRegistry::create_object_url`].
pub const OBJECT_URL_PREFIX: &str = "blob:pdf2img/";

/// Immutable bytes with a MIME type. Clones share the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    data: Arc<[u8]>,
    mime_type: String,
}

impl Blob {
    pub fn new(data: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// A blob of type `image/png`.
    pub fn png(data: Vec<u8>) -> Self {
        Self::new(data, PNG_MIME_TYPE)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A blob with a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    name: String,
    blob: Blob,
}

impl NamedFile {
    pub fn new(name: impl Into<String>, blob: Blob) -> Self {
        Self {
            name: name.into(),
            blob,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        self.blob.mime_type()
    }

    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }

    pub fn len(&self) -> usize {
        self.blob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }

    /// Write the file into `dir` under its own name, creating `dir` if needed.
    pub async fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ConversionError::OutputDirError {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;

        let output_path = dir.join(&self.name);
        tokio::fs::write(&output_path, self.bytes())
            .await
            .map_err(|e| ConversionError::OutputDirError {
                path: output_path.clone(),
                message: e.to_string(),
            })?;

        Ok(output_path)
    }
}

/// Output name for a rendered PDF: a trailing `.pdf` (any case) is replaced
/// by `.png`, any other name just gets `.png` appended.
pub fn png_file_name(original: &str) -> String {
    format!("{}.png", strip_pdf_suffix(original))
}

fn strip_pdf_suffix(name: &str) -> &str {
    let split = match name.len().checked_sub(4) {
        Some(split) => split,
        None => return name,
    };
    match name.get(split..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(".pdf") => &name[..split],
        _ => name,
    }
}

/// Maps object URLs to the blobs they reference.
///
/// URLs stay resolvable until revoked; whoever receives a URL owns it.
#[derive(Debug, Default)]
pub struct BlobRegistry {
    entries: RwLock<HashMap<String, Blob>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `blob` and return a new `blob:` URL for it.
    pub fn create_object_url(&self, blob: Blob) -> String {
        let url = format!("{}{}", OBJECT_URL_PREFIX, Uuid::new_v4());
        debug!("Created object URL {} ({} bytes)", url, blob.len());
        self.entries.write().insert(url.clone(), blob);
        url
    }

    /// Look up the blob behind `url`.
    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.entries.read().get(url).cloned()
    }

    /// Release `url`. Returns false if it was unknown or already revoked.
    pub fn revoke_object_url(&self, url: &str) -> bool {
        self.entries.write().remove(url).is_some()
    }

    /// Number of live URLs.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// The process-wide registry used by [`crate::Converter::global`].
pub fn global_blob_registry() -> &'static Arc<BlobRegistry> {
    static REGISTRY: OnceLock<Arc<BlobRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Arc::new(BlobRegistry::new()))
}
