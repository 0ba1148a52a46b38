//! Binding of the pdfium rendering engine.
//!
//! The engine is bound at most once per [`LazyLoader`]. [`acquire_engine`] uses a
//! process-wide loader that is created on first use and never torn down.

use crate::config::EngineConfig;
use crate::error::{ConversionError, Result};
use crate::loader::LazyLoader;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Shared handle to a bound pdfium instance.
#[derive(Clone)]
pub struct EngineHandle {
    pdfium: Arc<Pdfium>,
    /// Library the engine was bound from, `None` for the system library.
    locator: Option<PathBuf>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// The bound pdfium instance.
    pub fn pdfium(&self) -> &Pdfium {
        &self.pdfium
    }

    /// Library path the engine was bound from, `None` for the system library.
    pub fn locator(&self) -> Option<&Path> {
        self.locator.as_deref()
    }
}

/// Bind pdfium on the blocking pool.
pub async fn load_engine(config: EngineConfig) -> Result<EngineHandle> {
    config.validate()?;
    tokio::task::spawn_blocking(move || bind_engine(&config)).await?
}

fn bind_engine(config: &EngineConfig) -> Result<EngineHandle> {
    let mut misses = Vec::new();

    for locator in config.candidate_paths() {
        match Pdfium::bind_to_library(&locator) {
            Ok(bindings) => {
                info!("Bound pdfium from {:?}", locator);
                return Ok(EngineHandle {
                    pdfium: Arc::new(Pdfium::new(bindings)),
                    locator: Some(locator),
                });
            }
            Err(e) => {
                debug!("No pdfium at {:?}: {}", locator, e);
                misses.push(format!("{}: {}", locator.display(), e));
            }
        }
    }

    if config.use_system_library {
        match Pdfium::bind_to_system_library() {
            Ok(bindings) => {
                info!("Bound pdfium from the system library path");
                return Ok(EngineHandle {
                    pdfium: Arc::new(Pdfium::new(bindings)),
                    locator: None,
                });
            }
            Err(e) => misses.push(format!("system library: {}", e)),
        }
    }

    Err(ConversionError::EngineLoad(format!(
        "pdfium library not found ({})",
        misses.join("; ")
    )))
}

/// Create a loader that binds pdfium with `config` on first use.
pub fn engine_loader(config: EngineConfig) -> Arc<LazyLoader<EngineHandle>> {
    Arc::new(LazyLoader::new(move || load_engine(config.clone())))
}

static GLOBAL_CONFIG: OnceLock<EngineConfig> = OnceLock::new();
static GLOBAL_LOADER: OnceLock<Arc<LazyLoader<EngineHandle>>> = OnceLock::new();

/// Set the config used by the process-wide engine loader.
///
/// Must be called before the first [`acquire_engine`]; fails afterwards or
/// when called twice. A config that is accepted is always the one the
/// loader binds with.
pub fn configure_global_engine(config: EngineConfig) -> Result<()> {
    config.validate()?;
    // The loader reads the config through the same cell, so whichever of
    // `set` and `get_or_init` runs first decides it.
    GLOBAL_CONFIG.set(config).map_err(|_| {
        let reason = if GLOBAL_LOADER.get().is_some() {
            "global engine already in use"
        } else {
            "global engine already configured"
        };
        ConversionError::InvalidConfig(reason.to_string())
    })
}

/// Config of the process-wide engine, if it has been decided yet.
pub fn global_engine_config() -> Option<&'static EngineConfig> {
    GLOBAL_CONFIG.get()
}

/// The process-wide engine loader.
pub fn global_engine_loader() -> &'static Arc<LazyLoader<EngineHandle>> {
    GLOBAL_LOADER.get_or_init(|| {
        let config = GLOBAL_CONFIG.get_or_init(EngineConfig::default).clone();
        debug!("Global engine config: {:?}", config);
        engine_loader(config)
    })
}

/// Get the process-wide engine, binding pdfium on first use.
pub async fn acquire_engine() -> Result<EngineHandle> {
    global_engine_loader().acquire().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_engine_handle_is_send_and_sync() {
        assert_send_sync::<EngineHandle>();
        assert_send_sync::<Arc<LazyLoader<EngineHandle>>>();
        assert_send_sync::<crate::converter::Converter>();
    }

    #[tokio::test]
    async fn test_load_engine_missing_library() {
        let config = EngineConfig::with_library_path("/nonexistent/libpdfium.so")
            .search_dirs(vec![])
            .use_system_library(false);

        let err = load_engine(config).await.unwrap_err();
        match err {
            ConversionError::EngineLoad(msg) => assert!(msg.contains("/nonexistent")),
            other => panic!("Expected EngineLoad, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_engine_loader_retries_after_failure() {
        let config = EngineConfig::with_library_path("/nonexistent/libpdfium.so")
            .search_dirs(vec![])
            .use_system_library(false);
        let loader = engine_loader(config);

        assert!(loader.acquire().await.is_err());
        assert!(loader.acquire().await.is_err());
        assert_eq!(loader.attempts(), 2);
        assert_eq!(loader.state_name(), "unloaded");
    }

    // The only test in this binary that touches the process-wide globals.
    #[test]
    fn test_configure_global_engine_after_loader_is_rejected() {
        let loader = global_engine_loader();
        let decided = global_engine_config().unwrap().clone();
        assert_eq!(decided, EngineConfig::default());

        let custom = EngineConfig::default().library_dir("/opt/pdfium/lib");
        assert!(configure_global_engine(custom.clone()).is_err());
        assert!(configure_global_engine(custom).is_err());

        // The loader keeps the config it was created with.
        assert!(std::ptr::eq(loader, global_engine_loader()));
        assert_eq!(global_engine_config(), Some(&decided));
    }

    #[test]
    fn test_configure_global_engine_rejects_invalid_config() {
        let config = EngineConfig::default()
            .search_dirs(vec![])
            .use_system_library(false);
        assert!(matches!(
            configure_global_engine(config),
            Err(ConversionError::InvalidConfig(_))
        ));
    }
}
