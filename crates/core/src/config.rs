//! Configuration types for pdf2img.

use crate::error::{ConversionError, Result};
use pdfium_render::prelude::Pdfium;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where to look for the pdfium shared library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Exact path to the pdfium library, tried before anything else.
    pub library_path: Option<PathBuf>,

    /// Directories searched in order for the platform library name
    /// (`libpdfium.so`, `libpdfium.dylib` or `pdfium.dll`).
    /// Default: `./`, `/usr/lib`, `/usr/local/lib`.
    pub search_dirs: Vec<PathBuf>,

    /// Fall back to the system library search path when nothing else binds.
    /// Default: true.
    pub use_system_library: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            search_dirs: vec![
                PathBuf::from("./"),
                PathBuf::from("/usr/lib"),
                PathBuf::from("/usr/local/lib"),
            ],
            use_system_library: true,
        }
    }
}

impl EngineConfig {
    /// Create a config that binds exactly the given library file.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Search `dir` before the default directories.
    pub fn library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.insert(0, dir.into());
        self
    }

    /// Replace the searched directories.
    pub fn search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Enable or disable the system library fallback.
    pub fn use_system_library(mut self, enabled: bool) -> Self {
        self.use_system_library = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.library_path.is_none() && self.search_dirs.is_empty() && !self.use_system_library
        {
            return Err(ConversionError::InvalidConfig(
                "no library_path, search_dirs or system library fallback configured".to_string(),
            ));
        }
        if let Some(path) = &self.library_path {
            if path.as_os_str().is_empty() {
                return Err(ConversionError::InvalidConfig(
                    "library_path must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Library locations to try, in order. Does not include the system fallback.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        self.library_path
            .iter()
            .cloned()
            .chain(
                self.search_dirs
                    .iter()
                    .map(|dir| Pdfium::pdfium_platform_library_name_at_path(dir)),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert!(config.library_path.is_none());
        assert_eq!(config.search_dirs.len(), 3);
        assert_eq!(config.search_dirs[0], PathBuf::from("./"));
        assert!(config.use_system_library);
    }

    #[test]
    fn test_engine_config_builder_pattern() {
        let config = EngineConfig::default()
            .library_dir("/opt/pdfium/lib")
            .use_system_library(false);

        assert_eq!(config.search_dirs[0], PathBuf::from("/opt/pdfium/lib"));
        assert_eq!(config.search_dirs.len(), 4);
        assert!(!config.use_system_library);
    }

    #[test]
    fn test_candidate_paths_order() {
        let config = EngineConfig::with_library_path("/custom/libpdfium.so")
            .search_dirs(vec![PathBuf::from("/a"), PathBuf::from("/b")]);

        let paths = config.candidate_paths();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], PathBuf::from("/custom/libpdfium.so"));
        assert!(paths[1].starts_with("/a"));
        assert!(paths[2].starts_with("/b"));
        assert_ne!(paths[1], PathBuf::from("/a"));
    }

    #[test]
    fn test_engine_config_validation_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_engine_config_validation_nothing_to_try() {
        let config = EngineConfig::default()
            .search_dirs(vec![])
            .use_system_library(false);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config_validation_empty_library_path() {
        let config = EngineConfig::with_library_path("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config_serde() {
        let config = EngineConfig::with_library_path("/opt/libpdfium.so");
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
