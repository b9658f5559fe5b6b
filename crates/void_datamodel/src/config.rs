//! Session configuration
//!
//! Loaded from TOML; every field is optional.
//!
//! ```toml
//! undo_limit = 50
//! project_extension = "vproj"
//! compact_prefab_instances = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a data model session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataModelConfig {
    /// Maximum undo entries; 0 keeps everything
    pub undo_limit: usize,
    /// Extension of project files, without the dot
    pub project_extension: String,
    /// Drop reconstructible prefab instance content when saving
    pub compact_prefab_instances: bool,
    /// Write files synthesised by migration next to the loaded project
    pub write_migration_files: bool,
    pub file_watch_debounce_ms: u64,
}

impl Default for DataModelConfig {
    fn default() -> Self {
        Self {
            undo_limit: 100,
            project_extension: "vproj".to_string(),
            compact_prefab_instances: true,
            write_migration_files: true,
            file_watch_debounce_ms: 100,
        }
    }
}

impl DataModelConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded data model config from {:?}", path);
        Ok(config)
    }

    pub fn file_watch_debounce(&self) -> Duration {
        Duration::from_millis(self.file_watch_debounce_ms)
    }

    /// Whether `path` has the project extension
    pub fn is_project_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.project_extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = DataModelConfig::from_toml_str("undo_limit = 5").unwrap();
        assert_eq!(config.undo_limit, 5);
        assert_eq!(config.project_extension, "vproj");
        assert!(config.compact_prefab_instances);
        assert_eq!(config.file_watch_debounce(), Duration::from_millis(100));
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(DataModelConfig::from_toml_str("undo_limit = \"many\"").is_err());
    }

    #[test]
    fn test_extension_check() {
        let config = DataModelConfig::default();
        assert!(config.is_project_file(Path::new("a/b.vproj")));
        assert!(config.is_project_file(Path::new("b.VPROJ")));
        assert!(!config.is_project_file(Path::new("b.json")));
        assert!(!config.is_project_file(Path::new("vproj")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datamodel.toml");
        std::fs::write(&path, "compact_prefab_instances = false\n").unwrap();
        let config = DataModelConfig::load(&path).unwrap();
        assert!(!config.compact_prefab_instances);
        assert!(DataModelConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
