//! Configuration file loading.
//!
//! The dispatch pipeline only needs a flat key/value map; a missing or broken
//! file must never abort a run, so [`ConfigLoader::load`] swallows errors and
//! logs them instead. [`YamlConfigLoader::try_load`] exposes the error for
//! callers that want it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::ConfigMap;

/// Errors that can occur when reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// IO error reading the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed but its top level is not a mapping.
    #[error("Configuration in {0:?} is not a mapping")]
    NotAMapping(PathBuf),
}

/// Source of the lowest-precedence configuration layer.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// Load the configuration for `app_name`.
    ///
    /// `explicit_path` comes from `--config`. Failures yield an empty map.
    async fn load(&self, app_name: &str, explicit_path: Option<&Path>) -> ConfigMap;
}

/// Loads `config.yaml` from the platform config directory or an explicit path.
///
/// Default location: `<config_dir>/<app_name>/config.yaml`.
#[derive(Debug, Clone, Default)]
pub struct YamlConfigLoader {
    base_dir: Option<PathBuf>,
}

impl YamlConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `dir` instead of the platform config directory.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    /// Get the path the loader reads when no explicit path is given.
    pub fn default_path(&self, app_name: &str) -> Option<PathBuf> {
        self.base_dir
            .clone()
            .or_else(dirs::config_dir)
            .map(|dir| dir.join(app_name).join("config.yaml"))
    }

    /// Read and parse a single file.
    pub async fn try_load(&self, path: &Path) -> Result<ConfigMap, ConfigLoadError> {
        let content = fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(ConfigMap::new());
        }

        match serde_yaml::from_str::<serde_json::Value>(&content)? {
            serde_json::Value::Object(map) => Ok(map),
            serde_json::Value::Null => Ok(ConfigMap::new()),
            _ => Err(ConfigLoadError::NotAMapping(path.to_path_buf())),
        }
    }
}

#[async_trait]
impl ConfigLoader for YamlConfigLoader {
    async fn load(&self, app_name: &str, explicit_path: Option<&Path>) -> ConfigMap {
        let path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => match self.default_path(app_name) {
                Some(path) => path,
                None => return ConfigMap::new(),
            },
        };

        match self.try_load(&path).await {
            Ok(map) => {
                debug!("Loaded {} config keys from {:?}", map.len(), path);
                map
            }
            Err(ConfigLoadError::Io(e))
                if e.kind() == std::io::ErrorKind::NotFound && explicit_path.is_none() =>
            {
                debug!("Config file {:?} does not exist, skipping", path);
                ConfigMap::new()
            }
            Err(e) => {
                warn!("Ignoring config file {:?}: {}", path, e);
                ConfigMap::new()
            }
        }
    }
}

/// Loader that never contributes configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfig;

#[async_trait]
impl ConfigLoader for NoConfig {
    async fn load(&self, _app_name: &str, _explicit_path: Option<&Path>) -> ConfigMap {
        ConfigMap::new()
    }
}

/// Loader returning a fixed map, regardless of path.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub ConfigMap);

#[async_trait]
impl ConfigLoader for StaticConfig {
    async fn load(&self, _app_name: &str, _explicit_path: Option<&Path>) -> ConfigMap {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yaml");
        std::fs::write(&path, "name: Alice\nretries: 3\nnested:\n  key: value\n").unwrap();

        let loader = YamlConfigLoader::new();
        let map = loader.load("demo", Some(&path)).await;

        assert_eq!(map["name"], "Alice");
        assert_eq!(map["retries"], 3);
        assert_eq!(map["nested"]["key"], "value");
    }

    #[tokio::test]
    async fn test_load_default_location() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("demo")).unwrap();
        std::fs::write(temp.path().join("demo/config.yaml"), "region: eu\n").unwrap();

        let loader = YamlConfigLoader::with_base_dir(temp.path());
        let map = loader.load("demo", None).await;

        assert_eq!(map["region"], "eu");
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let loader = YamlConfigLoader::with_base_dir(temp.path());

        assert!(loader.load("demo", None).await.is_empty());
        let missing = temp.path().join("nope.yaml");
        assert!(loader.load("demo", Some(&missing)).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.yaml");
        std::fs::write(&path, "name: [unterminated\n").unwrap();

        let loader = YamlConfigLoader::new();
        assert!(loader.try_load(&path).await.is_err());
        assert!(loader.load("demo", Some(&path)).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_mapping_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("list.yaml");
        std::fs::write(&path, "- a\n- b\n").unwrap();

        let result = YamlConfigLoader::new().try_load(&path).await;
        assert!(matches!(result, Err(ConfigLoadError::NotAMapping(_))));
    }

    #[tokio::test]
    async fn test_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.yaml");
        std::fs::write(&path, "\n").unwrap();

        let map = YamlConfigLoader::new().try_load(&path).await.unwrap();
        assert!(map.is_empty());
    }
}
