//! Common utilities shared across arbor crates.
//!
//! - [`ansi`]: terminal color detection and the styles used by help output
//! - [`config_loader`]: YAML configuration file loading
//! - [`env_overrides`]: `<APP>_<KEY>` environment variable overrides

pub mod ansi;
pub mod config_loader;
pub mod env_overrides;

pub use ansi::{ColorChoice, should_colorize, strip_ansi_codes};
pub use config_loader::{ConfigLoadError, ConfigLoader, NoConfig, StaticConfig, YamlConfigLoader};
pub use env_overrides::{EnvLoader, EnvOverrides, env_prefix, parse_value};

/// Flat key/value mapping used for configuration and raw flags.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Merge `layers` left to right; keys in later layers win.
pub fn merge_layers<'a>(layers: impl IntoIterator<Item = &'a ConfigMap>) -> ConfigMap {
    let mut merged = ConfigMap::new();
    for layer in layers {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
