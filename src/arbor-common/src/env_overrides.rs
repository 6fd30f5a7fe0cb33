//! Environment variable configuration overrides.
//!
//! Variables named `<PREFIX>_<KEY>` become the lowercase key `<key>`, so
//! `DEMO_DRY_RUN=true` yields `dry_run: true`.

use serde_json::Value;

use crate::ConfigMap;

/// Source of the environment configuration layer.
pub trait EnvLoader: Send + Sync {
    /// Collect overrides for variables starting with `<prefix>_`.
    fn load(&self, prefix: &str) -> ConfigMap;
}

/// Reads overrides from the process environment, or from a fixed set of
/// variables when built with [`EnvOverrides::from_vars`].
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    vars: Option<Vec<(String, String)>>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given variables instead of the process environment.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl EnvLoader for EnvOverrides {
    fn load(&self, prefix: &str) -> ConfigMap {
        let vars: Vec<(String, String)> = match &self.vars {
            Some(vars) => vars.clone(),
            None => std::env::vars_os()
                .filter_map(|(name, value)| {
                    let name = name.into_string().ok()?;
                    Some((name, value.to_string_lossy().into_owned()))
                })
                .collect(),
        };

        let marker = format!("{prefix}_");
        let mut map = ConfigMap::new();
        for (name, raw) in vars {
            let Some(key) = name.strip_prefix(&marker) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            map.insert(key.to_ascii_lowercase(), parse_value(&raw));
        }
        map
    }
}

/// Environment prefix for an application name: `my-app` becomes `MY_APP`.
pub fn env_prefix(app_name: &str) -> String {
    app_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Parse a raw string into a boolean, integer, float or string value.
pub fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else if let Ok(num) = trimmed.parse::<i64>() {
        Value::from(num)
    } else if let Some(num) = trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .and_then(serde_json::Number::from_f64)
    {
        Value::Number(num)
    } else {
        Value::String(raw.to_string())
    }
}
