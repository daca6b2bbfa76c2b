use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::schema::{CategoryConfig, Config};
use crate::error::ConfigError;

/// Prefix of environment variables that override config values.
pub const ENV_PREFIX: &str = "PRODEX_";

/// Separates nested keys in override variable names:
/// `PRODEX_EXTRACTION__CHUNK_SIZE` targets `extraction.chunk_size`.
pub const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => Ok(ConfigFormat::Json),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(ext)),
        }
    }
}

/// `<config dir>/prodex/config.yaml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("prodex").join("config.yaml"))
}

/// Loads a config file, layering it over the defaults and applying
/// `PRODEX_*` environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = load_config_with_env(&content, format, std::env::vars())?;
    tracing::debug!(path = %crate::sanitize::redact_path(path), "Loaded configuration");
    Ok(config)
}

/// Parses a config document without consulting the environment.
pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    load_config_with_env(content, format, std::iter::empty())
}

/// Parses a config document and applies the given `(name, value)` overrides.
///
/// Variables without the `PRODEX_` prefix are ignored.
pub fn load_config_with_env<I>(
    content: &str,
    format: ConfigFormat,
    vars: I,
) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let overlay = parse_document(content, format)?;

    let mut tree = serde_json::to_value(Config::default())?;
    merge_values(&mut tree, overlay);
    apply_env_overrides(&mut tree, vars);

    let config: Config = serde_json::from_value(tree)?;
    validate_config(&config)?;

    Ok(config)
}

fn parse_document(content: &str, format: ConfigFormat) -> Result<Value, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = match format {
        ConfigFormat::Json => serde_json::from_str::<Value>(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str::<Value>(content)?,
    };

    // A YAML file holding only comments parses to null
    match value {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(value),
        _ => Err(ConfigError::Validation {
            message: "Config document must be a mapping at the top level".to_string(),
        }),
    }
}

/// Recursively merges `overlay` into `base`: nested maps merge key by key,
/// every other value replaces what was there.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides<I>(tree: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, raw) in vars {
        let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = rest
            .split(ENV_SEPARATOR)
            .map(|s| s.to_ascii_lowercase())
            .collect();
        if segments.iter().any(|s| s.is_empty()) {
            tracing::warn!(variable = %name, "Ignoring malformed config override");
            continue;
        }

        let path = segments.join(".");
        let value = coerce_env_value(&raw, value_at(tree, &path));
        tracing::debug!(path = %path, "Applying environment override");
        set_at(tree, &path, value);
    }
}

/// Types an override value. When the key already exists its current type
/// decides; otherwise booleans, integers and floats are recognised.
fn coerce_env_value(raw: &str, current: Option<&Value>) -> Value {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();

    let as_bool = || match lower.as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    };

    match current {
        Some(Value::Bool(_)) => {
            if let Some(b) = as_bool() {
                return Value::Bool(b);
            }
        }
        Some(Value::String(_)) => return Value::String(raw.to_string()),
        _ => {}
    }

    if lower == "true" || lower == "yes" {
        return Value::Bool(true);
    }
    if lower == "false" || lower == "no" {
        return Value::Bool(false);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

fn value_at<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(tree, |node, key| node.as_object()?.get(key))
}

/// Writes `value` at a dotted path, creating intermediate maps as needed.
fn set_at(tree: &mut Value, path: &str, value: Value) {
    let mut node = tree;
    let mut keys = path.split('.').peekable();

    while let Some(key) = keys.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if keys.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

impl Config {
    /// Reads a value by dotted path, e.g. `get("extraction.chunk_size")`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let tree = serde_json::to_value(self).ok()?;
        value_at(&tree, path).cloned()
    }

    /// Writes a value by dotted path. The config is left untouched when the
    /// result would not deserialize or fails validation.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), ConfigError> {
        let mut tree = serde_json::to_value(&*self)?;
        set_at(&mut tree, path, value);

        let updated: Config = serde_json::from_value(tree)?;
        validate_config(&updated)?;

        *self = updated;
        Ok(())
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let extraction = &config.extraction;

    if extraction.chunk_size == 0 {
        return Err(ConfigError::Validation {
            message: "extraction.chunk_size must be greater than 0".to_string(),
        });
    }
    if extraction.chunk_overlap >= extraction.chunk_size {
        return Err(ConfigError::Validation {
            message: format!(
                "extraction.chunk_overlap ({}) must be smaller than extraction.chunk_size ({})",
                extraction.chunk_overlap, extraction.chunk_size
            ),
        });
    }

    validate_category("compatibility", &extraction.compatibility)?;
    validate_category("technical", &extraction.technical)?;
    validate_category("faq", &extraction.faq)?;

    if config.general.max_workers == 0 {
        return Err(ConfigError::Validation {
            message: "general.max_workers must be at least 1".to_string(),
        });
    }

    Ok(())
}

fn validate_category(name: &str, category: &CategoryConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&category.threshold) {
        return Err(ConfigError::Validation {
            message: format!(
                "extraction.{}.threshold must be between 0 and 1, got {}",
                name, category.threshold
            ),
        });
    }
    Ok(())
}
