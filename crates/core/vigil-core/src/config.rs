//! Configuration management for Vigil.
//!
//! Configuration is assembled from an ordered list of sources (files,
//! environment variables). Later sources override earlier ones key by key,
//! and the merged tree can be deserialized into any `serde` type.

use crate::{traits::Validatable, VigilError, VigilResult};
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, DeserializeOwned, IntoDeserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Trait for configuration sources
pub trait ConfigSource {
    /// Load configuration from this source
    fn load(&self) -> VigilResult<ConfigValue>;

    /// Get the source name
    fn source_name(&self) -> &str;
}

/// Configuration value that can hold different types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConfigValue {
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Array of values
    Array(Vec<ConfigValue>),
    /// Object/map of values
    Object(HashMap<String, ConfigValue>),
    /// Null value
    Null,
}

impl ConfigValue {
    /// Try to convert to string
    pub fn as_string(&self) -> VigilResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            _ => Err(VigilError::config("Value is not a string")),
        }
    }

    /// Try to convert to integer; strings are parsed
    pub fn as_integer(&self) -> VigilResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            ConfigValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| VigilError::config("Value is not an integer")),
            _ => Err(VigilError::config("Value is not an integer")),
        }
    }

    /// Try to convert to boolean; strings are parsed
    pub fn as_boolean(&self) -> VigilResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            ConfigValue::String(s) => {
                parse_bool(s).ok_or_else(|| VigilError::config("Value is not a boolean"))
            }
            _ => Err(VigilError::config("Value is not a boolean")),
        }
    }

    /// Try to convert to object
    pub fn as_object(&self) -> VigilResult<&HashMap<String, ConfigValue>> {
        match self {
            ConfigValue::Object(obj) => Ok(obj),
            _ => Err(VigilError::config("Value is not an object")),
        }
    }

    /// Check if value is null
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }
}

/// File-based configuration source
pub struct FileConfigSource {
    path: std::path::PathBuf,
    format: ConfigFormat,
    required: bool,
}

/// Supported configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl FileConfigSource {
    /// Create a new file config source
    pub fn new<P: AsRef<Path>>(path: P, format: ConfigFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            required: true,
        }
    }

    /// Auto-detect format from file extension
    pub fn auto_detect<P: AsRef<Path>>(path: P) -> VigilResult<Self> {
        let path = path.as_ref();
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("json") => ConfigFormat::Json,
            _ => {
                return Err(VigilError::config(
                    "Cannot detect config format from file extension",
                ))
            }
        };

        Ok(Self::new(path, format))
    }

    /// A missing optional file loads as an empty object instead of failing
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> VigilResult<ConfigValue> {
        if !self.required && !self.path.exists() {
            return Ok(ConfigValue::Object(HashMap::new()));
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| VigilError::config(format!("Failed to read config file: {e}")))?;

        match self.format {
            ConfigFormat::Toml => {
                let value: toml::Value = content
                    .parse()
                    .map_err(|e| VigilError::config(format!("Failed to parse TOML: {e}")))?;
                Ok(toml_value_to_config_value(value))
            }
            ConfigFormat::Json => {
                let value: serde_json::Value = serde_json::from_str(&content)
                    .map_err(|e| VigilError::config(format!("Failed to parse JSON: {e}")))?;
                Ok(json_value_to_config_value(value))
            }
        }
    }

    fn source_name(&self) -> &str {
        self.path.to_str().unwrap_or("unknown")
    }
}

/// Environment variable configuration source.
///
/// `PREFIX_QUEUE_CAPACITY=10` becomes the key `queue_capacity`. Values stay
/// strings and are converted to the target field's type on deserialization.
pub struct EnvConfigSource {
    prefix: String,
}

impl EnvConfigSource {
    /// Create a new environment config source with prefix
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ConfigSource for EnvConfigSource {
    fn load(&self) -> VigilResult<ConfigValue> {
        let mut config = HashMap::new();
        let prefix = self.prefix.trim_end_matches('_');

        for (key, value) in std::env::vars() {
            let Some(rest) = key.strip_prefix(prefix).and_then(|r| r.strip_prefix('_')) else {
                continue;
            };
            let config_key = rest.to_lowercase();
            if config_key.is_empty() {
                continue;
            }
            config.insert(config_key, ConfigValue::String(value));
        }

        Ok(ConfigValue::Object(config))
    }

    fn source_name(&self) -> &'static str {
        "environment"
    }
}

/// Configuration manager that combines multiple sources
pub struct ConfigManager {
    sources: Vec<Box<dyn ConfigSource>>,
    cache: Option<ConfigValue>,
}

impl ConfigManager {
    /// Create a new config manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            cache: None,
        }
    }

    /// Add a configuration source
    #[must_use]
    pub fn add_source<S: ConfigSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Load configuration from all sources
    pub fn load(&mut self) -> VigilResult<&ConfigValue> {
        let mut merged = ConfigValue::Object(HashMap::new());

        for source in &self.sources {
            let config = source.load().map_err(|e| {
                VigilError::config(format!("Failed to load from {}: {}", source.source_name(), e))
            })?;
            tracing::debug!(source = source.source_name(), "loaded configuration source");

            merged = merge_config_values(merged, config);
        }

        Ok(&*self.cache.insert(merged))
    }

    /// Get a configuration value by path (e.g., "delivery.max_retries")
    pub fn get(&self, path: &str) -> VigilResult<&ConfigValue> {
        let config = self
            .cache
            .as_ref()
            .ok_or_else(|| VigilError::config("Configuration not loaded"))?;

        get_config_value_by_path(config, path)
    }

    /// Deserialize the merged configuration into a typed value
    pub fn deserialize<T: DeserializeOwned>(&self) -> VigilResult<T> {
        let config = self
            .cache
            .clone()
            .ok_or_else(|| VigilError::config("Configuration not loaded"))?;

        T::deserialize(ValueDeserializer(config))
            .map_err(|e| VigilError::config(format!("Invalid configuration: {e}")))
    }

    /// Check if configuration is loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Validatable for ConfigManager {
    fn validate(&self) -> VigilResult<()> {
        if self.cache.is_none() {
            return Err(VigilError::config("Configuration not loaded"));
        }
        Ok(())
    }
}

fn toml_value_to_config_value(value: toml::Value) -> ConfigValue {
    match value {
        toml::Value::String(s) => ConfigValue::String(s),
        toml::Value::Integer(i) => ConfigValue::Integer(i),
        toml::Value::Float(f) => ConfigValue::Float(f),
        toml::Value::Boolean(b) => ConfigValue::Boolean(b),
        toml::Value::Array(arr) => {
            ConfigValue::Array(arr.into_iter().map(toml_value_to_config_value).collect())
        }
        toml::Value::Table(table) => ConfigValue::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_value_to_config_value(v)))
                .collect(),
        ),
        toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
    }
}

fn json_value_to_config_value(value: serde_json::Value) -> ConfigValue {
    match value {
        serde_json::Value::String(s) => ConfigValue::String(s),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ConfigValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                ConfigValue::Float(f)
            } else {
                ConfigValue::String(n.to_string())
            }
        }
        serde_json::Value::Bool(b) => ConfigValue::Boolean(b),
        serde_json::Value::Array(arr) => {
            ConfigValue::Array(arr.into_iter().map(json_value_to_config_value).collect())
        }
        serde_json::Value::Object(obj) => ConfigValue::Object(
            obj.into_iter()
                .map(|(k, v)| (k, json_value_to_config_value(v)))
                .collect(),
        ),
        serde_json::Value::Null => ConfigValue::Null,
    }
}

fn merge_config_values(base: ConfigValue, overlay: ConfigValue) -> ConfigValue {
    match (base, overlay) {
        (ConfigValue::Object(mut base_map), ConfigValue::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => merge_config_values(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            ConfigValue::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

fn get_config_value_by_path<'a>(
    config: &'a ConfigValue,
    path: &str,
) -> VigilResult<&'a ConfigValue> {
    let mut current = config;

    for part in path.split('.') {
        match current {
            ConfigValue::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| VigilError::config(format!("Path '{path}' not found")))?;
            }
            _ => {
                return Err(VigilError::config(format!(
                    "Cannot navigate path '{path}' on non-object value"
                )))
            }
        }
    }

    Ok(current)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

type DeError = de::value::Error;

/// Deserializer over a merged tree. String leaves are read as whatever
/// scalar the target field asks for, so environment values need no typing.
pub struct ValueDeserializer(ConfigValue);

impl<'de> IntoDeserializer<'de, DeError> for ConfigValue {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> ValueDeserializer {
        ValueDeserializer(self)
    }
}

macro_rules! parse_string_as {
    ($($method:ident => $visit:ident($ty:ty)),* $(,)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
            match self.0 {
                ConfigValue::String(s) => match s.trim().parse::<$ty>() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(_) => Err(de::Error::invalid_value(Unexpected::Str(&s), &visitor)),
                },
                other => ValueDeserializer(other).deserialize_any(visitor),
            }
        }
    )*};
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = DeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.0 {
            ConfigValue::String(s) => visitor.visit_string(s),
            ConfigValue::Integer(i) => visitor.visit_i64(i),
            ConfigValue::Float(f) => visitor.visit_f64(f),
            ConfigValue::Boolean(b) => visitor.visit_bool(b),
            ConfigValue::Array(items) => {
                let mut seq: SeqDeserializer<_, DeError> =
                    SeqDeserializer::new(items.into_iter());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            ConfigValue::Object(map) => {
                let mut map: MapDeserializer<'de, _, DeError> =
                    MapDeserializer::new(map.into_iter());
                let value = visitor.visit_map(&mut map)?;
                map.end()?;
                Ok(value)
            }
            ConfigValue::Null => visitor.visit_unit(),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.0 {
            ConfigValue::String(s) => match parse_bool(&s) {
                Some(b) => visitor.visit_bool(b),
                None => Err(de::Error::invalid_value(Unexpected::Str(&s), &visitor)),
            },
            other => ValueDeserializer(other).deserialize_any(visitor),
        }
    }

    parse_string_as! {
        deserialize_i8 => visit_i8(i8),
        deserialize_i16 => visit_i16(i16),
        deserialize_i32 => visit_i32(i32),
        deserialize_i64 => visit_i64(i64),
        deserialize_u8 => visit_u8(u8),
        deserialize_u16 => visit_u16(u16),
        deserialize_u32 => visit_u32(u32),
        deserialize_u64 => visit_u64(u64),
        deserialize_f32 => visit_f32(f32),
        deserialize_f64 => visit_f64(f64),
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.0 {
            ConfigValue::Integer(i) => visitor.visit_string(i.to_string()),
            ConfigValue::Float(f) => visitor.visit_string(f.to_string()),
            ConfigValue::Boolean(b) => visitor.visit_string(b.to_string()),
            other => ValueDeserializer(other).deserialize_any(visitor),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DeError> {
        match self.0 {
            ConfigValue::Null => visitor.visit_none(),
            other => visitor.visit_some(ValueDeserializer(other)),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DeError> {
        match self.0 {
            ConfigValue::String(s) => visitor.visit_enum(s.into_deserializer()),
            other => ValueDeserializer(other).deserialize_any(visitor),
        }
    }

    serde::forward_to_deserialize_any! {
        char bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_conversions() {
        let string_val = ConfigValue::String("test".to_string());
        assert_eq!(string_val.as_string().unwrap(), "test");
        assert!(string_val.as_integer().is_err());

        let bool_val = ConfigValue::Boolean(true);
        assert!(bool_val.as_boolean().unwrap());

        assert!(ConfigValue::Null.is_null());
    }

    #[test]
    fn test_string_leaves_take_the_field_type() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Target {
            name: String,
            count: u32,
            ratio: f64,
            enabled: bool,
            limit: Option<u64>,
        }

        let mut map = HashMap::new();
        map.insert("name".to_string(), ConfigValue::String("2024".to_string()));
        map.insert("count".to_string(), ConfigValue::String(" 7 ".to_string()));
        map.insert("ratio".to_string(), ConfigValue::String("0.5".to_string()));
        map.insert("enabled".to_string(), ConfigValue::String("TRUE".to_string()));
        map.insert("limit".to_string(), ConfigValue::String("10".to_string()));

        let target = Target::deserialize(ValueDeserializer(ConfigValue::Object(map))).unwrap();
        assert_eq!(
            target,
            Target {
                name: "2024".to_string(),
                count: 7,
                ratio: 0.5,
                enabled: true,
                limit: Some(10),
            }
        );
    }

    #[test]
    fn test_unparseable_string_is_rejected() {
        let mut map = HashMap::new();
        map.insert("count".to_string(), ConfigValue::String("lots".to_string()));

        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Target {
            count: u32,
        }
        assert!(Target::deserialize(ValueDeserializer(ConfigValue::Object(map))).is_err());
    }

    #[test]
    fn test_string_accessors_parse() {
        assert_eq!(ConfigValue::String("42".to_string()).as_integer().unwrap(), 42);
        assert!(ConfigValue::String("false".to_string()).as_boolean().is_ok_and(|b| !b));
        assert!(ConfigValue::String("nope".to_string()).as_integer().is_err());
    }

    #[test]
    fn test_config_path_navigation() {
        let mut inner_map = HashMap::new();
        inner_map.insert("max_retries".to_string(), ConfigValue::Integer(4));

        let mut outer_map = HashMap::new();
        outer_map.insert("delivery".to_string(), ConfigValue::Object(inner_map));

        let config = ConfigValue::Object(outer_map);

        let retries = get_config_value_by_path(&config, "delivery.max_retries").unwrap();
        assert_eq!(retries.as_integer().unwrap(), 4);

        assert!(get_config_value_by_path(&config, "delivery.pacing").is_err());
        assert!(get_config_value_by_path(&config, "nonexistent").is_err());
    }

    #[test]
    fn test_merge_overlay_wins() {
        let mut base = HashMap::new();
        base.insert("a".to_string(), ConfigValue::Integer(1));
        base.insert("b".to_string(), ConfigValue::Integer(2));
        let mut overlay = HashMap::new();
        overlay.insert("b".to_string(), ConfigValue::Integer(3));

        let merged = merge_config_values(ConfigValue::Object(base), ConfigValue::Object(overlay));
        let obj = merged.as_object().unwrap();
        assert_eq!(obj["a"], ConfigValue::Integer(1));
        assert_eq!(obj["b"], ConfigValue::Integer(3));
    }

    #[test]
    fn test_unloaded_manager_is_invalid() {
        let manager = ConfigManager::new();
        assert!(!manager.is_valid());
        assert!(manager.get("anything").is_err());
    }
}
