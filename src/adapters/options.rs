use serde_json::Value as JsonValue;

use super::args::OptionsMap;
use crate::config::DatabaseDefaults;

/// Normalized options handed to a [`ConnectionFactory`](super::ConnectionFactory).
///
/// `map` is exactly what the caller asked for (after normalization);
/// `defaults` carries the process-wide database settings in effect when the
/// request was made.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    map: OptionsMap,
    defaults: DatabaseDefaults,
}

impl ConnectOptions {
    #[must_use]
    pub fn new(map: OptionsMap, defaults: DatabaseDefaults) -> Self {
        Self { map, defaults }
    }

    #[must_use]
    pub fn adapter(&self) -> Option<&str> {
        self.get_str("adapter")
    }

    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.get_str("database")
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.map.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(JsonValue::as_str)
    }

    /// Integer option, accepting both JSON numbers and numeric strings.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.map.get(key)? {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean option, accepting JSON booleans and `"true"`/`"false"` strings.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.map.get(key)? {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> &OptionsMap {
        &self.map
    }

    #[must_use]
    pub fn into_map(self) -> OptionsMap {
        self.map
    }

    #[must_use]
    pub fn defaults(&self) -> &DatabaseDefaults {
        &self.defaults
    }
}
