use serde_json::{Map, Value as JsonValue};

use crate::error::{DomainError, Result};

pub(crate) const WRONG_NUMBER_OF_ARGUMENTS: &str = "Wrong number of arguments, 0-2 arguments valid";
pub(crate) const WRONG_FORMAT_OF_ARGUMENTS: &str =
    "Wrong format of arguments, either use (), (String), (Hash), or (String, Hash)";

/// Options map passed to a connection factory.
pub type OptionsMap = Map<String, JsonValue>;

/// One positional argument of a connect call.
///
/// Accepted shapes are `()`, `(Database)`, `(Options)` and
/// `(Database, Options)`. `Nil` stands for an absent argument and is skipped
/// wherever it appears; `Other` is always rejected.
///
/// ```rust
/// use sql_bootstrap::adapters::ConnectArg;
/// use serde_json::json;
///
/// assert_eq!(ConnectArg::from("blog.db"), ConnectArg::Database("blog.db".into()));
/// assert!(matches!(ConnectArg::from(json!({"max_connections": 10})), ConnectArg::Options(_)));
/// assert_eq!(ConnectArg::from(json!(null)), ConnectArg::Nil);
/// assert_eq!(ConnectArg::from(json!(42)), ConnectArg::Other(json!(42)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectArg {
    /// Database name (file path for file-based backends).
    Database(String),
    /// Option entries merged into the request.
    Options(OptionsMap),
    /// Absent argument.
    Nil,
    /// Any other value; always a format error.
    Other(JsonValue),
}

impl From<&str> for ConnectArg {
    fn from(value: &str) -> Self {
        ConnectArg::Database(value.to_string())
    }
}

impl From<String> for ConnectArg {
    fn from(value: String) -> Self {
        ConnectArg::Database(value)
    }
}

impl From<OptionsMap> for ConnectArg {
    fn from(value: OptionsMap) -> Self {
        ConnectArg::Options(value)
    }
}

impl From<()> for ConnectArg {
    fn from((): ()) -> Self {
        ConnectArg::Nil
    }
}

impl<T: Into<ConnectArg>> From<Option<T>> for ConnectArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(ConnectArg::Nil, Into::into)
    }
}

impl From<JsonValue> for ConnectArg {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::String(s) => ConnectArg::Database(s),
            JsonValue::Object(map) => ConnectArg::Options(map),
            JsonValue::Null => ConnectArg::Nil,
            other => ConnectArg::Other(other),
        }
    }
}

/// A connect call after argument validation, before it is handed to a factory.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterRequest {
    pub adapter: String,
    pub database: Option<String>,
    pub options: OptionsMap,
}

impl AdapterRequest {
    /// Validate the positional arguments of a connect call.
    ///
    /// # Errors
    ///
    /// Returns an `Argument` error for more than two arguments or for any
    /// shape other than `()`, `(Database)`, `(Options)`, `(Database, Options)`.
    pub fn from_args(adapter: &str, args: &[ConnectArg]) -> Result<Self> {
        if args.len() > 2 {
            return Err(DomainError::argument(WRONG_NUMBER_OF_ARGUMENTS));
        }

        let mut rest = args;
        let mut database = None;
        match rest.first() {
            Some(ConnectArg::Database(name)) => {
                database = Some(name.clone());
                rest = &rest[1..];
            }
            Some(ConnectArg::Nil) => rest = &rest[1..],
            _ => {}
        }

        let mut options = OptionsMap::new();
        if let Some((next, leftover)) = rest.split_first() {
            match next {
                ConnectArg::Options(map) => {
                    options.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                ConnectArg::Nil => {}
                ConnectArg::Database(_) | ConnectArg::Other(_) => {
                    return Err(DomainError::argument(WRONG_FORMAT_OF_ARGUMENTS));
                }
            }
            if leftover.iter().any(|arg| *arg != ConnectArg::Nil) {
                return Err(DomainError::argument(WRONG_FORMAT_OF_ARGUMENTS));
            }
        }

        Ok(Self {
            adapter: adapter.to_string(),
            database,
            options,
        })
    }

    /// Flatten into the options map: `adapter`, then `database`, then the
    /// caller's entries, later keys overwriting earlier ones.
    #[must_use]
    pub fn into_options(self) -> OptionsMap {
        let mut map = OptionsMap::new();
        map.insert("adapter".into(), JsonValue::String(self.adapter));
        if let Some(database) = self.database {
            map.insert("database".into(), JsonValue::String(database));
        }
        map.extend(self.options);
        map
    }
}

/// Normalize `(adapter, args)` into the options map a factory receives.
///
/// # Errors
///
/// See [`AdapterRequest::from_args`].
pub fn normalize_args(adapter: &str, args: &[ConnectArg]) -> Result<OptionsMap> {
    AdapterRequest::from_args(adapter, args).map(AdapterRequest::into_options)
}
