//! Adapter dispatch: turn `(adapter, args)` into normalized options and
//! hand them to a [`ConnectionFactory`].

pub mod args;
pub mod factory;
pub mod mock;
pub mod options;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod url;

pub use args::{AdapterRequest, ConnectArg, OptionsMap, normalize_args};
pub use factory::ConnectionFactory;
pub use options::ConnectOptions;
pub use self::url::{ParsedUrl, parse_connection_url};

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{DomainError, Result};
use crate::loader::units::ADAPTERS_DIR;
use crate::toolkit::Toolkit;
use factory::ScopedHandle;

/// Adapters whose database is a file path rather than a server-side name.
pub const FILE_BASED_ADAPTERS: &[&str] = &["amalgalite", "sqlite"];

/// Known adapter names plus aliases registered at runtime.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    aliases: RwLock<HashMap<String, &'static str>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical adapter name for `name`, following aliases.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        ADAPTERS.iter().copied().find(|known| *known == name).or_else(|| {
            self.aliases
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .copied()
        })
    }

    /// Make `alias` resolve to the known adapter `target`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterNotFound` if `target` is not a known adapter.
    pub fn alias(&self, alias: impl Into<String>, target: &str) -> Result<()> {
        let canonical = ADAPTERS
            .iter()
            .copied()
            .find(|known| *known == target)
            .ok_or_else(|| DomainError::adapter_not_found(target))?;
        let alias = alias.into();
        debug!(alias = %alias, adapter = canonical, "registering adapter alias");
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(alias, canonical);
        Ok(())
    }

    #[must_use]
    pub fn aliases(&self) -> Vec<(String, &'static str)> {
        let mut aliases: Vec<_> = self
            .aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(alias, target)| (alias.clone(), *target))
            .collect();
        aliases.sort();
        aliases
    }
}

/// Connect calls bound to one [`Toolkit`].
///
/// ```rust
/// use sql_bootstrap::prelude::*;
/// use serde_json::json;
///
/// let toolkit = Toolkit::new();
/// let factory = MockFactory::new();
/// let conn = toolkit
///     .adapters()
///     .sqlite(&factory, &["blog.db".into(), json!({"max_connections": 10}).into()])?;
/// assert_eq!(conn.options().database(), Some("blog.db"));
/// assert_eq!(conn.options().get_i64("max_connections"), Some(10));
/// # Ok::<(), DomainError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AdapterDispatcher<'t> {
    toolkit: &'t Toolkit,
}

impl<'t> AdapterDispatcher<'t> {
    #[must_use]
    pub fn new(toolkit: &'t Toolkit) -> Self {
        Self { toolkit }
    }

    /// Normalize arguments and resolve the adapter without connecting.
    ///
    /// The `adapter` entry of the result is the canonical adapter name even
    /// when an alias was used or the caller's options overrode it.
    ///
    /// # Errors
    ///
    /// `Argument` for malformed arguments, `AdapterNotFound` when the final
    /// adapter entry does not name a registered adapter.
    pub fn request(&self, adapter: &str, args: &[ConnectArg]) -> Result<ConnectOptions> {
        let mut map = normalize_args(adapter, args)?;
        let named = match map.get("adapter") {
            Some(JsonValue::String(name)) => name.clone(),
            Some(other) => return Err(DomainError::adapter_not_found(&other.to_string())),
            None => return Err(DomainError::adapter_not_found("(none)")),
        };
        let canonical = self
            .toolkit
            .registry()
            .resolve(&named)
            .ok_or_else(|| DomainError::adapter_not_found(&named))?;
        map.insert("adapter".into(), JsonValue::String(canonical.to_string()));

        let defaults = self.toolkit.settings().snapshot().database_defaults();
        Ok(ConnectOptions::new(map, defaults))
    }

    /// Connect through `factory` with the given adapter and arguments.
    ///
    /// If an `adapters/<name>` support unit is registered it is required
    /// first, under the load guard.
    ///
    /// # Errors
    ///
    /// Errors from [`request`](Self::request), from loading the support unit,
    /// or from the factory.
    pub fn connect<F: ConnectionFactory>(
        &self,
        factory: &F,
        adapter: &str,
        args: &[ConnectArg],
    ) -> Result<F::Handle> {
        let options = self.request(adapter, args)?;
        let canonical = options.adapter().unwrap_or(adapter).to_string();

        let unit = format!("{ADAPTERS_DIR}/{canonical}");
        if self.toolkit.units().contains(&unit) {
            self.toolkit.require(&unit)?;
        }

        debug!(adapter = %canonical, database = ?options.database(), "creating connection");
        factory.create(&options)
    }

    /// Connect, pass the handle to `callback`, then destroy the handle.
    ///
    /// The handle is destroyed whether the callback succeeds, fails or
    /// panics. A teardown failure is returned only if the callback succeeded.
    ///
    /// # Errors
    ///
    /// Errors from [`connect`](Self::connect), the callback, or teardown.
    pub fn connect_with<F, T>(
        &self,
        factory: &F,
        adapter: &str,
        args: &[ConnectArg],
        callback: impl FnOnce(&mut F::Handle) -> Result<T>,
    ) -> Result<T>
    where
        F: ConnectionFactory,
    {
        let handle = self.connect(factory, adapter, args)?;
        let mut scoped = ScopedHandle::new(factory, handle);
        let value = scoped.with(callback)?;
        scoped.finish()?;
        Ok(value)
    }

    /// Connect using a URL such as `postgres://user@host/db?max_connections=4`.
    ///
    /// # Errors
    ///
    /// `Argument` for a malformed URL, otherwise as [`connect`](Self::connect).
    pub fn connect_url<F: ConnectionFactory>(&self, factory: &F, url: &str) -> Result<F::Handle> {
        let parsed = parse_connection_url(url)?;
        let adapter = self
            .toolkit
            .registry()
            .resolve(&parsed.scheme)
            .ok_or_else(|| DomainError::adapter_not_found(&parsed.scheme))?;
        let options = parsed.into_options(FILE_BASED_ADAPTERS.contains(&adapter));
        self.connect(factory, adapter, &[ConnectArg::Options(options)])
    }
}

macro_rules! adapter_entry_points {
    ($($name:ident),* $(,)?) => {
        /// Adapters that can be named in a connect call.
        pub const ADAPTERS: &[&str] = &[$(stringify!($name)),*];

        impl AdapterDispatcher<'_> {
            $(
                #[doc = concat!("Connect through the `", stringify!($name), "` adapter.")]
                ///
                /// # Errors
                ///
                /// See [`AdapterDispatcher::connect`].
                pub fn $name<F: ConnectionFactory>(
                    &self,
                    factory: &F,
                    args: &[ConnectArg],
                ) -> Result<F::Handle> {
                    self.connect(factory, stringify!($name), args)
                }
            )*
        }
    };
}

adapter_entry_points!(
    ado, amalgalite, ibmdb, jdbc, mock, mysql, mysql2, odbc, oracle, postgres, sqlanywhere,
    sqlite, tinytds, trilogy,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn resolves_known_names_and_aliases() {
        let registry = AdapterRegistry::new();
        assert_eq!(registry.resolve("sqlite"), Some("sqlite"));
        assert_eq!(registry.resolve("sqlite3"), None);
        registry.alias("sqlite3", "sqlite").unwrap();
        assert_eq!(registry.resolve("sqlite3"), Some("sqlite"));
        assert_eq!(registry.aliases(), [("sqlite3".to_string(), "sqlite")]);
    }

    #[test]
    fn alias_target_must_exist() {
        let err = AdapterRegistry::new().alias("pg", "pgsql").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AdapterNotFound);
    }

    #[test]
    fn entry_points_match_registry() {
        assert!(ADAPTERS.contains(&"sqlite"));
        assert!(ADAPTERS.contains(&"postgres"));
        assert!(ADAPTERS.windows(2).all(|w| w[0] < w[1]));
    }
}
