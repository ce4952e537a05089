//! The explicit context every component hangs off.

use std::ffi::OsString;
use std::sync::{LazyLock, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::adapters::{AdapterDispatcher, AdapterRegistry};
use crate::config::Settings;
use crate::error::Result;
use crate::loader::units::EXTENSIONS_DIR;
use crate::loader::{ReentrantLoader, UnitRegistry};
use crate::temporal::TemporalConverter;

/// Environment variable that, when present at bootstrap, skips loading the
/// `core_compat` extension.
pub const NO_CORE_EXTENSIONS_ENV: &str = "SQL_BOOTSTRAP_NO_CORE_EXTENSIONS";

/// Start-up choices made once, before the toolkit is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOptions {
    pub core_extensions: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            core_extensions: true,
        }
    }
}

impl BootstrapOptions {
    /// Read [`NO_CORE_EXTENSIONS_ENV`] from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var_os(NO_CORE_EXTENSIONS_ENV))
    }

    /// Options as if [`NO_CORE_EXTENSIONS_ENV`] had the given value; any
    /// value, even an empty one, disables the core extensions.
    #[must_use]
    pub fn from_env_value(value: Option<OsString>) -> Self {
        Self {
            core_extensions: value.is_none(),
        }
    }
}

/// Settings, load guard, unit registry and adapter registry for one process
/// (or one test).
///
/// ```rust
/// use sql_bootstrap::prelude::*;
///
/// let toolkit = Toolkit::bootstrap_with(BootstrapOptions::default())?;
/// assert!(toolkit.units().is_loaded("extensions/core_compat"));
/// assert_eq!(toolkit.registry().resolve("postgresql"), Some("postgres"));
/// # Ok::<(), DomainError>(())
/// ```
#[derive(Debug)]
pub struct Toolkit {
    settings: Settings,
    loader: ReentrantLoader,
    units: UnitRegistry,
    registry: AdapterRegistry,
    sync: Mutex<()>,
}

impl Default for Toolkit {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: LazyLock<Toolkit> = LazyLock::new(|| {
    let toolkit = Toolkit::new();
    if let Err(err) = toolkit.init(BootstrapOptions::from_env()) {
        warn!(error = %err, "global toolkit bootstrap failed");
    }
    toolkit
});

impl Toolkit {
    /// A toolkit with default settings and built-in units registered but
    /// nothing loaded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(Settings::new())
    }

    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            loader: ReentrantLoader::new(),
            units: UnitRegistry::with_builtin_units(),
            registry: AdapterRegistry::new(),
            sync: Mutex::new(()),
        }
    }

    /// A new toolkit with start-up extensions loaded per the environment.
    ///
    /// # Errors
    ///
    /// Returns a `Load` error if a start-up extension fails.
    pub fn bootstrap() -> Result<Self> {
        Self::bootstrap_with(BootstrapOptions::from_env())
    }

    /// # Errors
    ///
    /// Returns a `Load` error if a start-up extension fails.
    pub fn bootstrap_with(options: BootstrapOptions) -> Result<Self> {
        let toolkit = Self::new();
        toolkit.init(options)?;
        Ok(toolkit)
    }

    /// Process-wide toolkit, bootstrapped from the environment on first use.
    #[must_use]
    pub fn global() -> &'static Toolkit {
        &GLOBAL
    }

    /// Load start-up extensions.
    ///
    /// # Errors
    ///
    /// Returns a `Load` error if a start-up extension fails.
    pub fn init(&self, options: BootstrapOptions) -> Result<()> {
        if options.core_extensions {
            self.extension(&["core_compat"])?;
        } else {
            info!(env = NO_CORE_EXTENSIONS_ENV, "core extensions disabled");
        }
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn loader(&self) -> &ReentrantLoader {
        &self.loader
    }

    #[must_use]
    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    #[must_use]
    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    #[must_use]
    pub fn adapters(&self) -> AdapterDispatcher<'_> {
        AdapterDispatcher::new(self)
    }

    /// Converter bound to the settings in effect right now.
    #[must_use]
    pub fn temporal(&self) -> TemporalConverter {
        TemporalConverter::new(self.settings.snapshot())
    }

    /// Load a unit once, under the reentrant load guard.
    ///
    /// Unit initializers may call `require` themselves.
    ///
    /// # Errors
    ///
    /// Returns a `Load` error for an unknown unit or a failing initializer.
    pub fn require(&self, unit: &str) -> Result<()> {
        self.loader
            .guarded_load(unit, || self.units.load(self, unit))
    }

    /// Require several units in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`require`](Self::require).
    pub fn require_all(&self, units: &[&str]) -> Result<()> {
        units.iter().try_for_each(|unit| self.require(unit))
    }

    /// Load optional extensions by name (`extensions/<name>`).
    ///
    /// # Errors
    ///
    /// See [`require`](Self::require).
    pub fn extension(&self, names: &[&str]) -> Result<()> {
        names
            .iter()
            .try_for_each(|name| self.require(&format!("{EXTENSIONS_DIR}/{name}")))
    }

    /// Run `body` under the process-wide mutex, or directly when the
    /// `single_threaded` setting is on. The mutex is not reentrant.
    pub fn synchronize<R>(&self, body: impl FnOnce() -> R) -> R {
        if self.settings.single_threaded() {
            return body();
        }
        let _guard = self.sync.lock().unwrap_or_else(PoisonError::into_inner);
        body()
    }
}

/// `extensions/core_compat`: legacy adapter names still found in
/// configuration files and connection URLs.
pub(crate) fn core_compat(toolkit: &Toolkit) -> Result<()> {
    const ALIASES: [(&str, &str); 5] = [
        ("postgresql", "postgres"),
        ("pg", "postgres"),
        ("sqlite3", "sqlite"),
        ("mariadb", "mysql2"),
        ("sqlserver", "tinytds"),
    ];
    for (alias, adapter) in ALIASES {
        toolkit.registry().alias(alias, adapter)?;
    }
    debug!(count = ALIASES.len(), "core_compat aliases registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainError, ErrorKind};

    #[test]
    fn env_value_controls_core_extensions() {
        assert!(BootstrapOptions::from_env_value(None).core_extensions);
        assert!(!BootstrapOptions::from_env_value(Some(OsString::from("1"))).core_extensions);
        assert!(!BootstrapOptions::from_env_value(Some(OsString::new())).core_extensions);
    }

    #[test]
    fn bootstrap_respects_options() {
        let with = Toolkit::bootstrap_with(BootstrapOptions::default()).unwrap();
        assert_eq!(with.registry().resolve("sqlite3"), Some("sqlite"));

        let without = Toolkit::bootstrap_with(BootstrapOptions {
            core_extensions: false,
        })
        .unwrap();
        assert_eq!(without.registry().resolve("postgresql"), None);
        assert!(!without.units().is_loaded("extensions/core_compat"));
    }

    #[test]
    fn unknown_extension() {
        let err = Toolkit::new().extension(&["nope"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Load);
    }

    #[test]
    fn synchronize_runs_body() {
        let toolkit = Toolkit::new();
        assert_eq!(toolkit.synchronize(|| 1 + 1), 2);
        toolkit.settings().set_single_threaded(true);
        let res: Result<(), DomainError> = toolkit.synchronize(|| Err(DomainError::generic("x")));
        assert!(res.is_err());
    }
}
