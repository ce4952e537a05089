use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::{DomainError, ErrorKind, Result, translate};
use crate::toolkit::Toolkit;

/// Initializer run the first time a unit is required.
pub type UnitInit = fn(&Toolkit) -> Result<()>;

/// Directory-like prefix for optional extensions.
pub const EXTENSIONS_DIR: &str = "extensions";
/// Directory-like prefix for adapter support units.
pub const ADAPTERS_DIR: &str = "adapters";

/// Named units of code that can be loaded once per toolkit.
///
/// Unit names are relative paths such as `extensions/core_compat` or
/// `adapters/sqlite`. Loading goes through [`Toolkit::require`], which wraps
/// [`UnitRegistry::load`] in the reentrant load guard.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: RwLock<HashMap<String, UnitInit>>,
    loaded: Mutex<HashSet<String>>,
}

impl UnitRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the units shipped with this crate.
    #[must_use]
    pub fn with_builtin_units() -> Self {
        let registry = Self::new();
        registry.register(
            format!("{EXTENSIONS_DIR}/core_compat"),
            crate::toolkit::core_compat,
        );
        registry
    }

    /// Add or replace a unit. Replacing a unit that was already loaded does
    /// not load it again.
    pub fn register(&self, name: impl Into<String>, init: UnitInit) {
        let name = name.into();
        debug!(unit = %name, "registering unit");
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, init);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded_set().contains(name)
    }

    /// Names of every registered unit, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Run the unit's initializer unless it is already loaded (or loading).
    ///
    /// Callers are expected to hold the load guard; [`Toolkit::require`]
    /// does this. A unit is marked before its initializer runs so that a
    /// cycle of requires terminates, and unmarked again if the initializer
    /// fails so a later call can retry.
    ///
    /// # Errors
    ///
    /// Returns a `Load` error if the unit is unknown or its initializer fails.
    pub fn load(&self, toolkit: &Toolkit, name: &str) -> Result<()> {
        let init = self
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .ok_or_else(|| DomainError::load(format!("cannot load such unit -- {name}")))?;

        if !self.loaded_set().insert(name.to_string()) {
            return Ok(());
        }

        debug!(unit = name, "loading unit");
        match init(toolkit) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(unit = name, error = %err, "unit failed to load");
                self.loaded_set().remove(name);
                Err(translate(err, ErrorKind::Load))
            }
        }
    }

    fn loaded_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
