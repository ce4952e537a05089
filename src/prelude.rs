//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::adapters::mock::{MockConnection, MockFactory};
pub use crate::adapters::{
    ADAPTERS, AdapterDispatcher, AdapterRegistry, AdapterRequest, ConnectArg, ConnectOptions,
    ConnectionFactory, OptionsMap, normalize_args, parse_connection_url,
};
pub use crate::config::{
    DatabaseDefaults, IdentifierCase, Settings, SettingsSnapshot, TemporalKind, Timezone,
};
pub use crate::error::{DomainError, ErrorKind, translate};
pub use crate::loader::{ReentrantLoader, UnitInit, UnitRegistry};
pub use crate::temporal::{DateTimeValue, TemporalConverter, TemporalParseError};
pub use crate::toolkit::{BootstrapOptions, NO_CORE_EXTENSIONS_ENV, Toolkit};

#[cfg(feature = "sqlite")]
pub use crate::adapters::sqlite::SqliteFactory;
