//! Bootstrap and coordination layer for a SQL access toolkit.
//!
//! - [`config`]: process-wide settings
//! - [`error`]: the typed [`DomainError`] and [`translate`](error::translate)
//! - [`loader`]: reentrant load guard and the unit/extension registry
//! - [`adapters`]: argument normalization and dispatch to connection factories
//! - [`temporal`]: string to date/time conversion
//! - [`toolkit`]: the [`Toolkit`] context tying them together
//!
//! ```rust
//! use sql_bootstrap::prelude::*;
//!
//! let toolkit = Toolkit::new();
//! let factory = MockFactory::new();
//! let total = toolkit.adapters().connect_with(&factory, "sqlite", &["blog.db".into()], |conn| {
//!     Ok(conn.options().as_map().len())
//! })?;
//! assert_eq!(total, 2);
//! assert_eq!(factory.destroyed_count(), 1);
//! # Ok::<(), DomainError>(())
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod loader;
pub mod prelude;
pub mod temporal;
pub mod toolkit;

pub use error::{DomainError, ErrorKind, Result};
pub use toolkit::Toolkit;
