use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Shared handle to the failure a [`DomainError`] was translated from.
pub type SharedCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Classification carried by every [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or excessive arguments (connection dispatch, settings).
    Argument,
    /// A value could not be converted, e.g. a string that is not a date.
    InvalidValue,
    /// The requested adapter is not registered.
    AdapterNotFound,
    /// A unit or extension could not be loaded.
    Load,
    /// The connection factory failed to create or tear down a handle.
    Connection,
    /// Catch-all for failures without a more specific kind.
    Generic,
}

impl ErrorKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Argument => "ArgumentError",
            ErrorKind::InvalidValue => "InvalidValue",
            ErrorKind::AdapterNotFound => "AdapterNotFound",
            ErrorKind::Load => "LoadError",
            ErrorKind::Connection => "ConnectionError",
            ErrorKind::Generic => "Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed error returned by every fallible operation in this crate.
///
/// A `DomainError` is immutable once built. When it is produced by
/// [`translate`], `cause` holds the original failure and `trace` is the
/// backtrace of the first error in the chain, so it survives any number of
/// translation hops.
#[derive(Clone, Error)]
#[error("{message}")]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<SharedCause>,
    trace: Arc<Backtrace>,
}

impl DomainError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            trace: Arc::new(Backtrace::capture()),
        }
    }

    #[must_use]
    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Argument, message)
    }

    #[must_use]
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidValue, message)
    }

    #[must_use]
    pub fn adapter_not_found(adapter: &str) -> Self {
        Self::new(
            ErrorKind::AdapterNotFound,
            format!("Could not load {adapter} adapter: adapter is not registered"),
        )
    }

    #[must_use]
    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Load, message)
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    #[must_use]
    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The failure this error was translated from, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&SharedCause> {
        self.cause.as_ref()
    }

    /// Backtrace of the original failure. Only populated when backtraces are
    /// enabled (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`).
    #[must_use]
    pub fn trace(&self) -> &Backtrace {
        &self.trace
    }

    /// Follow `cause` links down to the first error of the chain.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    fn retag(self, target: ErrorKind) -> Self {
        Self {
            kind: target,
            message: format!("{}: {}", self.kind.name(), self.message),
            trace: Arc::clone(&self.trace),
            cause: Some(Arc::new(self)),
        }
    }
}

impl PartialEq for DomainError {
    fn eq(&self, other: &Self) -> bool {
        let same_cause = match (&self.cause, &other.cause) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>(),
            _ => false,
        };
        self.kind == other.kind && self.message == other.message && same_cause
    }
}

// The backtrace stays out of `{:?}`; ask for it through `trace()`.
impl fmt::Debug for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("cause", &self.cause)
            .finish_non_exhaustive()
    }
}

pub type Result<T, E = DomainError> = std::result::Result<T, E>;

/// Convert a caught failure into a [`DomainError`] of kind `target`.
///
/// An error that already is a `DomainError` of the target kind is returned
/// as is. Anything else is wrapped: the message becomes
/// `"<original kind>: <original message>"` and the original failure is kept
/// as the source.
///
/// ```rust
/// use sql_bootstrap::error::{translate, DomainError, ErrorKind};
///
/// let parse = "x1".parse::<i32>().unwrap_err();
/// let err = translate(parse, ErrorKind::InvalidValue);
/// assert_eq!(err.kind(), ErrorKind::InvalidValue);
/// assert_eq!(err.message(), "ParseIntError: invalid digit found in string");
///
/// let again = translate(err.clone(), ErrorKind::InvalidValue);
/// assert_eq!(again, err);
/// ```
pub fn translate<E>(caught: E, target: ErrorKind) -> DomainError
where
    E: StdError + Send + Sync + 'static,
{
    let origin = short_type_name::<E>();
    let boxed: Box<dyn StdError + Send + Sync + 'static> = Box::new(caught);
    match boxed.downcast::<DomainError>() {
        Ok(domain) if domain.kind == target => *domain,
        Ok(domain) => domain.retag(target),
        Err(foreign) => DomainError {
            kind: target,
            message: format!("{origin}: {foreign}"),
            cause: Some(Arc::from(foreign)),
            trace: Arc::new(Backtrace::capture()),
        },
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct Fire;

    #[test]
    fn wraps_foreign_errors_with_kind_prefix() {
        let err = translate(Fire, ErrorKind::Generic);
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert_eq!(err.message(), "Fire: disk on fire");
        assert_eq!(err.to_string(), "Fire: disk on fire");
        assert!(err.cause().is_some());
        assert_eq!(err.root_cause().to_string(), "disk on fire");
    }

    #[test]
    fn same_kind_is_not_wrapped_twice() {
        let first = translate(Fire, ErrorKind::InvalidValue);
        let second = translate(first.clone(), ErrorKind::InvalidValue);
        assert_eq!(first, second);
        assert_eq!(second.message(), "Fire: disk on fire");
    }

    #[test]
    fn retagging_keeps_trace_and_chain() {
        let first = translate(Fire, ErrorKind::InvalidValue);
        let second = translate(first.clone(), ErrorKind::Load);
        assert_eq!(second.kind(), ErrorKind::Load);
        assert_eq!(second.message(), "InvalidValue: Fire: disk on fire");
        assert!(std::ptr::eq(first.trace(), second.trace()));
        assert_eq!(second.root_cause().to_string(), "disk on fire");
    }

    #[test]
    fn type_names_drop_paths_and_generics() {
        assert_eq!(short_type_name::<std::num::ParseIntError>(), "ParseIntError");
        assert_eq!(short_type_name::<Vec<std::num::ParseIntError>>(), "Vec");
    }

    #[test]
    fn debug_output_leaves_out_the_backtrace() {
        let err = DomainError {
            trace: Arc::new(Backtrace::force_capture()),
            ..translate(Fire, ErrorKind::Connection)
        };
        let printed = format!("{err:?}");
        assert!(printed.starts_with("DomainError { kind: Connection, message: \"Fire: disk on fire\""));
        assert!(printed.contains("cause: Some(Fire)"));
        assert!(!printed.contains("trace"));
        assert_eq!(printed.lines().count(), 1);
    }
}
