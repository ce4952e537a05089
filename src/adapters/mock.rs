//! In-process factory that records what it was asked to do.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::factory::ConnectionFactory;
use super::options::ConnectOptions;
use crate::error::{DomainError, Result};

/// Handle produced by [`MockFactory`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockConnection {
    id: usize,
    options: ConnectOptions,
}

impl MockConnection {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Table or column name converted the way this connection sends it.
    #[must_use]
    pub fn input_identifier(&self, identifier: &str) -> String {
        self.options.defaults().input_identifier(identifier)
    }

    #[must_use]
    pub fn output_identifier(&self, identifier: &str) -> String {
        self.options.defaults().output_identifier(identifier)
    }
}

/// Factory that never touches a database.
///
/// Every created handle's options are kept so callers can inspect what a
/// connect call normalized to, and teardown calls are counted.
#[derive(Debug, Default)]
pub struct MockFactory {
    created: Mutex<Vec<ConnectOptions>>,
    destroyed: AtomicUsize,
    failure: Option<String>,
}

impl MockFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose `create` always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Options of every handle created so far, oldest first.
    #[must_use]
    pub fn created(&self) -> Vec<ConnectOptions> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn destroyed_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl ConnectionFactory for MockFactory {
    type Handle = MockConnection;

    fn create(&self, options: &ConnectOptions) -> Result<MockConnection> {
        if let Some(message) = &self.failure {
            return Err(DomainError::connection(message.clone()));
        }
        let mut created = self.created.lock().unwrap_or_else(PoisonError::into_inner);
        created.push(options.clone());
        Ok(MockConnection {
            id: created.len(),
            options: options.clone(),
        })
    }

    fn destroy(&self, handle: MockConnection) -> Result<()> {
        tracing::trace!(id = handle.id, "destroying mock connection");
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
