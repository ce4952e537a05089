use tracing::warn;

use super::options::ConnectOptions;
use crate::error::{DomainError, Result};

/// Backend-specific constructor for live database handles.
///
/// The dispatcher only normalizes options; everything past that (opening
/// sockets or files, pooling, running queries) belongs to the factory.
pub trait ConnectionFactory {
    type Handle;

    /// Open a handle for the given options.
    ///
    /// # Errors
    ///
    /// Implementations report their own failures, usually as `Connection` errors.
    fn create(&self, options: &ConnectOptions) -> Result<Self::Handle>;

    /// Tear a handle down. The default just drops it.
    ///
    /// # Errors
    ///
    /// Implementations may report a failed close.
    fn destroy(&self, handle: Self::Handle) -> Result<()> {
        drop(handle);
        Ok(())
    }
}

impl<F: ConnectionFactory + ?Sized> ConnectionFactory for &F {
    type Handle = F::Handle;

    fn create(&self, options: &ConnectOptions) -> Result<Self::Handle> {
        (**self).create(options)
    }

    fn destroy(&self, handle: Self::Handle) -> Result<()> {
        (**self).destroy(handle)
    }
}

/// Owns a handle for the duration of a callback and destroys it on every
/// exit path, unwinding included.
pub(crate) struct ScopedHandle<'f, F: ConnectionFactory> {
    factory: &'f F,
    handle: Option<F::Handle>,
}

impl<'f, F: ConnectionFactory> ScopedHandle<'f, F> {
    pub(crate) fn new(factory: &'f F, handle: F::Handle) -> Self {
        Self {
            factory,
            handle: Some(handle),
        }
    }

    pub(crate) fn with<T>(
        &mut self,
        callback: impl FnOnce(&mut F::Handle) -> Result<T>,
    ) -> Result<T> {
        match self.handle.as_mut() {
            Some(handle) => callback(handle),
            None => Err(DomainError::connection("connection was already released")),
        }
    }

    /// Destroy the handle now and report the teardown result.
    pub(crate) fn finish(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.factory.destroy(handle),
            None => Ok(()),
        }
    }
}

impl<F: ConnectionFactory> Drop for ScopedHandle<'_, F> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(err) = self.factory.destroy(handle)
        {
            warn!(error = %err, "failed to destroy connection after scoped use");
        }
    }
}
