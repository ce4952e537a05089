//! Reentrant guard for loading units.
//!
//! A load on one thread may require further units from inside its own body,
//! so the guard lets its current owner straight back in while every other
//! thread waits for it to go idle.

pub mod units;

pub use units::{UnitInit, UnitRegistry};

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{debug, trace};

/// Serializes loads across threads while allowing the owning thread to re-enter.
#[derive(Debug, Default)]
pub struct ReentrantLoader {
    owner: Mutex<Option<ThreadId>>,
    idle: Condvar,
}

impl ReentrantLoader {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            owner: Mutex::new(None),
            idle: Condvar::new(),
        }
    }

    /// Run `body` while holding the load guard.
    ///
    /// If the calling thread already holds the guard `body` runs immediately.
    /// Otherwise the call blocks (without timeout) until the guard is idle.
    /// The guard is released on every exit from `body`, including a panic, and
    /// whatever `body` returns is passed through untouched.
    pub fn guarded_load<R>(&self, source: &str, body: impl FnOnce() -> R) -> R {
        let current = thread::current().id();
        if self.owner() == Some(current) {
            trace!(source, "reentrant load");
            return body();
        }

        let owner = self.lock();
        let mut owner = self
            .idle
            .wait_while(owner, |holder| holder.is_some())
            .unwrap_or_else(PoisonError::into_inner);
        *owner = Some(current);
        drop(owner);
        let _release = Release {
            loader: self,
            source,
        };
        debug!(source, "load guard acquired");

        body()
    }

    /// Thread currently inside a guarded load, if any.
    #[must_use]
    pub fn owner(&self) -> Option<ThreadId> {
        *self.lock()
    }

    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner() == Some(thread::current().id())
    }

    // The owner field is only ever assigned whole, so a poisoned lock still
    // guards a consistent value.
    fn lock(&self) -> MutexGuard<'_, Option<ThreadId>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Release<'a> {
    loader: &'a ReentrantLoader,
    source: &'a str,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        *self.loader.lock() = None;
        self.loader.idle.notify_all();
        debug!(source = self.source, "load guard released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Metadata, Subscriber};

    /// Panics on the first event it sees, then records nothing.
    struct PanicOnFirstEvent(AtomicBool);

    impl Subscriber for PanicOnFirstEvent {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }
        fn record(&self, _: &Id, _: &Record<'_>) {}
        fn record_follows_from(&self, _: &Id, _: &Id) {}
        fn event(&self, _: &Event<'_>) {
            if !self.0.swap(true, Ordering::SeqCst) {
                panic!("subscriber failed");
            }
        }
        fn enter(&self, _: &Id) {}
        fn exit(&self, _: &Id) {}
    }

    #[test]
    fn nested_loads_run_inline() {
        let loader = ReentrantLoader::new();
        let mut order = Vec::new();
        loader.guarded_load("outer", || {
            order.push("outer");
            assert!(loader.is_held_by_current_thread());
            loader.guarded_load("inner", || order.push("inner"));
            assert!(loader.is_held_by_current_thread());
        });
        assert_eq!(order, ["outer", "inner"]);
        assert_eq!(loader.owner(), None);
    }

    #[test]
    fn errors_pass_through_and_release() {
        let loader = ReentrantLoader::new();
        let res: Result<(), &str> = loader.guarded_load("failing", || Err("boom"));
        assert_eq!(res, Err("boom"));
        assert_eq!(loader.owner(), None);
    }

    #[test]
    fn panic_releases_guard() {
        let loader = Arc::new(ReentrantLoader::new());
        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            loader.guarded_load("panicking", || -> Result<(), String> { panic!("load failed") })
        }));
        assert!(caught.is_err());
        assert_eq!(loader.owner(), None);

        let other = Arc::clone(&loader);
        let value = thread::spawn(move || other.guarded_load("after", || 7))
            .join()
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn failing_acquire_log_still_releases() {
        let loader = ReentrantLoader::new();
        let subscriber = PanicOnFirstEvent(AtomicBool::new(false));
        let caught = tracing::subscriber::with_default(subscriber, || {
            panic::catch_unwind(AssertUnwindSafe(|| loader.guarded_load("logged", || ())))
        });
        assert!(caught.is_err());
        assert_eq!(loader.owner(), None);
    }
}
