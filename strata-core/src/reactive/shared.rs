//! Shared Signals
//!
//! A [`super::Signal`] belongs to exactly one session's graph. State that
//! several sessions observe lives in a `SharedSignal` instead: a thread-safe
//! cell with a version counter and a set of watchers.
//!
//! # How It Works
//!
//! 1. Writes are serialized by a dedicated write lock, so two concurrent
//!    writers never interleave their compare-and-store.
//!
//! 2. A write that changes the value bumps the version and calls every
//!    watcher with the new version, after all locks are released.
//!
//! 3. A session bridges a shared signal into its own graph by keeping a
//!    local mirror signal. Its watcher only posts a command to the session's
//!    queue; the mirror is updated on the session's own task, so foreign
//!    threads never touch the session graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

type Watcher = Arc<dyn Fn(u64) + Send + Sync>;
type EqualsFn<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Handle returned by [`SharedSignal::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

struct SharedInner<T> {
    value: RwLock<T>,
    write_lock: Mutex<()>,
    version: AtomicU64,
    next_watch: AtomicU64,
    watchers: DashMap<WatchId, Watcher>,
    equals: EqualsFn<T>,
}

/// A thread-safe cell observed by any number of sessions.
pub struct SharedSignal<T> {
    inner: Arc<SharedInner<T>>,
}

impl<T> SharedSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a shared signal compared with `PartialEq`.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equals(value, |a, b| a == b)
    }

    /// Create a shared signal with a custom equality predicate.
    pub fn with_equals<F>(value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SharedInner {
                value: RwLock::new(value),
                write_lock: Mutex::new(()),
                version: AtomicU64::new(0),
                next_watch: AtomicU64::new(0),
                watchers: DashMap::new(),
                equals: Box::new(equals),
            }),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Number of changing writes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Store `value`. Returns `false` if it equals the current value, in
    /// which case nobody is notified.
    pub fn set(&self, value: T) -> bool {
        self.write_with(|_| value)
    }

    /// Replace the value with `f(current)`. Returns whether it changed.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        self.write_with(f)
    }

    fn write_with<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let (version, watchers) = {
            let _writer = self.inner.write_lock.lock();
            let next = f(&*self.inner.value.read());
            {
                let mut value = self.inner.value.write();
                if (self.inner.equals)(&*value, &next) {
                    return false;
                }
                *value = next;
            }
            let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
            let watchers: Vec<Watcher> = self.inner.watchers.iter().map(|entry| Arc::clone(entry.value())).collect();
            (version, watchers)
        };

        trace!(version, watchers = watchers.len(), "shared signal changed");
        for watcher in watchers {
            watcher(version);
        }
        true
    }

    /// Call `watcher` with the new version after every changing write.
    pub fn watch<F>(&self, watcher: F) -> WatchId
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        let id = WatchId(self.inner.next_watch.fetch_add(1, Ordering::Relaxed));
        self.inner.watchers.insert(id, Arc::new(watcher));
        id
    }

    /// Stop notifying `id`. Returns whether it was registered.
    pub fn unwatch(&self, id: WatchId) -> bool {
        self.inner.watchers.remove(&id).is_some()
    }

    /// Number of registered watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.len()
    }
}

impl<T> Clone for SharedSignal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSignal")
            .field("value", &*self.inner.value.read())
            .field("version", &self.inner.version.load(Ordering::Relaxed))
            .finish()
    }
}
