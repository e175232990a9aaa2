//! Shared store handle
//!
//! A `Store` is single-writer. `SharedStore` puts it behind one mutex so that
//! find-free + mark-used and growth are serialized across threads.

use crate::error::Result;
use crate::flush::FlushStats;
use crate::growth::GrowthReport;
use crate::store::{Store, StoreStats};
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable, thread-safe handle to a [`Store`]
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        SharedStore {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn write(&self, payload: &[u8]) -> Result<u64> {
        self.inner.lock().write(payload)
    }

    pub fn grow(&self, additional: u64) -> Result<GrowthReport> {
        self.inner.lock().grow(additional)
    }

    pub fn free_chain(&self, first: u64) -> Result<u64> {
        self.inner.lock().free_chain(first)
    }

    pub fn flush(&self) -> Result<FlushStats> {
        self.inner.lock().flush()
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.lock().stats()
    }

    /// Run `f` with exclusive access to the store
    pub fn with<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        let mut store = self.inner.lock();
        f(&mut *store)
    }

    /// Recover the store once every other clone has been dropped
    pub fn into_inner(self) -> Option<Store> {
        Arc::try_unwrap(self.inner).ok().map(Mutex::into_inner)
    }
}
