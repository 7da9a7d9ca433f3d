//! Fault-injecting store wrapper for tests

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{BlockStore, MemoryStore, StoreError, StoreResult, Visibility};

/// Memory store that fails a configurable number of calls
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    get_failures: AtomicUsize,
    put_failures: AtomicUsize,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` gets with a transient error
    pub fn fail_gets(&self, n: usize) {
        self.get_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` puts with a transient error
    pub fn fail_puts(&self, n: usize) {
        self.put_failures.store(n, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl BlockStore for FlakyStore {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.get_failures) {
            return Err(StoreError::Backend(format!("injected read failure for {key}")));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, bytes: &[u8], visibility: Visibility) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.put_failures) {
            return Err(StoreError::Backend(format!("injected write failure for {key}")));
        }
        self.inner.put(key, bytes, visibility)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list(prefix)
    }
}
