//! Block store contract and bundled backends
//!
//! A block store is a flat key/blob space for one bucket. The matrix layer
//! only ever issues whole-object get, put, delete and prefix listing; every
//! call is blocking and fails independently. Nothing is cached.

use std::fmt;

use thiserror::Error;

#[cfg(test)]
pub(crate) mod flaky;
pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Access-control hint attached to every write
///
/// Backends without access control accept and ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Readable and writable by the bucket owner (the write default)
    #[default]
    BucketOwnerFullControl,
    /// Writer only
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::BucketOwnerFullControl => write!(f, "bucket-owner-full-control"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// Errors reported by a block store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object stored under the key
    #[error("object not found: {0}")]
    NotFound(String),

    /// Key rejected by the backend
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Underlying I/O failure
    #[error("I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io { .. } | StoreError::Backend(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for block store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Whole-object blob storage addressed by string keys
pub trait BlockStore: Send + Sync {
    /// Fetch the object stored under `key`
    fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Store `bytes` under `key`, replacing any previous object
    fn put(&self, key: &str, bytes: &[u8], visibility: Visibility) -> StoreResult<()>;

    /// Remove the object under `key`; removing an absent key succeeds
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// All keys starting with `prefix`, in lexicographic order
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Whether an object is stored under `key`
    fn exists(&self, key: &str) -> StoreResult<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<S: BlockStore + ?Sized> BlockStore for &S {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, bytes: &[u8], visibility: Visibility) -> StoreResult<()> {
        (**self).put(key, bytes, visibility)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).list(prefix)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        (**self).exists(key)
    }
}

impl<S: BlockStore + ?Sized> BlockStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, bytes: &[u8], visibility: Visibility) -> StoreResult<()> {
        (**self).put(key, bytes, visibility)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        (**self).delete(key)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        (**self).list(prefix)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        (**self).exists(key)
    }
}
