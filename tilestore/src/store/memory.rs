//! In-process block store backed by an ordered map

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{BlockStore, StoreError, StoreResult, Visibility};

/// Block store holding every object in memory
///
/// Listing walks an ordered range, so results come back sorted without an
/// extra pass.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_map()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read_map()?.is_empty())
    }

    fn read_map(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.objects
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }

    fn write_map(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.objects
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".into()))
    }
}

impl BlockStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.read_map()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, bytes: &[u8], _visibility: Visibility) -> StoreResult<()> {
        self.write_map()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.write_map()?.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.read_map()?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read_map()?.contains_key(key))
    }
}
