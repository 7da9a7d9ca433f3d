//! Local filesystem block store
//!
//! Each bucket is a directory; an object key maps to a relative path whose
//! components are the `/`-separated parts of the key.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{BlockStore, StoreError, StoreResult, Visibility};

/// Block store rooted at a directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Open the directory for `bucket` under `base`
    pub fn for_bucket<P: AsRef<Path>>(base: P, bucket: &str) -> StoreResult<Self> {
        validate_component(bucket, bucket)?;
        Self::open(base.as_ref().join(bucket))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.root.clone();
        for component in key.split('/') {
            validate_component(key, component)?;
            path.push(component);
        }
        Ok(path)
    }

    fn collect_keys(&self, dir: &Path, relative: &str, out: &mut Vec<String>) -> StoreResult<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(io_error(relative, source)),
        };

        for entry in entries {
            let entry = entry.map_err(|source| io_error(relative, source))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let key = if relative.is_empty() {
                name.to_string()
            } else {
                format!("{relative}/{name}")
            };

            let file_type = entry.file_type().map_err(|source| io_error(&key, source))?;
            if file_type.is_dir() {
                self.collect_keys(&entry.path(), &key, out)?;
            } else if file_type.is_file() {
                out.push(key);
            }
        }
        Ok(())
    }
}

fn validate_component(key: &str, component: &str) -> StoreResult<()> {
    let reason = match component {
        "" => "empty path component",
        "." => "current-directory component",
        ".." => "parent-directory component",
        c if c.contains('\\') => "backslash in path component",
        _ => return Ok(()),
    };
    Err(StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

fn io_error(key: &str, source: std::io::Error) -> StoreError {
    StoreError::Io {
        key: key.to_string(),
        source,
    }
}

impl BlockStore for FsStore {
    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.object_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(source) => Err(io_error(key, source)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8], _visibility: Visibility) -> StoreResult<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(key, source))?;
        }
        fs::write(&path, bytes).map_err(|source| io_error(key, source))
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(key, source)),
        }
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        // Walk only the directory named by the prefix up to its last '/'
        let dir_key = prefix.rsplit_once('/').map_or("", |(dir, _)| dir);
        let mut dir = self.root.clone();
        if !dir_key.is_empty() {
            for component in dir_key.split('/') {
                if validate_component(dir_key, component).is_err() {
                    return Ok(Vec::new());
                }
                dir.push(component);
            }
        }

        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        self.collect_keys(&dir, dir_key, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.object_path(key)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_roundtrip_nested_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::for_bucket(dir.path(), "bucket").unwrap();

        store
            .put("tilestore.objects/m/0_4_4_0_4_4_0", &[1, 2, 3], Visibility::default())
            .unwrap();
        assert_eq!(store.get("tilestore.objects/m/0_4_4_0_4_4_0").unwrap(), vec![1, 2, 3]);
        assert!(store.root().join("tilestore.objects/m/0_4_4_0_4_4_0").is_file());
        assert!(store.exists("tilestore.objects/m/0_4_4_0_4_4_0").unwrap());
        assert!(!store.exists("tilestore.objects/m/header").unwrap());
    }

    #[test]
    fn test_fs_missing_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        assert!(store.get("a/b").unwrap_err().is_not_found());
        store.delete("a/b").unwrap();

        store.put("a/b", b"x", Visibility::Private).unwrap();
        store.delete("a/b").unwrap();
        assert!(store.get("a/b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_fs_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).unwrap();

        for key in ["../x", "a//b", "a/./b", "a/", ""] {
            let err = store.put(key, b"x", Visibility::default()).unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey { .. }), "{key}");
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn test_fs_list_prefix() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        for key in ["p/m/header", "p/m/0_1_1_0_1_1_0", "p/m2/header", "q/x"] {
            store.put(key, b"", Visibility::default()).unwrap();
        }

        assert_eq!(
            store.list("p/m/").unwrap(),
            vec!["p/m/0_1_1_0_1_1_0", "p/m/header"]
        );
        assert_eq!(store.list("p/m").unwrap().len(), 3);
        assert!(store.list("z").unwrap().is_empty());
        assert_eq!(store.list("p/m2/h").unwrap(), vec!["p/m2/header"]);
        assert!(store.list("p/absent/").unwrap().is_empty());
        assert!(store.list("p//").unwrap().is_empty());
        assert_eq!(store.list("").unwrap().len(), 4);
    }

    #[test]
    fn test_fs_list_through_object_path() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).unwrap();
        store.put("p/m/header", b"", Visibility::default()).unwrap();

        // Prefix directory is an object, not a directory
        assert!(store.list("p/m/header/").unwrap().is_empty());
        assert_eq!(store.list("p/m/header").unwrap(), vec!["p/m/header"]);
    }
}
