//! Secondary cache: a flat string-keyed map of JSON texts, persisted as one file.
//!
//! Entries duplicate collection data under legacy key names. Nothing here is
//! authoritative; readers must treat a missing or unparseable entry as absent.

use crate::errors::DbError;
use crate::fsutil;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub struct KvStore {
    path: PathBuf,
    map: RwLock<BTreeMap<String, String>>,
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore").field("path", &self.path).field("len", &self.len()).finish()
    }
}

impl KvStore {
    /// Load the map from `path`. A missing file is an empty map; an unreadable
    /// one is copied aside as `<file>.corrupt` and treated as empty.
    ///
    /// # Errors
    /// `StorageFault` only if the file exists but cannot be read at all.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        let map = if path.exists() {
            let bytes = std::fs::read(&path)?;
            match Self::decode(&bytes) {
                Ok(m) => m,
                Err(reason) => {
                    log::warn!("cache file {} unreadable ({reason}); starting empty", path.display());
                    fsutil::backup_corrupt(&path);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, map: RwLock::new(map) })
    }

    fn decode(bytes: &[u8]) -> Result<BTreeMap<String, String>, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.map.read().get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.read().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.map.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Errors
    /// `StorageFault` if the map cannot be persisted; the entry is not changed then.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), DbError> {
        let mut map = self.map.write();
        let mut next = map.clone();
        next.insert(key.to_string(), value.into());
        self.persist(&next)?;
        *map = next;
        Ok(())
    }

    /// Remove an entry. Returns whether it existed.
    ///
    /// # Errors
    /// `StorageFault` if the map cannot be persisted.
    pub fn remove(&self, key: &str) -> Result<bool, DbError> {
        let mut map = self.map.write();
        if !map.contains_key(key) {
            return Ok(false);
        }
        let mut next = map.clone();
        next.remove(key);
        self.persist(&next)?;
        *map = next;
        Ok(true)
    }

    /// # Errors
    /// `StorageFault` if the map cannot be persisted.
    pub fn clear(&self) -> Result<(), DbError> {
        let mut map = self.map.write();
        self.persist(&BTreeMap::new())?;
        map.clear();
        Ok(())
    }

    /// Parse an entry as JSON. `Ok(None)` when absent.
    ///
    /// # Errors
    /// `MalformedCacheEntry` when present but not parseable as `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        let Some(text) = self.get(key) else { return Ok(None) };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| DbError::MalformedCacheEntry { key: key.to_string(), reason: e.to_string() })
    }

    /// # Errors
    /// `Json` if `value` cannot be serialized, `StorageFault` if it cannot be persisted.
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let text = serde_json::to_string(value)?;
        self.set(key, text)
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<(), DbError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        fsutil::write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("localStorage.json");
        let kv = KvStore::open(&p).unwrap();
        kv.set("payables", r#"[{"id":"P1"}]"#).unwrap();
        kv.set_json("flag", &true).unwrap();
        drop(kv);
        let kv = KvStore::open(&p).unwrap();
        assert_eq!(kv.get("payables").as_deref(), Some(r#"[{"id":"P1"}]"#));
        assert_eq!(kv.get_json::<bool>("flag").unwrap(), Some(true));
        assert!(kv.remove("flag").unwrap());
        assert!(!kv.remove("flag").unwrap());
    }

    #[test]
    fn malformed_entry_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvStore::open(dir.path().join("c.json")).unwrap();
        kv.set("payables", "{not json").unwrap();
        let err = kv.get_json::<Vec<Value>>("payables").unwrap_err();
        assert!(matches!(err, DbError::MalformedCacheEntry { ref key, .. } if key == "payables"));
        assert_eq!(kv.get_json::<Value>("missing").unwrap(), None);
    }

    #[test]
    fn unreadable_file_starts_empty_and_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("c.json");
        std::fs::write(&p, "<<<garbage").unwrap();
        let kv = KvStore::open(&p).unwrap();
        assert!(kv.is_empty());
        assert!(dir.path().join("c.json.corrupt").exists());
        kv.set_json("k", &json!([])).unwrap();
        assert_eq!(kv.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn non_utf8_file_starts_empty_and_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("localStorage.json");
        std::fs::write(&p, [0xff, 0xfe, 0x00, 0x7b]).unwrap();
        let kv = KvStore::open(&p).unwrap();
        assert!(kv.is_empty());
        assert_eq!(std::fs::read(dir.path().join("localStorage.json.corrupt")).unwrap(), vec![0xff, 0xfe, 0x00, 0x7b]);
        kv.set("payables", "[]").unwrap();
        assert_eq!(KvStore::open(&p).unwrap().get("payables").as_deref(), Some("[]"));
    }
}
