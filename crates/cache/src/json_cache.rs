// SPDX-License-Identifier: MIT

//! `JsonCache`: the file-backed `CacheFacade`. One JSON file per DN under
//! `entries/`, a backed-up `master_cursor.json`, and plain-text decimal
//! handler state files under `handlers/`.

use crate::atomic::{write_atomic, write_atomic_with_backup};
use crate::error::CacheError;
use crate::facade::CacheFacade;
use crate::filter::{self, SearchFilter};
use ldrepl_core::model::{CacheEntry, MasterCursor};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub struct JsonCache {
    root: PathBuf,
}

impl JsonCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entries_dir(&self) -> PathBuf {
        self.root.join("entries")
    }

    fn entry_path(&self, dn: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(dn.as_bytes());
        let digest = hasher.finalize();
        self.entries_dir().join(format!("{digest:x}.json"))
    }

    fn master_cursor_path(&self) -> PathBuf {
        self.root.join("master_cursor.json")
    }

    fn handlers_dir(&self) -> PathBuf {
        self.root.join("handlers")
    }

    fn handler_state_path(&self, handler_name: &str) -> PathBuf {
        self.handlers_dir().join(handler_name)
    }

    fn scalars_dir(&self) -> PathBuf {
        self.root.join("scalars")
    }

    fn scalar_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        self.scalars_dir().join(format!("{digest:x}"))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io { path: path.to_path_buf(), source: e }),
        }
    }
}

impl CacheFacade for JsonCache {
    fn changed_attributes(&self, new: &CacheEntry, old: &CacheEntry) -> Vec<String> {
        let mut names: std::collections::BTreeSet<&String> =
            new.attributes.keys().chain(old.attributes.keys()).collect();
        names.retain(|name| new.attributes.get(*name) != old.attributes.get(*name));
        names.into_iter().cloned().collect()
    }

    fn filter_matches(&self, filters: &[SearchFilter], _dn: &str, entry: &CacheEntry) -> bool {
        filters.iter().any(|f| filter::matches(f, &entry.attributes))
    }

    fn get_entry(&self, dn: &str) -> Result<Option<CacheEntry>, CacheError> {
        Self::read_json(&self.entry_path(dn))
    }

    fn put_entry(&self, dn: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(entry)?;
        write_atomic(&self.entry_path(dn), &bytes)
    }

    fn delete_entry(&self, dn: &str) -> Result<(), CacheError> {
        let path = self.entry_path(dn);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    fn get_master_cursor(&self) -> Result<MasterCursor, CacheError> {
        Ok(Self::read_json(&self.master_cursor_path())?.unwrap_or_default())
    }

    fn update_master_cursor(&self, cursor: &MasterCursor) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(cursor)?;
        write_atomic_with_backup(&self.master_cursor_path(), &bytes)
    }

    fn set_scalar(&self, key: &str, value: &str) -> Result<(), CacheError> {
        write_atomic(&self.scalar_path(key), value.as_bytes())
    }

    fn get_scalar(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.scalar_path(key);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    fn read_handler_state(&self, handler_name: &str) -> Result<u32, CacheError> {
        let path = self.handler_state_path(handler_name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(s.trim().parse().unwrap_or(0)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    fn write_handler_state(&self, handler_name: &str, state: u32) -> Result<(), CacheError> {
        write_atomic(&self.handler_state_path(handler_name), state.to_string().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldrepl_core::model::MasterCursor;
    use tempfile::tempdir;

    #[test]
    fn entry_round_trips_by_dn() {
        let dir = tempdir().unwrap();
        let cache = JsonCache::new(dir.path());
        let mut entry = CacheEntry::default();
        entry.attributes.insert("cn".into(), vec![b"alice".to_vec()]);
        cache.put_entry("cn=alice,dc=example", &entry).unwrap();
        let got = cache.get_entry("cn=alice,dc=example").unwrap().unwrap();
        assert_eq!(got, entry);
    }

    #[test]
    fn missing_entry_is_none() {
        let dir = tempdir().unwrap();
        let cache = JsonCache::new(dir.path());
        assert!(cache.get_entry("cn=nobody,dc=example").unwrap().is_none());
    }

    #[test]
    fn master_cursor_persists_and_rotates_backups() {
        let dir = tempdir().unwrap();
        let cache = JsonCache::new(dir.path());
        for id in 1..=3u64 {
            cache.update_master_cursor(&MasterCursor { last_applied_id: id }).unwrap();
        }
        assert_eq!(cache.get_master_cursor().unwrap().last_applied_id, 3);
        assert!(dir.path().join("master_cursor.bak").exists());
    }

    #[test]
    fn handler_state_round_trips_as_decimal_text() {
        let dir = tempdir().unwrap();
        let cache = JsonCache::new(dir.path());
        assert_eq!(cache.read_handler_state("replication").unwrap(), 0);
        cache.write_handler_state("replication", 1).unwrap();
        assert_eq!(cache.read_handler_state("replication").unwrap(), 1);
    }

    #[test]
    fn changed_attributes_detects_added_removed_and_modified() {
        let cache = JsonCache::new(std::env::temp_dir());
        let mut old = CacheEntry::default();
        old.attributes.insert("cn".into(), vec![b"alice".to_vec()]);
        old.attributes.insert("gone".into(), vec![b"x".to_vec()]);
        let mut new = CacheEntry::default();
        new.attributes.insert("cn".into(), vec![b"alice2".to_vec()]);
        new.attributes.insert("added".into(), vec![b"y".to_vec()]);
        let changed = cache.changed_attributes(&new, &old);
        assert_eq!(changed, vec!["added".to_string(), "cn".to_string(), "gone".to_string()]);
    }
}
