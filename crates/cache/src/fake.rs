// SPDX-License-Identifier: MIT

//! In-memory `CacheFacade` for handler and pump tests, avoiding filesystem
//! round-trips in fast unit tests.

use crate::error::CacheError;
use crate::facade::CacheFacade;
use crate::filter::{self, SearchFilter};
use ldrepl_core::model::{CacheEntry, MasterCursor};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct CacheFake {
    entries: Mutex<HashMap<String, CacheEntry>>,
    cursor: Mutex<MasterCursor>,
    scalars: Mutex<HashMap<String, String>>,
    handler_states: Mutex<HashMap<String, u32>>,
}

impl CacheFake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_entry(&self, dn: &str, entry: CacheEntry) {
        self.entries.lock().insert(dn.to_string(), entry);
    }
}

impl CacheFacade for CacheFake {
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
        Ok(self.entries.lock().get(dn).cloned())
    }

    fn put_entry(&self, dn: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries.lock().insert(dn.to_string(), entry.clone());
        Ok(())
    }

    fn delete_entry(&self, dn: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(dn);
        Ok(())
    }

    fn get_master_cursor(&self) -> Result<MasterCursor, CacheError> {
        Ok(*self.cursor.lock())
    }

    fn update_master_cursor(&self, cursor: &MasterCursor) -> Result<(), CacheError> {
        *self.cursor.lock() = *cursor;
        Ok(())
    }

    fn set_scalar(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.scalars.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_scalar(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.scalars.lock().get(key).cloned())
    }

    fn read_handler_state(&self, handler_name: &str) -> Result<u32, CacheError> {
        Ok(self.handler_states.lock().get(handler_name).copied().unwrap_or(0))
    }

    fn write_handler_state(&self, handler_name: &str, state: u32) -> Result<(), CacheError> {
        self.handler_states.lock().insert(handler_name.to_string(), state);
        Ok(())
    }
}
