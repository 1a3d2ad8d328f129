// SPDX-License-Identifier: MIT

//! The `CacheFacade` trait: the thin surface the dispatcher and pump use
//! over the on-disk entry cache, grounded on `handlers.c`'s
//! `cache_entry_module_present`/`cache_entry_ldap_filter_match`/applied-set
//! helpers.

use crate::error::CacheError;
use crate::filter::SearchFilter;
use ldrepl_core::model::{CacheEntry, MasterCursor};

pub trait CacheFacade: Send + Sync {
    /// Names of attributes present in `new` or `old` with differing values.
    /// Absent in one and present in the other counts as changed.
    fn changed_attributes(&self, new: &CacheEntry, old: &CacheEntry) -> Vec<String>;

    fn is_module_present(&self, entry: &CacheEntry, name: &str) -> bool {
        entry.is_applied(name)
    }

    fn mark_applied(&self, entry: &mut CacheEntry, name: &str) {
        entry.mark_applied(name);
    }

    fn mark_unapplied(&self, entry: &mut CacheEntry, name: &str) {
        entry.mark_unapplied(name);
    }

    fn filter_matches(&self, filters: &[SearchFilter], dn: &str, entry: &CacheEntry) -> bool;

    /// DN lookup; `None` means no cached entry exists for `dn` yet.
    fn get_entry(&self, dn: &str) -> Result<Option<CacheEntry>, CacheError>;

    fn put_entry(&self, dn: &str, entry: &CacheEntry) -> Result<(), CacheError>;

    fn delete_entry(&self, dn: &str) -> Result<(), CacheError>;

    fn get_master_cursor(&self) -> Result<MasterCursor, CacheError>;

    fn update_master_cursor(&self, cursor: &MasterCursor) -> Result<(), CacheError>;

    /// Opaque scalar persistence for handler bookkeeping that doesn't fit
    /// the entry model (e.g. a handler's own cursor into an external system).
    fn set_scalar(&self, key: &str, value: &str) -> Result<(), CacheError>;

    fn get_scalar(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Persisted `HandlerState` bits, round-tripped as an ASCII decimal.
    fn read_handler_state(&self, handler_name: &str) -> Result<u32, CacheError>;

    fn write_handler_state(&self, handler_name: &str, state: u32) -> Result<(), CacheError>;
}
