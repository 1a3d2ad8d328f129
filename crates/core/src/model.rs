// SPDX-License-Identifier: MIT

//! Shared data model: the notifier transaction, the cache entry shape, and
//! the handler state word. These types cross every crate boundary in the
//! workspace, so they live here rather than in any one component crate.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;

/// One of the five real LDAP operations, or the wire sentinel that means
/// "the notifier didn't tell you, go ask LDAP's translog".
///
/// Byte mapping matches the Univention notifier protocol exactly:
/// `{'a','m','d','n','r'}` plus `'\0'` for "resolve via translog".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Add,
    Modify,
    Delete,
    NoOpSchema,
    Rename,
    ResolveViaTranslog,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Add => b'a',
            Command::Modify => b'm',
            Command::Delete => b'd',
            Command::NoOpSchema => b'n',
            Command::Rename => b'r',
            Command::ResolveViaTranslog => 0,
        }
    }

    /// The single-character string passed to `modrdn`-aware handlers.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Add => "a",
            Command::Modify => "m",
            Command::Delete => "d",
            Command::NoOpSchema => "n",
            Command::Rename => "r",
            Command::ResolveViaTranslog => "\0",
        }
    }

    pub fn is_delete(self) -> bool {
        matches!(self, Command::Delete)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unrecognized command byte: {0:#x}")]
pub struct UnknownCommand(pub u8);

impl TryFrom<u8> for Command {
    type Error = UnknownCommand;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            b'a' => Ok(Command::Add),
            b'm' => Ok(Command::Modify),
            b'd' => Ok(Command::Delete),
            b'n' => Ok(Command::NoOpSchema),
            b'r' => Ok(Command::Rename),
            0 => Ok(Command::ResolveViaTranslog),
            other => Err(UnknownCommand(other)),
        }
    }
}

/// A transaction as reported by the notifier, possibly still missing its DN
/// and command (both are filled in from the LDAP translog when the notifier
/// replies with the v3 sentinel command).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierTransaction {
    pub id: u64,
    pub dn: Option<String>,
    pub command: Command,
}

/// Per-entry snapshot the cache keeps for diffing and filter matching. The
/// DN is not stored here; it is the external key the `CacheFacade` indexes
/// entries by.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheEntry {
    /// Attribute name -> multi-valued bytes, as returned by the directory.
    pub attributes: BTreeMap<String, Vec<Vec<u8>>>,
    /// Names of handlers that have successfully processed this entry's
    /// current state.
    pub applied: BTreeSet<String>,
}

impl CacheEntry {
    pub fn is_applied(&self, handler: &str) -> bool {
        self.applied.contains(handler)
    }

    pub fn mark_applied(&mut self, handler: &str) {
        self.applied.insert(handler.to_string());
    }

    pub fn mark_unapplied(&mut self, handler: &str) {
        self.applied.remove(handler);
    }
}

/// Bit assignments for [`HandlerState`]. `READY` is the only bit the core
/// interprets; plugins are free to use the remaining bits for their own
/// bookkeeping since the word round-trips verbatim through persistence.
pub mod handler_state_bits {
    pub const READY: u32 = 0b0000_0001;
}

/// The persisted state word of one handler, round-tripped as an ASCII
/// decimal integer so the on-disk format stays a plain text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerState(pub u32);

impl HandlerState {
    pub fn is_ready(self) -> bool {
        self.0 & handler_state_bits::READY != 0
    }

    pub fn set_ready(&mut self, ready: bool) {
        if ready {
            self.0 |= handler_state_bits::READY;
        } else {
            self.0 &= !handler_state_bits::READY;
        }
    }
}

/// The durable cursor: the id of the last transaction this daemon fully
/// committed. Refusing to advance past a failed transaction is what keeps
/// the daemon crash-consistent with the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct MasterCursor {
    pub last_applied_id: u64,
}
