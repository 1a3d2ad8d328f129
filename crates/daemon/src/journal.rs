// SPDX-License-Identifier: MIT

//! Append-only JSONL transaction journal, written before the cursor
//! advances when `[journal] enabled = true`. Mirrors
//! `notifier.c::notifier_write_transaction_file`'s "write before commit"
//! ordering without reproducing its fixed-width binary format.

use ldrepl_core::model::NotifierTransaction;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to open journal at {path}: {source}")]
    Open { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to append to journal at {path}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to serialize journal entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, serde::Serialize)]
struct JournalEntry<'a> {
    id: u64,
    dn: &'a Option<String>,
    command: &'a str,
}

pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(dir: &Path) -> Self {
        Self { path: dir.join("transaction") }
    }

    pub fn append(&self, txn: &NotifierTransaction) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| JournalError::Open { path: parent.to_path_buf(), source: e })?;
        }
        let entry = JournalEntry { id: txn.id, dn: &txn.dn, command: txn.command.as_str() };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| JournalError::Open { path: self.path.clone(), source: e })?;
        file.write_all(line.as_bytes())
            .map_err(|e| JournalError::Write { path: self.path.clone(), source: e })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldrepl_core::model::Command;
    use tempfile::tempdir;

    #[test]
    fn append_writes_one_jsonl_line_per_transaction() {
        let dir = tempdir().unwrap();
        let journal = Journal::new(dir.path());
        journal
            .append(&NotifierTransaction { id: 1, dn: Some("cn=a,dc=x".into()), command: Command::Add })
            .unwrap();
        journal
            .append(&NotifierTransaction { id: 2, dn: None, command: Command::Delete })
            .unwrap();
        let contents = std::fs::read_to_string(dir.path().join("transaction")).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().contains("\"id\":1"));
    }
}
