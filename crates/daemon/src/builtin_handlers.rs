// SPDX-License-Identifier: MIT

//! The handlers shipped in this repository: `replication`, the handler
//! every deployment needs (mirrors the resolved attribute state to a
//! downstream file so an operator can diff it against the master), and
//! `audit-log`, a minimal example of a filtered, attribute-scoped handler.

use async_trait::async_trait;
use ldrepl_handlers::{AttrMap, HandlerFault, HandlerManifest, HandlerModule};
use std::path::PathBuf;
use std::sync::Mutex;

/// Mirrors every change to `<replica_dir>/<sha256(dn)>.json`, independent
/// of any handler filter -- the dispatcher always runs replication first
/// and unconditionally.
pub struct ReplicationHandler {
    replica_dir: PathBuf,
}

impl ReplicationHandler {
    pub fn new(replica_dir: PathBuf) -> Self {
        Self { replica_dir }
    }

    pub fn manifest() -> HandlerManifest {
        HandlerManifest::new("replication", "mirrors resolved entry state to the replica directory")
    }
}

#[async_trait]
impl HandlerModule for ReplicationHandler {
    fn name(&self) -> &str {
        "replication"
    }

    async fn handle(
        &self,
        dn: &str,
        new: &AttrMap,
        _old: &AttrMap,
        _cmd: Option<&str>,
    ) -> Result<(), HandlerFault> {
        use sha2::{Digest, Sha256};
        std::fs::create_dir_all(&self.replica_dir)
            .map_err(|e| HandlerFault(format!("replication: create_dir_all: {e}")))?;
        let mut hasher = Sha256::new();
        hasher.update(dn.as_bytes());
        let path = self.replica_dir.join(format!("{:x}.json", hasher.finalize()));
        let body = serde_json::to_vec_pretty(new).map_err(|e| HandlerFault(format!("replication: {e}")))?;
        std::fs::write(&path, body).map_err(|e| HandlerFault(format!("replication: write {}: {e}", path.display())))
    }
}

/// Example handler: logs every change touching `mail`, demonstrating the
/// `filter`/`attributes` manifest gates. Keeps an in-memory count purely
/// so tests can assert it ran.
pub struct AuditLogHandler {
    calls: Mutex<u64>,
}

impl AuditLogHandler {
    pub fn new() -> Self {
        Self { calls: Mutex::new(0) }
    }

    pub fn manifest() -> HandlerManifest {
        HandlerManifest::new("audit-log", "logs changes to the mail attribute")
            .with_attributes(["mail".to_string()])
    }

    pub fn call_count(&self) -> u64 {
        *self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for AuditLogHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HandlerModule for AuditLogHandler {
    fn name(&self) -> &str {
        "audit-log"
    }

    async fn handle(
        &self,
        dn: &str,
        _new: &AttrMap,
        _old: &AttrMap,
        _cmd: Option<&str>,
    ) -> Result<(), HandlerFault> {
        *self.calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        tracing::info!(dn, "mail attribute changed");
        Ok(())
    }
}
