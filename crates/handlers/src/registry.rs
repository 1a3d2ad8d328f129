// SPDX-License-Identifier: MIT

//! `HandlerRegistry`: priority-sorted handler list, replication-first
//! dispatch ordering, and broadcast operations, per `handlers.c`'s
//! `insert_handler`/`handlers_update`/`handlers_*_all` family.

use crate::manifest::{HandlerManifest, ManifestFile};
use crate::module::HandlerModule;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

pub const REPLICATION_HANDLER_NAME: &str = "replication";

/// One registered handler: its static metadata, its callables, and the
/// ephemeral `prepared` flag that tracks whether `prerun` has run since
/// the last `postrun`.
pub struct LoadedHandler {
    pub manifest: HandlerManifest,
    pub module: Box<dyn HandlerModule>,
    prepared: Mutex<bool>,
}

impl LoadedHandler {
    pub fn is_prepared(&self) -> bool {
        *self.prepared.lock()
    }

    pub fn set_prepared(&self, prepared: bool) {
        *self.prepared.lock() = prepared;
    }
}

/// Worst-case outcome of a broadcast across all handlers: broadcasts never
/// abort early on a single handler's failure, but the daemon still wants
/// to know whether everything succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Ok,
    HandlerFailed(u32),
}

pub struct HandlerRegistry {
    handlers: Vec<Arc<LoadedHandler>>,
}

impl HandlerRegistry {
    /// Assemble the registry from a statically built table of handlers
    /// (the daemon's startup code owns that table; Rust has no dynamic
    /// module loader, so handlers are compiled in and named rather than
    /// discovered at runtime). Handlers are sorted by
    /// `(priority, insertion index)` so ties keep registration order, the
    /// same stable-insert ordering a priority-sorted linked list gives.
    pub fn new(handlers: Vec<(HandlerManifest, Box<dyn HandlerModule>)>) -> Self {
        let mut loaded: Vec<Arc<LoadedHandler>> = handlers
            .into_iter()
            .map(|(manifest, module)| {
                Arc::new(LoadedHandler { manifest, module, prepared: Mutex::new(false) })
            })
            .collect();
        loaded.sort_by(|a, b| a.manifest.priority.total_cmp(&b.manifest.priority));
        Self { handlers: loaded }
    }

    /// Apply `*.toml` manifest overrides from a directory onto already
    /// registered handlers, matching each file's stem to a handler name.
    /// A missing `description`, an unparseable file, or a file that
    /// names no registered handler is logged and skipped -- it never
    /// aborts startup.
    pub fn load_dir(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "handler manifest directory unreadable, skipping");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(handler) = self.handlers.iter().find(|h| h.manifest.name == stem) else {
                tracing::warn!(file = %path.display(), "manifest names no registered handler, skipping");
                continue;
            };
            let contents = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "failed to read handler manifest, skipping");
                    continue;
                }
            };
            match toml::from_str::<ManifestFile>(&contents) {
                Ok(file) => {
                    // SAFETY-free note: Arc<LoadedHandler> doesn't give us
                    // mutable access to `manifest`; we rebuild the Arc in
                    // place instead, preserving `prepared`.
                    let idx = self.handlers.iter().position(|h| h.manifest.name == stem).unwrap();
                    let prepared = handler.is_prepared();
                    let old = self.handlers.remove(idx);
                    let mut manifest = old.manifest.clone();
                    manifest.apply_override(file);
                    let module = match Arc::try_unwrap(old) {
                        Ok(loaded) => loaded.module,
                        Err(_) => unreachable!("no other references to a just-removed handler"),
                    };
                    self.handlers.insert(
                        idx,
                        Arc::new(LoadedHandler { manifest, module, prepared: Mutex::new(prepared) }),
                    );
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "invalid handler manifest, skipping");
                }
            }
        }
        self.handlers.sort_by(|a, b| a.manifest.priority.total_cmp(&b.manifest.priority));
    }

    /// Handlers in dispatch order: `replication` first if present, then
    /// the rest in priority order.
    pub fn dispatch_order(&self) -> Vec<Arc<LoadedHandler>> {
        let (mut repl, mut rest): (Vec<_>, Vec<_>) = self
            .handlers
            .iter()
            .cloned()
            .partition(|h| h.manifest.is_replication());
        repl.append(&mut rest);
        repl
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LoadedHandler>> {
        self.handlers.iter()
    }

    pub fn find(&self, name: &str) -> Option<&Arc<LoadedHandler>> {
        self.handlers.iter().find(|h| h.manifest.name == name)
    }

    pub async fn initialize_all(&self) -> BroadcastOutcome {
        let mut failed = 0;
        for handler in &self.handlers {
            if let Err(e) = handler.module.initialize().await {
                tracing::warn!(handler = %handler.manifest.name, error = %e.0, "initialize failed");
                failed += 1;
            }
        }
        outcome(failed)
    }

    pub async fn clean_all(&self) -> BroadcastOutcome {
        let mut failed = 0;
        for handler in &self.handlers {
            if let Err(e) = handler.module.clean().await {
                tracing::warn!(handler = %handler.manifest.name, error = %e.0, "clean failed");
                failed += 1;
            }
        }
        outcome(failed)
    }

    pub async fn postrun_all(&self) -> BroadcastOutcome {
        let mut failed = 0;
        for handler in &self.handlers {
            if !handler.is_prepared() {
                continue;
            }
            if let Err(e) = handler.module.postrun().await {
                tracing::warn!(handler = %handler.manifest.name, error = %e.0, "postrun failed");
                failed += 1;
            }
            handler.set_prepared(false);
        }
        outcome(failed)
    }

    pub async fn set_data_all(&self, key: &str, value: &str) -> BroadcastOutcome {
        let mut failed = 0;
        for handler in &self.handlers {
            if let Err(e) = handler.module.setdata(key, value).await {
                tracing::warn!(handler = %handler.manifest.name, error = %e.0, "setdata failed");
                failed += 1;
            }
        }
        outcome(failed)
    }

    pub async fn free_all(&self) -> BroadcastOutcome {
        self.clean_all().await
    }
}

fn outcome(failed: u32) -> BroadcastOutcome {
    if failed == 0 {
        BroadcastOutcome::Ok
    } else {
        BroadcastOutcome::HandlerFailed(failed)
    }
}
