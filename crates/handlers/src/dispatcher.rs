// SPDX-License-Identifier: MIT

//! `Dispatcher`: the per-change, per-handler decision tree, grounded on
//! `handlers.c::handler__update` and its delete-path sibling in
//! `handlers_delete`.

use crate::module::AttrMap;
use crate::registry::LoadedHandler;
use ldrepl_cache::CacheFacade;
use ldrepl_core::model::{Command, HandlerState};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran, or was fast-pathed/filtered without running --
    /// either way this is not an error for the pump.
    Applied,
    /// `H.state & READY == 0` outside init mode.
    NotReady,
    /// The handler callable itself failed.
    HandlerFailed,
}

pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Apply one change to one handler. `new` is `None` on delete; `old`
    /// is `None` on add. `changes` is the attribute-name delta the cache
    /// computed, or `None` when the dispatcher genuinely has no delta
    /// information (there is no such call site outside of delete, which
    /// uses [`Dispatcher::apply_delete`] instead).
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_update(
        &self,
        cache: &dyn CacheFacade,
        handler: &Arc<LoadedHandler>,
        dn: &str,
        new: &mut AttrsWithApplied,
        old: Option<&AttrsWithApplied>,
        command: Command,
        changes: Option<&[String]>,
        init_mode: bool,
    ) -> DispatchOutcome {
        let name = handler.manifest.name.clone();
        let state = HandlerState(cache.read_handler_state(&name).unwrap_or(0));

        // 1. Readiness gate.
        if !state.is_ready() {
            if init_mode {
                tracing::warn!(handler = %name, "handler not ready, skipping during init");
            } else {
                tracing::warn!(handler = %name, "handler not ready, dispatch failed");
                return DispatchOutcome::NotReady;
            }
            return DispatchOutcome::Applied;
        }

        // 2. No-op gate (skipped for replication).
        if !handler.manifest.is_replication() {
            if let Some(old) = old {
                let up_to_date = old.applied.contains(&name)
                    && match changes {
                        None => true,
                        Some(delta) => {
                            !handler.manifest.attributes.is_empty()
                                && !delta.iter().any(|a| handler.manifest.attributes.contains(a))
                        }
                    };
                if up_to_date {
                    new.applied.insert(name.clone());
                    return DispatchOutcome::Applied;
                }
            }
        }

        // 3. Filter gate.
        if let Some(filter) = &handler.manifest.filter {
            if !cache.filter_matches(std::slice::from_ref(filter), dn, &new.as_cache_entry()) {
                return DispatchOutcome::Applied;
            }
        }

        // 4. Ensure prepared.
        if !handler.is_prepared() {
            if let Err(e) = handler.module.prerun().await {
                tracing::warn!(handler = %name, error = %e.0, "prerun failed");
                return DispatchOutcome::HandlerFailed;
            }
            handler.set_prepared(true);
        }

        // 5/6. Build arguments and invoke.
        let cmd_str = handler.manifest.modrdn.then(|| command.as_str());
        let old_attrs = old.map(|o| &o.attributes).cloned().unwrap_or_default();
        match handler.module.handle(dn, &new.attributes, &old_attrs, cmd_str).await {
            Ok(()) => {
                new.applied.insert(name);
                DispatchOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(handler = %name, error = %e.0, "handler invocation failed");
                DispatchOutcome::HandlerFailed
            }
        }
    }

    /// The delete path: `old` is the entry's last known state, there is
    /// no `new`.
    pub async fn apply_delete(
        &self,
        handler: &Arc<LoadedHandler>,
        dn: &str,
        old: &mut AttrsWithApplied,
        command: Command,
    ) -> DispatchOutcome {
        let name = handler.manifest.name.clone();
        let was_applied = old.applied.contains(&name);
        if !was_applied && !handler.manifest.is_replication() && !handler.manifest.handle_every_delete {
            return DispatchOutcome::Applied;
        }

        let cmd_str = handler.manifest.modrdn.then(|| command.as_str());
        let empty = AttrMap::new();
        match handler.module.handle(dn, &empty, &old.attributes, cmd_str).await {
            Ok(()) => {
                old.applied.remove(&name);
                DispatchOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(handler = %name, error = %e.0, "delete handling failed");
                DispatchOutcome::HandlerFailed
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// A DN-local view the dispatcher mutates in place: attributes plus the
/// applied-handler-name set, mirroring `ldrepl_core::model::CacheEntry`
/// but decoupled from the cache crate's serialization concerns.
#[derive(Debug, Clone, Default)]
pub struct AttrsWithApplied {
    pub attributes: AttrMap,
    pub applied: std::collections::BTreeSet<String>,
}

impl AttrsWithApplied {
    pub fn from_cache_entry(entry: ldrepl_core::model::CacheEntry) -> Self {
        Self { attributes: entry.attributes, applied: entry.applied }
    }

    pub fn as_cache_entry(&self) -> ldrepl_core::model::CacheEntry {
        ldrepl_core::model::CacheEntry {
            attributes: self.attributes.clone(),
            applied: self.applied.clone(),
        }
    }
}
