// SPDX-License-Identifier: MIT

//! ldrepl-handlers: the `HandlerModule` trait, the compile-time-registered
//! `HandlerRegistry`, and the `Dispatcher` decision tree.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod dispatcher;
pub mod manifest;
pub mod module;
pub mod registry;

pub use dispatcher::{AttrsWithApplied, DispatchOutcome, Dispatcher};
pub use manifest::HandlerManifest;
pub use module::{AttrMap, HandlerFault, HandlerModule};
pub use registry::{BroadcastOutcome, HandlerRegistry, LoadedHandler, REPLICATION_HANDLER_NAME};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ldrepl_cache::{CacheFacade, CacheFake};
    use ldrepl_core::model::{handler_state_bits, Command};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingHandler {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl HandlerModule for RecordingHandler {
        fn name(&self) -> &str {
            self.name
        }

        async fn prerun(&self) -> Result<(), HandlerFault> {
            self.calls.lock().push(format!("{}:prerun", self.name));
            Ok(())
        }

        async fn handle(
            &self,
            _dn: &str,
            _new: &AttrMap,
            _old: &AttrMap,
            _cmd: Option<&str>,
        ) -> Result<(), HandlerFault> {
            self.calls.lock().push(format!("{}:handle", self.name));
            Ok(())
        }
    }

    fn ready_manifest(name: &str, priority: f64) -> HandlerManifest {
        HandlerManifest::new(name, "test handler").with_priority(priority)
    }

    #[test]
    fn registry_orders_replication_first_regardless_of_priority() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new(vec![
            (
                ready_manifest("zzz-low-priority", 1.0),
                Box::new(RecordingHandler { name: "zzz-low-priority", calls: calls.clone() }) as _,
            ),
            (
                ready_manifest("replication", 99.0),
                Box::new(RecordingHandler { name: "replication", calls: calls.clone() }) as _,
            ),
        ]);
        let order: Vec<_> = registry.dispatch_order().iter().map(|h| h.manifest.name.clone()).collect();
        assert_eq!(order, vec!["replication", "zzz-low-priority"]);
    }

    #[test]
    fn registry_sorts_by_priority_then_insertion_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new(vec![
            (ready_manifest("b", 50.0), Box::new(RecordingHandler { name: "b", calls: calls.clone() }) as _),
            (ready_manifest("a", 10.0), Box::new(RecordingHandler { name: "a", calls: calls.clone() }) as _),
            (ready_manifest("c", 50.0), Box::new(RecordingHandler { name: "c", calls: calls.clone() }) as _),
        ]);
        let order: Vec<_> = registry.iter().map(|h| h.manifest.name.clone()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn dispatch_runs_prerun_before_first_handle_only_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new(vec![(
            ready_manifest("audit", 50.0),
            Box::new(RecordingHandler { name: "audit", calls: calls.clone() }) as _,
        )]);
        let cache = CacheFake::new();
        cache.write_handler_state("audit", handler_state_bits::READY).unwrap();
        let handler = registry.find("audit").unwrap();
        let dispatcher = Dispatcher::new();

        let mut new = AttrsWithApplied::default();
        for _ in 0..2 {
            dispatcher
                .apply_update(&cache, handler, "cn=x,dc=example", &mut new, None, Command::Add, None, false)
                .await;
        }
        let calls = calls.lock();
        assert_eq!(calls.as_slice(), &["audit:prerun", "audit:handle", "audit:handle"]);
    }

    #[tokio::test]
    async fn up_to_date_fast_path_skips_handle_and_copies_applied_marker() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new(vec![(
            ready_manifest("audit", 50.0).with_attributes(["mail".to_string()]),
            Box::new(RecordingHandler { name: "audit", calls: calls.clone() }) as _,
        )]);
        let cache = CacheFake::new();
        cache.write_handler_state("audit", handler_state_bits::READY).unwrap();
        let handler = registry.find("audit").unwrap();
        let dispatcher = Dispatcher::new();

        let mut old = AttrsWithApplied::default();
        old.applied.insert("audit".to_string());
        let mut new = AttrsWithApplied::default();
        let changes = vec!["cn".to_string()];

        dispatcher
            .apply_update(
                &cache,
                handler,
                "cn=x,dc=example",
                &mut new,
                Some(&old),
                Command::Modify,
                Some(&changes),
                false,
            )
            .await;

        assert!(calls.lock().is_empty());
        assert!(new.applied.contains("audit"));
    }

    #[tokio::test]
    async fn not_ready_outside_init_mode_is_reported_as_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new(vec![(
            ready_manifest("audit", 50.0),
            Box::new(RecordingHandler { name: "audit", calls: calls.clone() }) as _,
        )]);
        let cache = CacheFake::new();
        let handler = registry.find("audit").unwrap();
        let dispatcher = Dispatcher::new();
        let mut new = AttrsWithApplied::default();

        let outcome = dispatcher
            .apply_update(&cache, handler, "cn=x,dc=example", &mut new, None, Command::Add, None, false)
            .await;
        assert_eq!(outcome, DispatchOutcome::NotReady);
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn delete_skips_handlers_that_never_applied() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new(vec![(
            ready_manifest("audit", 50.0),
            Box::new(RecordingHandler { name: "audit", calls: calls.clone() }) as _,
        )]);
        let handler = registry.find("audit").unwrap();
        let dispatcher = Dispatcher::new();
        let mut old = AttrsWithApplied::default();

        dispatcher.apply_delete(handler, "cn=x,dc=example", &mut old, Command::Delete).await;
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn delete_invokes_and_unmarks_previously_applied_handlers() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = HandlerRegistry::new(vec![(
            ready_manifest("audit", 50.0),
            Box::new(RecordingHandler { name: "audit", calls: calls.clone() }) as _,
        )]);
        let handler = registry.find("audit").unwrap();
        let dispatcher = Dispatcher::new();
        let mut old = AttrsWithApplied::default();
        old.applied.insert("audit".to_string());

        dispatcher.apply_delete(handler, "cn=x,dc=example", &mut old, Command::Delete).await;
        assert_eq!(calls.lock().as_slice(), &["audit:handle"]);
        assert!(!old.applied.contains("audit"));
    }
}
