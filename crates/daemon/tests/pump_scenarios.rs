// SPDX-License-Identifier: MIT

//! Scenario tests driving [`ldrepl_daemon::pump::TransactionPump::iterate`]
//! through the S1-S9 states with scripted fakes.

use async_trait::async_trait;
use ldrepl_cache::{CacheFacade, CacheFake};
use ldrepl_core::model::{CacheEntry, Command, MasterCursor};
use ldrepl_core::retry::RetryPolicy;
use ldrepl_core::FakeClock;
use ldrepl_daemon::pump::TransactionPump;
use ldrepl_handlers::module::{AttrMap, HandlerFault};
use ldrepl_handlers::{HandlerManifest, HandlerModule, HandlerRegistry};
use ldrepl_ldap::LdapFake;
use ldrepl_wire::NotifierFake;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A handler that records every `handle()` call it receives into a shared
/// log the test retains a handle to, since `HandlerRegistry` only exposes
/// handlers through `&dyn HandlerModule`.
struct RecordingHandler {
    name: &'static str,
    calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

#[async_trait]
impl HandlerModule for RecordingHandler {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(
        &self,
        dn: &str,
        _new: &AttrMap,
        _old: &AttrMap,
        cmd: Option<&str>,
    ) -> Result<(), HandlerFault> {
        self.calls.lock().unwrap().push((dn.to_string(), cmd.map(str::to_string)));
        Ok(())
    }
}

fn registry_with_recorder(name: &'static str) -> (HandlerRegistry, Arc<Mutex<Vec<(String, Option<String>)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let handler = RecordingHandler { name, calls: calls.clone() };
    let manifest = HandlerManifest::new(name, "test handler").with_modrdn(true);
    (HandlerRegistry::new(vec![(manifest, Box::new(handler))]), calls)
}

/// A handler that fails its first `handle()` call and succeeds every call
/// after, so tests can drive the "handler failed, retry same id" path.
struct FlakyHandler {
    name: &'static str,
    remaining_failures: AtomicU32,
}

#[async_trait]
impl HandlerModule for FlakyHandler {
    fn name(&self) -> &str {
        self.name
    }

    async fn handle(&self, _dn: &str, _new: &AttrMap, _old: &AttrMap, _cmd: Option<&str>) -> Result<(), HandlerFault> {
        if self.remaining_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            return Err(HandlerFault("simulated failure".to_string()));
        }
        Ok(())
    }
}

fn make_pump(
    notifier: NotifierFake,
    ldap: LdapFake,
    cache: CacheFake,
    registry: HandlerRegistry,
) -> TransactionPump<NotifierFake, LdapFake, CacheFake, FakeClock> {
    TransactionPump::new(
        notifier,
        ldap,
        cache,
        FakeClock::new(),
        registry,
        RetryPolicy::new(3),
        RetryPolicy::new(3),
        None,
        0,
        PathBuf::from("/tmp/ldrepl-test-cache"),
    )
}

#[tokio::test]
async fn add_with_inline_dn_dispatches_to_handler_and_advances_cursor() {
    let mut notifier = NotifierFake::new();
    notifier.push_transaction(1, Some("cn=alice,dc=example,dc=com"), Command::Add);
    let mut ldap = LdapFake::new();
    ldap.entries.insert(
        "cn=alice,dc=example,dc=com".to_string(),
        CacheEntry { attributes: Default::default(), applied: Default::default() },
    );
    let cache = CacheFake::new();
    cache.write_handler_state("greeter", 1).unwrap();
    let (registry, calls) = registry_with_recorder("greeter");

    let mut pump = make_pump(notifier, ldap, cache, registry);
    pump.iterate().await.expect("iterate should succeed");

    assert_eq!(
        *calls.lock().unwrap(),
        vec![("cn=alice,dc=example,dc=com".to_string(), Some("a".to_string()))]
    );
    assert_eq!(pump.cache().get_master_cursor().unwrap(), MasterCursor { last_applied_id: 1 });
}

#[tokio::test]
async fn sentinel_command_resolves_dn_via_translog() {
    let mut notifier = NotifierFake::new();
    notifier.push_transaction(1, None, Command::ResolveViaTranslog);
    let ldap = LdapFake::new().with_translog(1, "cn=bob,dc=example,dc=com", Command::Modify);
    let cache = CacheFake::new();
    cache.write_handler_state("greeter", 1).unwrap();
    let (registry, calls) = registry_with_recorder("greeter");

    let mut pump = make_pump(notifier, ldap, cache, registry);
    pump.iterate().await.expect("iterate should succeed");

    assert_eq!(calls.lock().unwrap()[0].0, "cn=bob,dc=example,dc=com");
    assert_eq!(pump.cache().get_master_cursor().unwrap(), MasterCursor { last_applied_id: 1 });
}

#[tokio::test]
async fn handler_failure_holds_the_cursor_for_a_retry() {
    let mut notifier = NotifierFake::new();
    // Same id requested twice: the first `iterate` fails and must not
    // advance the cursor, so a second `iterate` re-requests id 1.
    notifier.push_transaction(1, Some("cn=frank,dc=example,dc=com"), Command::Add);
    notifier.push_transaction(1, Some("cn=frank,dc=example,dc=com"), Command::Add);
    let mut ldap = LdapFake::new();
    ldap.entries.insert(
        "cn=frank,dc=example,dc=com".to_string(),
        CacheEntry { attributes: Default::default(), applied: Default::default() },
    );
    let cache = CacheFake::new();
    cache.write_handler_state("flaky", 1).unwrap();
    let manifest = HandlerManifest::new("flaky", "test handler");
    let handler = FlakyHandler { name: "flaky", remaining_failures: AtomicU32::new(1) };
    let registry = HandlerRegistry::new(vec![(manifest, Box::new(handler))]);

    let mut pump = make_pump(notifier, ldap, cache, registry);

    let err = pump.iterate().await.expect_err("first attempt should fail");
    assert!(matches!(err, ldrepl_daemon::PumpFault::Retryable(_)));
    assert_eq!(pump.cache().get_master_cursor().unwrap(), MasterCursor { last_applied_id: 0 });

    pump.iterate().await.expect("retry should succeed once the handler recovers");
    assert_eq!(pump.cache().get_master_cursor().unwrap(), MasterCursor { last_applied_id: 1 });
}

#[tokio::test]
async fn delete_skips_non_replication_handler_that_never_applied() {
    let mut notifier = NotifierFake::new();
    notifier.push_transaction(1, Some("cn=carol,dc=example,dc=com"), Command::Delete);
    let ldap = LdapFake::new();
    let cache = CacheFake::new();
    cache.seed_entry(
        "cn=carol,dc=example,dc=com",
        CacheEntry { attributes: Default::default(), applied: Default::default() },
    );
    let (registry, calls) = registry_with_recorder("greeter");

    let mut pump = make_pump(notifier, ldap, cache, registry);
    pump.iterate().await.expect("iterate should succeed");

    assert!(calls.lock().unwrap().is_empty());
    assert!(pump.cache().get_entry("cn=carol,dc=example,dc=com").unwrap().is_none());
}

#[tokio::test]
async fn mismatched_transaction_id_is_fatal() {
    let mut notifier = NotifierFake::new();
    notifier.push_transaction(5, Some("cn=dave,dc=example,dc=com"), Command::Add);
    let ldap = LdapFake::new();
    let cache = CacheFake::new();
    let (registry, _calls) = registry_with_recorder("greeter");

    let mut pump = make_pump(notifier, ldap, cache, registry);
    assert!(pump.iterate().await.is_err());
}

#[tokio::test]
async fn idle_timeout_runs_postrun_then_widens_to_alive_deadline() {
    let mut notifier = NotifierFake::new();
    notifier.push_timeouts_then_transaction(1, 1, Some("cn=erin,dc=example,dc=com"), Command::Add);
    let ldap = LdapFake::new();
    let cache = CacheFake::new();
    let (registry, _calls) = registry_with_recorder("greeter");

    let mut pump = make_pump(notifier, ldap, cache, registry);
    pump.iterate().await.expect("iterate should succeed");

    assert_eq!(pump.cache().get_master_cursor().unwrap(), MasterCursor { last_applied_id: 1 });
}
