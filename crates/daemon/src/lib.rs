// SPDX-License-Identifier: MIT

//! ldrepl-daemon: configuration, handler registration, the transaction
//! pump, and idle maintenance -- the binary crate that assembles every
//! other crate in this workspace into `ldreplicad`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod builtin_handlers;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod journal;
pub mod logging;
pub mod pump;
pub mod startup;

pub use config::Config;
pub use error::PumpFault;
pub use pump::TransactionPump;

use ldrepl_handlers::{HandlerManifest, HandlerModule, HandlerRegistry};

/// Build the registry from this deployment's compile-time-registered
/// handlers, then apply any manifest overrides found in the configured
/// handler directories.
pub fn build_registry(config: &Config) -> HandlerRegistry {
    let replication = builtin_handlers::ReplicationHandler::new(config.cache.dir.join("replica"));
    let audit_log = builtin_handlers::AuditLogHandler::new();

    let handlers: Vec<(HandlerManifest, Box<dyn HandlerModule>)> = vec![
        (builtin_handlers::ReplicationHandler::manifest(), Box::new(replication)),
        (builtin_handlers::AuditLogHandler::manifest(), Box::new(audit_log)),
    ];

    let mut registry = HandlerRegistry::new(handlers);
    for dir in &config.handlers.dirs {
        registry.load_dir(dir);
    }
    registry
}
