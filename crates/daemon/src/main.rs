// SPDX-License-Identifier: MIT

//! `ldreplicad`: wires configuration, handler registry, and clients into a
//! [`ldrepl_daemon::TransactionPump`] and runs it.

use clap::Parser;
use ldrepl_cache::JsonCache;
use ldrepl_core::retry::RetryPolicy;
use ldrepl_core::SystemClock;
use ldrepl_daemon::{build_registry, cli::Cli, config::Config, journal::Journal, pump::TransactionPump, startup};
use ldrepl_ldap::Ldap3Client;
use ldrepl_wire::TcpNotifierClient;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ldreplicad: {e}");
            return ExitCode::FAILURE;
        }
    };

    ldrepl_daemon::logging::init(&config.log);

    if let Err(e) = run(config, cli.once).await {
        tracing::error!(fault = %e, "ldreplicad exiting");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(config: Config, once: bool) -> Result<(), ldrepl_daemon::PumpFault> {
    let bind_pw = std::fs::read_to_string(&config.ldap.bind_pw_file)
        .map_err(|e| ldrepl_daemon::PumpFault::fatal(format!("reading {}: {e}", config.ldap.bind_pw_file.display())))?;
    let bind_pw = bind_pw.trim_end_matches(['\n', '\r']).to_string();

    let notifier = TcpNotifierClient::new(config.notifier.host.clone(), config.notifier.port);
    let ldap = Ldap3Client::new(config.ldap.uri.clone(), config.ldap.bind_dn.clone(), bind_pw);
    let cache = JsonCache::new(config.cache.dir.clone());
    let clock = SystemClock;

    let registry = build_registry(&config);
    startup::ensure_handlers_ready(&cache, &registry).await?;

    let journal = if config.journal.enabled {
        let dir = config.journal.dir.clone().unwrap_or_else(|| config.cache.dir.join("journal"));
        Some(Journal::new(&dir))
    } else {
        None
    };

    let mut pump = TransactionPump::new(
        notifier,
        ldap,
        cache,
        clock,
        registry,
        RetryPolicy::new(config.ldap.retries),
        RetryPolicy::new(config.notifier.retries),
        journal,
        config.listener.freespace,
        config.cache.dir.clone(),
    );

    if once {
        pump.iterate().await
    } else {
        pump.run().await
    }
}
