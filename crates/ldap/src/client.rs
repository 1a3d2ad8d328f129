// SPDX-License-Identifier: MIT

//! The `LdapClient` trait and its `ldap3`-backed implementation.
//!
//! Operations mirror `notifier.c`/`handlers.c` exactly: `open_if_closed`
//! is `univention_ldap_open` guarded by `trans.lp->ld == NULL`;
//! `fetch_translog` is `notifier_wait_id_result`'s search for
//! `reqSession=<id>,cn=translog`; `unbind_if_idle` is the idle-timeout
//! `ldap_unbind_ext` call in `notifier_listen`.

use crate::error::LdapFault;
use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry};
use ldrepl_core::{CacheEntry, Command};
use std::collections::BTreeMap;
use std::time::Duration;

/// The translog search timeout, matching the notifier's own idle bound.
pub const TRANSLOG_SEARCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[async_trait]
pub trait LdapClient: Send + Sync {
    /// Idempotent bind. A no-op if already connected.
    async fn open_if_closed(&mut self) -> Result<(), LdapFault>;

    /// Close the connection to release server resources during idle
    /// periods. A no-op if already closed.
    async fn unbind_if_idle(&mut self) -> Result<(), LdapFault>;

    /// Search `reqSession=<id>,cn=translog` for `{reqType, reqDN}`.
    async fn fetch_translog(&mut self, id: u64) -> Result<(String, Command), LdapFault>;

    /// Fetch the current attributes of `dn`, or `None` if the entry no
    /// longer exists (the common case right after a delete).
    async fn fetch_entry(&mut self, dn: &str) -> Result<Option<CacheEntry>, LdapFault>;

    fn is_open(&self) -> bool;
}

pub struct Ldap3Client {
    uri: String,
    bind_dn: String,
    bind_pw: String,
    conn: Option<Ldap>,
}

impl Ldap3Client {
    pub fn new(uri: impl Into<String>, bind_dn: impl Into<String>, bind_pw: impl Into<String>) -> Self {
        Self { uri: uri.into(), bind_dn: bind_dn.into(), bind_pw: bind_pw.into(), conn: None }
    }

    fn classify_err(err: &ldap3::LdapError) -> LdapFault {
        // ldap3 surfaces a dropped/reset connection as an IO error rather
        // than a typed "server down" result code; both map to the
        // transient category the retry policy reconnects on.
        match err {
            ldap3::LdapError::Io { .. } => LdapFault::ServerDown,
            other => LdapFault::Other(other.to_string()),
        }
    }
}

#[async_trait]
impl LdapClient for Ldap3Client {
    async fn open_if_closed(&mut self) -> Result<(), LdapFault> {
        if self.conn.is_some() {
            return Ok(());
        }
        let (conn, mut ldap) =
            LdapConnAsync::new(&self.uri).await.map_err(|e| Self::classify_err(&e))?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "ldap connection driver exited");
            }
        });
        ldap.simple_bind(&self.bind_dn, &self.bind_pw)
            .await
            .map_err(|e| Self::classify_err(&e))?
            .success()
            .map_err(|e| LdapFault::BindFailed(e.to_string()))?;
        self.conn = Some(ldap);
        Ok(())
    }

    async fn unbind_if_idle(&mut self) -> Result<(), LdapFault> {
        if let Some(mut ldap) = self.conn.take() {
            let _ = ldap.unbind().await;
        }
        Ok(())
    }

    async fn fetch_translog(&mut self, id: u64) -> Result<(String, Command), LdapFault> {
        self.open_if_closed().await?;
        let ldap = self.conn.as_mut().ok_or(LdapFault::ServerDown)?;
        let base = format!("reqSession={id},cn=translog");

        let (results, _) = ldap
            .with_timeout(TRANSLOG_SEARCH_TIMEOUT)
            .search(&base, Scope::Base, "(objectClass=*)", vec!["reqType", "reqDN"])
            .await
            .map_err(|e| Self::classify_err(&e))?
            .success()
            .map_err(|e| LdapFault::Other(e.to_string()))?;

        let raw = results.into_iter().next().ok_or(LdapFault::NotFound(id))?;
        let entry = SearchEntry::construct(raw);

        let dn = entry
            .attrs
            .get("reqDN")
            .and_then(|vals| vals.first())
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or(LdapFault::NoSuchAttribute(id))?;

        let command_str = entry
            .attrs
            .get("reqType")
            .and_then(|vals| vals.first())
            .ok_or(LdapFault::NoSuchAttribute(id))?;
        let command_byte = command_str.as_bytes();
        if command_byte.len() != 1 {
            return Err(LdapFault::MalformedCommand(id));
        }
        let command = Command::try_from(command_byte[0]).map_err(|_| LdapFault::MalformedCommand(id))?;

        Ok((dn, command))
    }

    async fn fetch_entry(&mut self, dn: &str) -> Result<Option<CacheEntry>, LdapFault> {
        self.open_if_closed().await?;
        let ldap = self.conn.as_mut().ok_or(LdapFault::ServerDown)?;

        let (results, _) = ldap
            .search(dn, Scope::Base, "(objectClass=*)", vec!["*", "+"])
            .await
            .map_err(|e| Self::classify_err(&e))?
            .success()
            .map_err(|e| LdapFault::Other(e.to_string()))?;

        let Some(raw) = results.into_iter().next() else {
            return Ok(None);
        };
        let parsed = SearchEntry::construct(raw);
        let mut attributes: BTreeMap<String, Vec<Vec<u8>>> = BTreeMap::new();
        for (name, values) in parsed.attrs {
            attributes.insert(name, values.into_iter().map(String::into_bytes).collect());
        }
        for (name, values) in parsed.bin_attrs {
            attributes.insert(name, values);
        }

        Ok(Some(CacheEntry { attributes, applied: Default::default() }))
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}
