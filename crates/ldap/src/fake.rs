// SPDX-License-Identifier: MIT

//! A scripted in-memory LDAP client for pump/dispatcher tests.

use crate::client::LdapClient;
use crate::error::LdapFault;
use async_trait::async_trait;
use ldrepl_core::{CacheEntry, Command};
use std::collections::HashMap;

#[derive(Default)]
pub struct LdapFake {
    open: bool,
    pub translog: HashMap<u64, Result<(String, Command), LdapFault>>,
    pub entries: HashMap<String, CacheEntry>,
    pub open_calls: u32,
    pub unbind_calls: u32,
}

impl LdapFake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translog(mut self, id: u64, dn: &str, command: Command) -> Self {
        self.translog.insert(id, Ok((dn.to_string(), command)));
        self
    }

    pub fn with_translog_fault(mut self, id: u64, fault: LdapFault) -> Self {
        self.translog.insert(id, Err(fault));
        self
    }

    pub fn with_entry(mut self, dn: &str, entry: CacheEntry) -> Self {
        self.entries.insert(dn.to_string(), entry);
        self
    }
}

fn clone_fault(fault: &LdapFault) -> LdapFault {
    match fault {
        LdapFault::ServerDown => LdapFault::ServerDown,
        LdapFault::BindFailed(s) => LdapFault::BindFailed(s.clone()),
        LdapFault::NoSuchAttribute(id) => LdapFault::NoSuchAttribute(*id),
        LdapFault::NotFound(id) => LdapFault::NotFound(*id),
        LdapFault::MalformedCommand(id) => LdapFault::MalformedCommand(*id),
        LdapFault::Other(s) => LdapFault::Other(s.clone()),
    }
}

#[async_trait]
impl LdapClient for LdapFake {
    async fn open_if_closed(&mut self) -> Result<(), LdapFault> {
        self.open_calls += 1;
        self.open = true;
        Ok(())
    }

    async fn unbind_if_idle(&mut self) -> Result<(), LdapFault> {
        self.unbind_calls += 1;
        self.open = false;
        Ok(())
    }

    async fn fetch_translog(&mut self, id: u64) -> Result<(String, Command), LdapFault> {
        match self.translog.get(&id) {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(e)) => Err(clone_fault(e)),
            None => Err(LdapFault::NotFound(id)),
        }
    }

    async fn fetch_entry(&mut self, dn: &str) -> Result<Option<CacheEntry>, LdapFault> {
        Ok(self.entries.get(dn).cloned())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
