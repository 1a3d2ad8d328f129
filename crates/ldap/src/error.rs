// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Faults an `LdapClient` operation can report. `ServerDown` is the one
/// variant the retry policy classifies as transient -- matching
/// `LDAP_RETRY`'s `_rv != LDAP_SERVER_DOWN` check in `utils.h`.
#[derive(Debug, Error)]
pub enum LdapFault {
    #[error("LDAP server is down")]
    ServerDown,

    #[error("bind failed: {0}")]
    BindFailed(String),

    #[error("no such attribute on translog entry for transaction {0}")]
    NoSuchAttribute(u64),

    #[error("translog entry for transaction {0} not found")]
    NotFound(u64),

    #[error("malformed reqType on translog entry for transaction {0}")]
    MalformedCommand(u64),

    #[error("ldap error: {0}")]
    Other(String),
}

impl LdapFault {
    pub fn is_transient(&self) -> bool {
        matches!(self, LdapFault::ServerDown)
    }
}
