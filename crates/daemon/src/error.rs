// SPDX-License-Identifier: MIT

//! `PumpFault`: the daemon-level fault, wrapping every lower-crate error
//! into the `Retryable`/`Fatal` split used throughout the pump.

use ldrepl_cache::CacheError;
use ldrepl_core::CoreError;
use ldrepl_handlers::module::HandlerFault;
use ldrepl_ldap::LdapFault;
use ldrepl_wire::client::NotifierFault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PumpFault {
    #[error("retryable fault: {0}")]
    Retryable(String),

    #[error("fatal fault: {0}")]
    Fatal(String),
}

impl PumpFault {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }
}

impl From<NotifierFault> for PumpFault {
    fn from(e: NotifierFault) -> Self {
        PumpFault::fatal(e.to_string())
    }
}

impl From<LdapFault> for PumpFault {
    fn from(e: LdapFault) -> Self {
        if e.is_transient() {
            PumpFault::retryable(e.to_string())
        } else {
            PumpFault::fatal(e.to_string())
        }
    }
}

impl From<HandlerFault> for PumpFault {
    fn from(e: HandlerFault) -> Self {
        PumpFault::retryable(e.0)
    }
}

impl From<CacheError> for PumpFault {
    fn from(e: CacheError) -> Self {
        PumpFault::fatal(e.to_string())
    }
}

impl From<crate::journal::JournalError> for PumpFault {
    fn from(e: crate::journal::JournalError) -> Self {
        PumpFault::fatal(e.to_string())
    }
}

impl From<CoreError> for PumpFault {
    fn from(e: CoreError) -> Self {
        match e.severity() {
            ldrepl_core::Severity::Retryable => PumpFault::retryable(e.to_string()),
            ldrepl_core::Severity::Fatal => PumpFault::fatal(e.to_string()),
        }
    }
}
