// SPDX-License-Identifier: MIT

//! ldrepl-ldap: the `LdapClient` trait the pump uses to bind, fetch
//! translog records, fetch entries, and idle-close the connection.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod error;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{Ldap3Client, LdapClient, TRANSLOG_SEARCH_TIMEOUT};
pub use error::LdapFault;

#[cfg(any(test, feature = "test-support"))]
pub use fake::LdapFake;
