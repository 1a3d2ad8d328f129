// SPDX-License-Identifier: MIT

//! ldrepl-wire: the notifier wire protocol and the `NotifierClient` trait
//! the transaction pump drives.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod protocol;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use client::{NotifierClient, NotifierFault, PendingHandle, PollOutcome, TcpNotifierClient, WaitOutcome};
pub use protocol::{decode, encode, read_message, write_message, NotifierReply, NotifierRequest, ProtocolError};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{NotifierFake, ScriptedReply};
