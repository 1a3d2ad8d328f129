// SPDX-License-Identifier: MIT

//! The `NotifierClient` trait and its real TCP-backed implementation.
//!
//! The operations mirror `notifier.c`'s driving calls exactly:
//! `notifier_get_dn` -> [`NotifierClient::request_next_dn`],
//! `notifier_get_msg` -> [`NotifierClient::poll_result`],
//! `notifier_get_dn_result` -> [`NotifierClient::get_dn_result`],
//! `notifier_alive_s` -> [`NotifierClient::alive`],
//! `notifier_resend_get_dn` -> [`NotifierClient::resend_request`],
//! `notifier_wait` -> [`NotifierClient::wait`].

use crate::protocol::{read_message, write_message, NotifierReply, NotifierRequest, ProtocolError};
use async_trait::async_trait;
use ldrepl_core::{Command, NotifierTransaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum NotifierFault {
    #[error("not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("no reply pending for handle {0:?}")]
    NoPendingReply(PendingHandle),
    #[error("notifier returned an error: {0}")]
    RemoteError(String),
    #[error("notifier returned an unrecognized command byte: {0}")]
    BadCommand(#[from] ldrepl_core::UnknownCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Ready,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Readable,
    Timeout,
}

/// Request/response channel to the change stream. One instance is the
/// process-wide singleton the pump owns; `reopen` closes and re-establishes
/// the underlying connection in place.
#[async_trait]
pub trait NotifierClient: Send + Sync {
    async fn request_next_dn(&mut self, id: u64) -> Result<PendingHandle, NotifierFault>;
    async fn poll_result(
        &mut self,
        handle: PendingHandle,
        timeout: Duration,
    ) -> Result<PollOutcome, NotifierFault>;
    async fn get_dn_result(
        &mut self,
        handle: PendingHandle,
    ) -> Result<NotifierTransaction, NotifierFault>;
    async fn alive(&mut self) -> Result<(), NotifierFault>;
    async fn resend_request(&mut self, handle: PendingHandle, id: u64) -> Result<(), NotifierFault>;
    async fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, NotifierFault>;
    async fn reopen(&mut self) -> Result<(), NotifierFault>;
}

/// Real notifier client, speaking the length-prefixed JSON framing in
/// [`crate::protocol`] over a TCP connection.
pub struct TcpNotifierClient {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    next_msgid: AtomicU64,
    buffered: Option<NotifierReply>,
}

impl TcpNotifierClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
            next_msgid: AtomicU64::new(1),
            buffered: None,
        }
    }

    fn alloc_msgid(&self) -> u64 {
        self.next_msgid.fetch_add(1, Ordering::Relaxed)
    }

    async fn send(&mut self, request: &NotifierRequest) -> Result<(), NotifierFault> {
        let stream = self.stream.as_mut().ok_or(NotifierFault::NotConnected)?;
        write_message(stream, request).await.map_err(NotifierFault::from)
    }
}

#[async_trait]
impl NotifierClient for TcpNotifierClient {
    async fn request_next_dn(&mut self, id: u64) -> Result<PendingHandle, NotifierFault> {
        let msgid = self.alloc_msgid();
        self.send(&NotifierRequest::GetDn { id }).await?;
        Ok(PendingHandle(msgid))
    }

    async fn poll_result(
        &mut self,
        handle: PendingHandle,
        timeout: Duration,
    ) -> Result<PollOutcome, NotifierFault> {
        let stream = self.stream.as_mut().ok_or(NotifierFault::NotConnected)?;
        match tokio::time::timeout(timeout, read_message::<_, NotifierReply>(stream)).await {
            Ok(Ok(reply)) => {
                if reply.msgid() == handle.0 {
                    self.buffered = Some(reply);
                    Ok(PollOutcome::Ready)
                } else {
                    // A stale reply for a superseded request; drop it and
                    // report timeout so the pump re-polls.
                    Ok(PollOutcome::Timeout)
                }
            }
            Ok(Err(e)) => Err(NotifierFault::from(e)),
            Err(_elapsed) => Ok(PollOutcome::Timeout),
        }
    }

    async fn get_dn_result(
        &mut self,
        handle: PendingHandle,
    ) -> Result<NotifierTransaction, NotifierFault> {
        let reply = self.buffered.take().ok_or(NotifierFault::NoPendingReply(handle))?;
        match reply {
            NotifierReply::Transaction { id, dn, command, .. } => {
                let command = Command::try_from(command)?;
                Ok(NotifierTransaction { id, dn, command })
            }
            NotifierReply::Err { message, .. } => Err(NotifierFault::RemoteError(message)),
            NotifierReply::Ack { .. } => Err(NotifierFault::RemoteError(
                "expected a transaction reply, got an ack".into(),
            )),
        }
    }

    async fn alive(&mut self) -> Result<(), NotifierFault> {
        self.send(&NotifierRequest::Alive).await?;
        let stream = self.stream.as_mut().ok_or(NotifierFault::NotConnected)?;
        match read_message::<_, NotifierReply>(stream).await? {
            NotifierReply::Ack { .. } => Ok(()),
            NotifierReply::Err { message, .. } => Err(NotifierFault::RemoteError(message)),
            other => Err(NotifierFault::RemoteError(format!("unexpected reply to ALIVE: {other:?}"))),
        }
    }

    async fn resend_request(&mut self, handle: PendingHandle, id: u64) -> Result<(), NotifierFault> {
        self.send(&NotifierRequest::Resend { msgid: handle.0, id }).await
    }

    async fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome, NotifierFault> {
        let stream = self.stream.as_ref().ok_or(NotifierFault::NotConnected)?;
        match tokio::time::timeout(timeout, stream.readable()).await {
            Ok(Ok(())) => Ok(WaitOutcome::Readable),
            Ok(Err(e)) => Err(NotifierFault::Protocol(ProtocolError::Io(e))),
            Err(_elapsed) => Ok(WaitOutcome::Timeout),
        }
    }

    async fn reopen(&mut self) -> Result<(), NotifierFault> {
        self.stream = None;
        self.buffered = None;
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| NotifierFault::Protocol(ProtocolError::Io(e)))?;
        write_message(&mut stream, &NotifierRequest::NewClient).await?;
        self.stream = Some(stream);
        Ok(())
    }
}
