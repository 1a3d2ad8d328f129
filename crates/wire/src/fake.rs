// SPDX-License-Identifier: MIT

//! A scripted in-memory notifier, for driving the pump's unit and scenario
//! tests without a real socket. Mirrors the template's `test-support`
//! feature convention (`oj-adapters`'s fake agent/session adapters).

use crate::client::{NotifierClient, NotifierFault, PendingHandle, PollOutcome, WaitOutcome};
use async_trait::async_trait;
use ldrepl_core::{Command, NotifierTransaction};
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted response to a `request_next_dn` call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Transaction(NotifierTransaction),
    /// `poll_result` reports [`PollOutcome::Timeout`] this many times before
    /// the queued transaction (if any) becomes ready.
    TimeoutsThen(u32, Box<ScriptedReply>),
    RemoteError(String),
}

pub struct NotifierFake {
    script: VecDeque<ScriptedReply>,
    pending: Option<(PendingHandle, ScriptedReply)>,
    pub alive_calls: u32,
    pub alive_fails: bool,
    pub reopen_calls: u32,
    next_msgid: u64,
}

impl NotifierFake {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            pending: None,
            alive_calls: 0,
            alive_fails: false,
            reopen_calls: 0,
            next_msgid: 1,
        }
    }

    pub fn push_transaction(&mut self, id: u64, dn: Option<&str>, command: Command) {
        self.script.push_back(ScriptedReply::Transaction(NotifierTransaction {
            id,
            dn: dn.map(str::to_string),
            command,
        }));
    }

    pub fn push_timeouts_then_transaction(
        &mut self,
        timeouts: u32,
        id: u64,
        dn: Option<&str>,
        command: Command,
    ) {
        self.script.push_back(ScriptedReply::TimeoutsThen(
            timeouts,
            Box::new(ScriptedReply::Transaction(NotifierTransaction {
                id,
                dn: dn.map(str::to_string),
                command,
            })),
        ));
    }
}

impl Default for NotifierFake {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotifierClient for NotifierFake {
    async fn request_next_dn(&mut self, _id: u64) -> Result<PendingHandle, NotifierFault> {
        let msgid = self.next_msgid;
        self.next_msgid += 1;
        let handle = PendingHandle(msgid);
        if let Some(reply) = self.script.pop_front() {
            self.pending = Some((handle, reply));
        }
        Ok(handle)
    }

    async fn poll_result(
        &mut self,
        handle: PendingHandle,
        _timeout: Duration,
    ) -> Result<PollOutcome, NotifierFault> {
        match &mut self.pending {
            Some((h, reply)) if *h == handle => match reply {
                ScriptedReply::TimeoutsThen(remaining, inner) => {
                    if *remaining == 0 {
                        let inner = (**inner).clone();
                        self.pending = Some((handle, inner));
                        Ok(PollOutcome::Ready)
                    } else {
                        *remaining -= 1;
                        Ok(PollOutcome::Timeout)
                    }
                }
                _ => Ok(PollOutcome::Ready),
            },
            _ => Ok(PollOutcome::Timeout),
        }
    }

    async fn get_dn_result(
        &mut self,
        handle: PendingHandle,
    ) -> Result<NotifierTransaction, NotifierFault> {
        match self.pending.take() {
            Some((h, ScriptedReply::Transaction(t))) if h == handle => Ok(t),
            Some((h, ScriptedReply::RemoteError(message))) if h == handle => {
                Err(NotifierFault::RemoteError(message))
            }
            _ => Err(NotifierFault::NoPendingReply(handle)),
        }
    }

    async fn alive(&mut self) -> Result<(), NotifierFault> {
        self.alive_calls += 1;
        if self.alive_fails {
            Err(NotifierFault::RemoteError("alive check failed".into()))
        } else {
            Ok(())
        }
    }

    async fn resend_request(&mut self, _handle: PendingHandle, _id: u64) -> Result<(), NotifierFault> {
        Ok(())
    }

    async fn wait(&mut self, _timeout: Duration) -> Result<WaitOutcome, NotifierFault> {
        if self.pending.is_some() {
            Ok(WaitOutcome::Readable)
        } else {
            Ok(WaitOutcome::Timeout)
        }
    }

    async fn reopen(&mut self) -> Result<(), NotifierFault> {
        self.reopen_calls += 1;
        Ok(())
    }
}
