// SPDX-License-Identifier: MIT

//! Bounded exponential-backoff retry shared by the LDAP and notifier
//! clients: one higher-order async function taking the operation, a
//! transient/fatal classifier, and a reconnect closure, in place of the
//! `LDAP_RETRY`/`NOTIFIER_RETRY` preprocessor macros the notifier protocol
//! was originally specified around.

use crate::clock::Clock;
use std::future::Future;
use std::time::Duration;

/// How a `RetryPolicy` should react to one attempt's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Success, or a failure that retrying won't fix; return immediately.
    Done,
    /// A connection-shaped failure; reconnect and try again.
    Transient,
}

const BACKOFF_CAP: Duration = Duration::from_secs(32);

fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    let exp = attempt.min(5);
    let secs = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
    Duration::from_secs(secs).min(cap)
}

/// A bounded exponential-backoff wrapper shared by the LDAP and notifier
/// clients. `max_attempts` allows up to that many retries after the first
/// attempt, i.e. at most `max_attempts + 1` calls to the wrapped operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    cap: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts, cap: BACKOFF_CAP }
    }

    #[cfg(test)]
    pub fn with_cap(max_attempts: u32, cap: Duration) -> Self {
        Self { max_attempts, cap }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op`, reconnecting and retrying while `classify` reports
    /// [`Outcome::Transient`]. The reconnect closure is itself retried with
    /// the same backoff schedule. The final return value is whatever the
    /// last attempt at `op` produced -- this wrapper never synthesizes a
    /// success.
    pub async fn run<C, T, E, Op, OpFut, Classify, Reconnect, ReconnectFut>(
        &self,
        clock: &C,
        mut op: Op,
        classify: Classify,
        mut reconnect: Reconnect,
    ) -> Result<T, E>
    where
        C: Clock,
        Op: FnMut() -> OpFut,
        OpFut: Future<Output = Result<T, E>>,
        Classify: Fn(&Result<T, E>) -> Outcome,
        Reconnect: FnMut() -> ReconnectFut,
        ReconnectFut: Future<Output = Result<(), E>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = op().await;
            if classify(&result) != Outcome::Transient {
                return result;
            }
            if attempt >= self.max_attempts {
                return result;
            }
            let _ = self.reconnect_with_retry(clock, &mut reconnect).await;
            let delay = backoff_delay(attempt, self.cap);
            attempt += 1;
            clock.sleep(delay).await;
        }
    }

    async fn reconnect_with_retry<C, E, Reconnect, ReconnectFut>(
        &self,
        clock: &C,
        reconnect: &mut Reconnect,
    ) -> Result<(), E>
    where
        C: Clock,
        Reconnect: FnMut() -> ReconnectFut,
        ReconnectFut: Future<Output = Result<(), E>>,
    {
        let mut attempt = 0u32;
        loop {
            match reconnect().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    let delay = backoff_delay(attempt, self.cap);
                    attempt += 1;
                    clock.sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
