use super::*;
use crate::clock::FakeClock;
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
struct Down;

#[tokio::test]
async fn transient_failure_retries_up_to_bound_then_returns_last_result() {
    let clock = FakeClock::new();
    let policy = RetryPolicy::with_cap(3, Duration::from_secs(1));
    let mut op_calls = 0u32;
    let mut reconnect_calls = 0u32;

    let result: Result<(), Down> = policy
        .run(
            &clock,
            || {
                op_calls += 1;
                std::future::ready(Err(Down))
            },
            |r: &Result<(), Down>| if r.is_err() { Outcome::Transient } else { Outcome::Done },
            || {
                reconnect_calls += 1;
                std::future::ready(Ok(()))
            },
        )
        .await;

    assert_eq!(result, Err(Down));
    // initial attempt + 3 retries = 4 total calls (N + 1)
    assert_eq!(op_calls, 4);
    assert_eq!(reconnect_calls, 3);
}

#[tokio::test]
async fn success_short_circuits_without_reconnect() {
    let clock = FakeClock::new();
    let policy = RetryPolicy::new(5);
    let mut op_calls = 0u32;
    let mut reconnect_calls = 0u32;

    let result: Result<u32, Down> = policy
        .run(
            &clock,
            || {
                op_calls += 1;
                std::future::ready(Ok(42))
            },
            |r: &Result<u32, Down>| if r.is_err() { Outcome::Transient } else { Outcome::Done },
            || {
                reconnect_calls += 1;
                std::future::ready(Ok(()))
            },
        )
        .await;

    assert_eq!(result, Ok(42));
    assert_eq!(op_calls, 1);
    assert_eq!(reconnect_calls, 0);
}

#[tokio::test]
async fn fatal_classification_does_not_retry() {
    let clock = FakeClock::new();
    let policy = RetryPolicy::new(5);
    let mut op_calls = 0u32;

    let result: Result<(), Down> = policy
        .run(
            &clock,
            || {
                op_calls += 1;
                std::future::ready(Err(Down))
            },
            |_: &Result<(), Down>| Outcome::Done,
            || std::future::ready(Ok(())),
        )
        .await;

    assert_eq!(result, Err(Down));
    assert_eq!(op_calls, 1);
}

#[tokio::test]
async fn recovers_once_reconnect_and_op_succeed() {
    let clock = FakeClock::new();
    let policy = RetryPolicy::new(5);
    let mut op_calls = 0u32;

    let result: Result<u32, Down> = policy
        .run(
            &clock,
            || {
                op_calls += 1;
                if op_calls < 3 {
                    std::future::ready(Err(Down))
                } else {
                    std::future::ready(Ok(7))
                }
            },
            |r: &Result<u32, Down>| if r.is_err() { Outcome::Transient } else { Outcome::Done },
            || std::future::ready(Ok(())),
        )
        .await;

    assert_eq!(result, Ok(7));
    assert_eq!(op_calls, 3);
}

#[tokio::test]
async fn backoff_is_capped() {
    let clock = FakeClock::new();
    let policy = RetryPolicy::with_cap(10, Duration::from_secs(4));
    let start_ms = clock.epoch_ms();
    let mut op_calls = 0u32;

    let _result: Result<(), Down> = policy
        .run(
            &clock,
            || {
                op_calls += 1;
                std::future::ready(Err(Down))
            },
            |_: &Result<(), Down>| Outcome::Transient,
            || std::future::ready(Ok(())),
        )
        .await;

    // Every backoff should have been clamped to the 4s cap, so 10 retries
    // advance the fake clock by at most 40s (in practice exactly 40s since
    // 2^attempt exceeds the cap quickly).
    let elapsed_ms = clock.epoch_ms() - start_ms;
    assert!(elapsed_ms <= 40_000, "elapsed {elapsed_ms}ms exceeded capped backoff budget");
}

proptest! {
    #[test]
    fn backoff_delay_never_exceeds_cap(attempt in 0u32..1000, cap_secs in 1u64..64) {
        let cap = Duration::from_secs(cap_secs);
        let delay = backoff_delay(attempt, cap);
        prop_assert!(delay <= cap);
    }

    #[test]
    fn backoff_delay_is_monotonic_until_capped(attempt in 0u32..4, cap_secs in 32u64..64) {
        let cap = Duration::from_secs(cap_secs);
        let this = backoff_delay(attempt, cap);
        let next = backoff_delay(attempt + 1, cap);
        prop_assert!(next >= this);
    }
}
