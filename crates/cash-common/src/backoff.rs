//! Exponential backoff with jitter, used by the ERP Facade's retry loop
//! (spec §4.2) and the Communicator's delivery retry (spec §4.5).

use std::time::Duration;

use rand::Rng;

const INITIAL_WAIT_MS: u64 = 250;
const EXP_BASE: u64 = 2;

/// Returns an infinite iterator of backoff durations: `INITIAL_WAIT_MS *
/// EXP_BASE^n`, each jittered by +/-20% and capped at `max_wait`. Callers
/// `.take(n)` to bound the number of retries and separately enforce any
/// total-elapsed cap (spec §4.2: "capped at 60s total").
pub fn get_backoff_iter(max_wait: Duration) -> impl Iterator<Item = Duration> {
    let max_wait_ms = max_wait.as_millis() as u64;
    (0u32..).map(move |n| {
        let base = INITIAL_WAIT_MS.saturating_mul(EXP_BASE.saturating_pow(n));
        let capped = base.min(max_wait_ms);
        let jitter_frac = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_millis(((capped as f64) * jitter_frac) as u64)
    })
}

/// Runs `op` up to `max_attempts` times (the first attempt plus
/// `max_attempts - 1` retries), sleeping per [`get_backoff_iter`] between
/// attempts, stopping early the first time `should_retry` returns `false`
/// for the returned error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    max_wait: Duration,
    mut should_retry: impl FnMut(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut backoffs = get_backoff_iter(max_wait);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && should_retry(&e) => {
                let wait = backoffs.next().expect("infinite iterator");
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_integer_overflow() {
        let mut iter = get_backoff_iter(Duration::from_secs(60));
        for _ in 0..1000 {
            let d = iter.next().unwrap();
            assert!(d <= Duration::from_millis(60_000 * 2));
        }
    }

    #[test]
    fn converges_to_cap() {
        let cap = Duration::from_millis(2_000);
        let mut iter = get_backoff_iter(cap);
        let last = iter.by_ref().take(20).last().unwrap();
        assert!(last <= cap + cap / 5);
    }

    #[tokio::test]
    async fn retry_with_backoff_stops_on_success() {
        let mut calls = 0;
        let result: Result<u32, &str> = retry_with_backoff(
            5,
            Duration::from_millis(10),
            |_e: &&str| true,
            || {
                calls += 1;
                async move {
                    if calls < 3 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn retry_with_backoff_stops_when_not_retryable() {
        let mut calls = 0;
        let result: Result<u32, &str> = retry_with_backoff(
            5,
            Duration::from_millis(10),
            |_e: &&str| false,
            || {
                calls += 1;
                async move { Err("permanent") }
            },
        )
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls, 1);
    }
}
