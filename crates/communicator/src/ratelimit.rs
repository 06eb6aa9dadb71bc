//! Per-recipient token bucket (spec §4.5: "default 10/min per recipient,"
//! to avoid notification storms).

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// `per_minute` tokens refill continuously; the bucket holds at most
    /// `per_minute` tokens at once.
    pub fn new(per_minute: u32) -> Self {
        RateLimiter {
            capacity: per_minute as f64,
            refill_per_sec: per_minute as f64 / 60.0,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to consume one token for `recipient`. Returns `true` if
    /// allowed, `false` if the recipient is currently rate-limited.
    pub fn try_acquire(&self, recipient: &str) -> bool {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets.entry(recipient.to_owned()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_up_to_capacity_then_blocks() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.try_acquire("a@example.com"));
        assert!(limiter.try_acquire("a@example.com"));
        assert!(limiter.try_acquire("a@example.com"));
        assert!(!limiter.try_acquire("a@example.com"));
    }

    #[test]
    fn recipients_are_independent() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire("a@example.com"));
        assert!(limiter.try_acquire("b@example.com"));
        assert!(!limiter.try_acquire("a@example.com"));
    }
}
