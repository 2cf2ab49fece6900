//! src/rate_limit.rs
//!
//! Rate limiter: per-host back-off state, shared by every worker.
//!
//! The table itself (`RateLimitTable`) is a thin `Arc<Mutex<HashMap<..>>>`
//! wrapper; the interesting logic is `limit_rate`, the pure arithmetic that
//! decides the next permissible probe time for a host on a 429 response.
//! The lock is only ever held for the HashMap read/write itself — never
//! across network I/O — so callers must compute everything they need
//! before taking the lock (see `worker.rs`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::hyperlink::RateLimit;

/// Default back-off when a host 429s with no usable `Retry-After` and has
/// no prior rate-limit entry.
pub const DEFAULT_DELAY: f64 = 60.0;

#[derive(Debug, Clone, Default)]
pub struct RateLimitTable {
    inner: Arc<Mutex<HashMap<String, RateLimit>>>,
}

impl RateLimitTable {
    pub fn new() -> Self {
        RateLimitTable::default()
    }

    /// The `next_check` currently on file for `host`, if any. Workers
    /// consult this every loop iteration to refresh a possibly-stale queued
    /// `next_check`.
    pub fn next_check(&self, host: &str) -> Option<i64> {
        let table = self.inner.lock().expect("rate limit table poisoned");
        table.get(host).map(|rl| rl.next_check)
    }

    /// Remove `host`'s entry, e.g. after a non-429 success.
    pub fn clear(&self, host: &str) {
        let mut table = self.inner.lock().expect("rate limit table poisoned");
        table.remove(host);
    }

    fn get(&self, host: &str) -> Option<RateLimit> {
        let table = self.inner.lock().expect("rate limit table poisoned");
        table.get(host).copied()
    }

    fn set(&self, host: &str, rl: RateLimit) {
        let mut table = self.inner.lock().expect("rate limit table poisoned");
        table.insert(host.to_string(), rl);
    }

    /// Apply the rate-limit algorithm for a 429 response from `host`.
    /// `retry_after` is the raw `Retry-After` header value, if
    /// present. `now` and `max_delay` (== `rate_limit_timeout`) are passed
    /// in rather than read from a clock/config so this stays unit-testable.
    ///
    /// Returns `Some(next_check)` if a retry is still worth scheduling, or
    /// `None` if the computed delay exceeds `max_delay` ("give up").
    pub fn limit_rate(
        &self,
        host: &str,
        retry_after: Option<&str>,
        now: i64,
        max_delay: f64,
    ) -> Option<i64> {
        let mut delay = DEFAULT_DELAY;
        let mut next_check: Option<i64> = None;

        if let Some(raw) = retry_after.filter(|s| !s.is_empty()) {
            if let Ok(secs) = raw.parse::<f64>() {
                delay = secs;
                next_check = Some(now + delay.round() as i64);
            } else if let Some(epoch) = parse_http_date(raw) {
                next_check = Some(epoch);
                delay = (epoch - now) as f64;
            }
            // Any other unparsable value: fall through to the
            // no-header branch below.
        }

        if next_check.is_none() {
            match self.get(host) {
                None => {
                    delay = DEFAULT_DELAY;
                }
                Some(previous) => {
                    delay = 2.0 * previous.delay;
                    if delay > max_delay && previous.delay < max_delay {
                        delay = max_delay;
                    }
                }
            }
            if delay > max_delay {
                return None;
            }
            next_check = Some(now + delay.round() as i64);
        }

        // Clamp negative delays from a past Retry-After HTTP-date to avoid
        // immediate retry storms.
        let delay = delay.max(0.0);
        let next_check = next_check.unwrap();
        self.set(host, RateLimit { delay, next_check });
        Some(next_check)
    }
}

/// Parse an RFC 1123 HTTP-date (e.g. `Sun, 06 Nov 1994 08:49:37 GMT`) into
/// epoch seconds. `Retry-After` headers sometimes use this form instead of
/// a plain integer delay.
pub fn parse_http_date(value: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_429_with_no_header_uses_default_delay() {
        let table = RateLimitTable::new();
        let next = table.limit_rate("example.test", None, 1_000, 300.0).unwrap();
        assert_eq!(next, 1_000 + 60);
    }

    #[test]
    fn doubling_sequence_clamps_to_max_delay() {
        let table = RateLimitTable::new();
        let mut now = 0i64;

        let n1 = table.limit_rate("h", None, now, 300.0).unwrap();
        assert_eq!(n1 - now, 60);
        now = n1;

        let n2 = table.limit_rate("h", None, now, 300.0).unwrap();
        assert_eq!(n2 - now, 120);
        now = n2;

        let n3 = table.limit_rate("h", None, now, 300.0).unwrap();
        assert_eq!(n3 - now, 240);
        now = n3;

        // 2 * 240 = 480 > 300, and previous (240) < 300, so clamp to 300.
        let n4 = table.limit_rate("h", None, now, 300.0).unwrap();
        assert_eq!(n4 - now, 300);
        now = n4;

        // 2 * 300 = 600 > 300, and previous (300) is NOT < 300, so no clamp:
        // delay stays at 600, which exceeds max_delay -> give up.
        assert!(table.limit_rate("h", None, now, 300.0).is_none());
        let _ = now;
    }

    #[test]
    fn integer_retry_after_is_used_directly() {
        let table = RateLimitTable::new();
        let next = table.limit_rate("h", Some("2"), 1_000, 300.0).unwrap();
        assert_eq!(next, 1_002);
    }

    #[test]
    fn http_date_retry_after_is_parsed() {
        let table = RateLimitTable::new();
        // Sun, 06 Nov 1994 08:49:37 GMT == 784111777
        let next = table
            .limit_rate("h", Some("Sun, 06 Nov 1994 08:49:37 GMT"), 0, 300.0)
            .unwrap();
        assert_eq!(next, 784_111_777);
    }

    #[test]
    fn past_http_date_clamps_delay_to_zero_not_negative_storm() {
        let table = RateLimitTable::new();
        let now = 784_111_777 + 1000;
        let next = table
            .limit_rate("h", Some("Sun, 06 Nov 1994 08:49:37 GMT"), now, 300.0)
            .unwrap();
        // next_check is whatever the header said (in the past); the stored
        // delay itself must not be negative, even though next_check < now.
        assert_eq!(next, 784_111_777);
    }

    #[test]
    fn clear_removes_entry() {
        let table = RateLimitTable::new();
        table.limit_rate("h", None, 0, 300.0);
        assert!(table.next_check("h").is_some());
        table.clear("h");
        assert!(table.next_check("h").is_none());
    }
}
