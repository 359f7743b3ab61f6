// Thu Jan 15 2026 - Alex

use crate::error::StageError;
use crate::record::Record;
use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Re-runs a fallible call until it succeeds, `max_retry` retries have failed,
/// or `timeout` has passed since the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retry: Option<u32>,
    pub timeout: Duration,
    pub interval: Duration,
    pub rethrow: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: None,
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            rethrow: false,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = Some(max_retry);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Exhaustion becomes a fatal stage error instead of an item failure.
    pub fn rethrow(mut self, rethrow: bool) -> Self {
        self.rethrow = rethrow;
        self
    }

    fn exhausted(&self, failures: u32, started: Instant) -> bool {
        let over_count = self.max_retry.map_or(false, |max| failures > max);
        over_count || started.elapsed() > self.timeout
    }

    pub fn call<T, E, F>(&self, name: &str, mut f: F) -> Result<T, StageError>
    where
        F: FnMut() -> Result<T, E>,
        E: Display + 'static,
    {
        let started = Instant::now();
        let mut failures = 0u32;

        loop {
            match f() {
                Ok(value) => {
                    if failures > 0 {
                        log::warn!("[{}] succeeded on retry {}", name, failures);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    failures += 1;

                    if self.exhausted(failures, started) {
                        log::error!("[{}] gave up after {} failures: {}", name, failures, e);
                        let reason = format!("{}: {}", name, e);
                        return Err(if self.rethrow {
                            StageError::Fatal(reason)
                        } else {
                            StageError::Item(reason)
                        });
                    }

                    log::warn!("[{}] attempt {} failed: {}", name, failures, e);
                    thread::sleep(self.interval);
                }
            }
        }
    }

    /// Turns `f` into a stage transform that retries each record under this policy.
    pub fn wrap<F, E>(
        self,
        name: &str,
        f: F,
    ) -> impl Fn(Record, usize) -> Result<Record, StageError> + Send + Sync + 'static
    where
        F: Fn(Record, usize) -> Result<Record, E> + Send + Sync + 'static,
        E: Display + 'static,
    {
        let name = name.to_string();
        move |record: Record, worker: usize| self.call(&name, || f(record.clone(), worker))
    }
}

/// Turns any error `f` returns into an item failure, logging it.
pub fn catch_errors<F, E>(
    name: &str,
    f: F,
) -> impl Fn(Record, usize) -> Result<Record, StageError> + Send + Sync + 'static
where
    F: Fn(Record, usize) -> Result<Record, E> + Send + Sync + 'static,
    E: Display + 'static,
{
    let name = name.to_string();
    move |record: Record, worker: usize| {
        f(record, worker).map_err(|e| {
            log::error!("[{}] worker {}: {}", name, worker, e);
            StageError::Item(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::into_record;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick() -> RetryPolicy {
        RetryPolicy::new().interval(Duration::ZERO)
    }

    #[test]
    fn test_succeeds_after_failures() {
        let attempts = AtomicU32::new(0);
        let result = quick().max_retry(3).call("flaky", || {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("not yet")
            } else {
                Ok(7)
            }
        });

        assert_eq!(result, Ok(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_exhaustion_is_item_failure() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), StageError> = quick().max_retry(2).call("broken", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("down")
        });

        assert!(matches!(result, Err(StageError::Item(ref msg)) if msg.contains("down")));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_rethrow_is_fatal() {
        let result: Result<(), StageError> = quick().max_retry(0).rethrow(true).call("broken", || Err("down"));
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn test_timeout_stops_unbounded_retries() {
        let policy = quick().timeout(Duration::from_millis(20)).interval(Duration::from_millis(5));
        let result: Result<(), StageError> = policy.call("slow", || Err("down"));
        assert!(result.is_err());
    }

    #[test]
    fn test_wrap_retries_with_fresh_record() {
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = attempts.clone();
        let transform = quick().max_retry(1).wrap("bump", move |mut record: Record, _worker| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("first call fails");
            }
            let id = record.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
            record.insert("id".to_string(), json!(id + 1));
            Ok(record)
        });

        let out = transform(into_record(json!({"id": 1})), 0).unwrap();
        assert_eq!(out.get("id"), Some(&json!(2)));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_catch_errors() {
        let transform = catch_errors("parse", |record: Record, _worker| {
            if record.contains_key("bad") {
                Err("bad record".to_string())
            } else {
                Ok(record)
            }
        });

        assert!(transform(into_record(json!({"ok": 1})), 0).is_ok());
        assert_eq!(
            transform(into_record(json!({"bad": 1})), 0),
            Err(StageError::Item("bad record".to_string()))
        );
    }
}
