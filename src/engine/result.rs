// Tue Jan 13 2026 - Alex

use crate::engine::reorder::ReorderStats;
use crate::utils::format_duration;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-run statistics. `total` and `errors` are only touched by the counting
/// stage, which runs on the thread that feeds the sink.
#[derive(Debug, Default)]
pub struct RunCounter {
    total: AtomicU64,
    errors: AtomicU64,
    delivered: AtomicU64,
    forced_jumps: AtomicU64,
    late: AtomicU64,
}

impl RunCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_seen(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reorder(&self, stats: &ReorderStats) {
        self.forced_jumps.fetch_add(stats.forced_jumps, Ordering::Relaxed);
        self.late.fetch_add(stats.late, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn forced_jumps(&self) -> u64 {
        self.forced_jumps.load(Ordering::Relaxed)
    }

    pub fn late(&self) -> u64 {
        self.late.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub total: u64,
    pub errors: u64,
    pub delivered: u64,
    pub forced_jumps: u64,
    pub late: u64,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn from_counter(pipeline: &str, counter: &RunCounter, interrupted: bool, elapsed: Duration) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            total: counter.total(),
            errors: counter.errors(),
            delivered: counter.delivered(),
            forced_jumps: counter.forced_jumps(),
            late: counter.late(),
            interrupted,
            elapsed,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.total - self.errors) as f64 / self.total as f64
        }
    }

    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.total as f64 / secs
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, errors: {}, delivered: {}, elapsed: {}",
            self.total,
            self.errors,
            self.delivered,
            format_duration(self.elapsed)
        )?;

        if self.forced_jumps > 0 {
            write!(f, ", forced reorder jumps: {}", self.forced_jumps)?;
        }
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }

        Ok(())
    }
}
