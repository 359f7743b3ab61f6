// Tue Jan 13 2026 - Alex

use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_TIMER_THRESHOLD: Duration = Duration::from_millis(500);

pub struct LoggingUtils;

impl LoggingUtils {
    pub fn init_logger(level: LevelFilter) {
        let logger = Box::new(ColoredLogger::new(level));
        log::set_boxed_logger(logger).ok();
        log::set_max_level(level);
    }

    pub fn init_logger_with_file(level: LevelFilter, file_path: &Path) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(file_path)?;

        let logger = Box::new(FileLogger::new(level, file));
        log::set_boxed_logger(logger).ok();
        log::set_max_level(level);
        Ok(())
    }
}

struct ColoredLogger {
    level: LevelFilter,
    use_color: AtomicBool,
}

impl ColoredLogger {
    fn new(level: LevelFilter) -> Self {
        Self {
            level,
            use_color: AtomicBool::new(true),
        }
    }

    fn format_level(&self, level: Level) -> ColoredString {
        match level {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".green().bold(),
            Level::Debug => "DEBUG".blue().bold(),
            Level::Trace => "TRACE".magenta().bold(),
        }
    }
}

impl Log for ColoredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level_str = if self.use_color.load(Ordering::Relaxed) {
            self.format_level(record.level()).to_string()
        } else {
            format!("{:5}", record.level())
        };

        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("main");

        eprintln!(
            "{} {} {}",
            level_str,
            format!("[{}]", thread_name).dimmed(),
            record.args()
        );
    }

    fn flush(&self) {}
}

struct FileLogger {
    level: LevelFilter,
    file: Mutex<File>,
}

impl FileLogger {
    fn new(level: LevelFilter, file: File) -> Self {
        Self {
            level,
            file: Mutex::new(file),
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = format!(
                "{} {:5} [{}] {}\n",
                unix_timestamp(),
                record.level(),
                record.target(),
                record.args()
            );

            let _ = self.file.lock().write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        let _ = self.file.lock().flush();
    }
}

fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();

    format!("{}.{:03}", duration.as_secs(), duration.subsec_millis())
}

pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

pub fn init_logger(verbose: bool) {
    LoggingUtils::init_logger(level_for(verbose));
}

/// Uses `RUST_LOG` when it is set, the colored logger otherwise.
pub fn init_from_env(verbose: bool) {
    if std::env::var_os("RUST_LOG").is_some() {
        env_logger::try_init().ok();
    } else {
        init_logger(verbose);
    }
}

/// Logs how long the scope took when dropped; warns past the threshold.
pub struct ScopedTimer {
    name: String,
    start: Instant,
    threshold: Duration,
}

impl ScopedTimer {
    pub fn new(name: &str) -> Self {
        log::debug!("[TIMER] {} started", name);
        Self {
            name: name.to_string(),
            start: Instant::now(),
            threshold: DEFAULT_TIMER_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let millis = elapsed.as_secs_f64() * 1000.0;

        if elapsed < self.threshold {
            log::debug!("[TIMER] {} took {:.2}ms", self.name, millis);
        } else {
            log::warn!("[TIMER] {} took {:.2}ms", self.name, millis);
        }
    }
}

/// Passes items through, logging total and current items per second every `step` items.
pub struct Throughput<I> {
    inner: I,
    name: String,
    step: usize,
    index: usize,
    reports: usize,
    started: Instant,
    window: Instant,
}

impl<I: Iterator> Throughput<I> {
    pub fn new(inner: I, name: &str, step: usize) -> Self {
        let now = Instant::now();
        Self {
            inner,
            name: name.to_string(),
            step: step.max(1),
            index: 0,
            reports: 0,
            started: now,
            window: now,
        }
    }

    pub fn completed(&self) -> usize {
        self.index
    }

    pub fn reported(&self) -> usize {
        self.reports
    }

    fn report(&mut self) {
        let total_tps = rate(self.index, self.started.elapsed());
        let current_tps = rate(self.step, self.window.elapsed());
        self.window = Instant::now();
        self.reports += 1;

        log::info!(
            "[{}] completed: {}, total_tps: {:.3}, current_tps: {:.3}",
            self.name,
            self.index,
            total_tps,
            current_tps
        );
    }
}

fn rate(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

impl<I: Iterator> Iterator for Throughput<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        self.index += 1;

        if self.index % self.step == 0 {
            self.report();
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_passes_items_through() {
        let mut items = Throughput::new(0..25, "test", 10);
        let collected: Vec<i32> = items.by_ref().collect();

        assert_eq!(collected.len(), 25);
        assert_eq!(items.completed(), 25);
        assert_eq!(items.reported(), 2);
    }

    #[test]
    fn test_throughput_quiet_after_exhaustion() {
        let mut items = Throughput::new(0..20, "test", 10);
        while items.next().is_some() {}
        assert_eq!(items.reported(), 2);

        for _ in 0..5 {
            assert!(items.next().is_none());
        }
        assert_eq!(items.reported(), 2);
    }

    #[test]
    fn test_throughput_zero_step_is_clamped() {
        let items = Throughput::new(0..3, "test", 0);
        assert_eq!(items.count(), 3);
    }

    #[test]
    fn test_rate() {
        assert_eq!(rate(10, Duration::ZERO), 0.0);
        assert!((rate(10, Duration::from_secs(2)) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scoped_timer_elapsed() {
        let timer = ScopedTimer::new("test").with_threshold(Duration::from_secs(10));
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() >= Duration::from_millis(2));
    }
}
