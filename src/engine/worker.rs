// Tue Jan 13 2026 - Alex

use crate::engine::control::{CancelToken, RunControl};
use crate::engine::queue::{Message, Queue, DEFAULT_CAPACITY, DEFAULT_POLL_INTERVAL};
use crate::engine::unit::{apply_guarded, spawn_unit, ExecutionUnit, Transform};
use crate::error::{FlowError, StageError};
use crate::record::{Envelope, Outcome, Tagged};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub processed: u64,
    pub failed: u64,
    pub passed_through: u64,
    pub sentinels_observed: usize,
    pub finished_workers: usize,
}

#[derive(Debug, Default)]
struct PoolCounters {
    processed: AtomicU64,
    failed: AtomicU64,
    passed_through: AtomicU64,
    sentinels_observed: AtomicUsize,
}

struct PoolShared {
    stage: String,
    workers: usize,
    input: Queue<Envelope>,
    output: Queue<Envelope>,
    finished: Mutex<usize>,
    counters: PoolCounters,
    control: RunControl,
}

impl PoolShared {
    /// The worker that brings the finished count to `workers` closes the output.
    fn finish_one(&self) {
        let last = {
            let mut finished = self.finished.lock();
            *finished += 1;
            *finished == self.workers
        };

        // the put may block on a full output, so it runs without the lock held
        if last && self.output.put(Message::End).is_err() {
            log::debug!("Stage '{}' cancelled before its output could be closed", self.stage);
        }
    }
}

pub struct Worker {
    id: usize,
    thread_handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn start(id: usize, transform: Arc<dyn Transform>, shared: Arc<PoolShared>) -> Result<Self, FlowError> {
        let name = format!("{}-worker-{}", shared.stage, id);
        let handle = spawn_unit(name, move || {
            Worker::worker_loop(id, transform, &shared);
        })?;

        Ok(Self {
            id,
            thread_handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::warn!("Worker {} exited abnormally", self.id);
            }
        }
    }

    fn worker_loop(id: usize, transform: Arc<dyn Transform>, shared: &PoolShared) {
        loop {
            let envelope = match shared.input.get() {
                Ok(Message::Item(envelope)) => envelope,
                Ok(Message::End) => {
                    shared.counters.sentinels_observed.fetch_add(1, Ordering::SeqCst);
                    // siblings still waiting on the input need to see the end too
                    if shared.input.put(Message::End).is_err() {
                        return;
                    }
                    break;
                }
                Err(_) => return,
            };

            let processed = match Worker::process(id, transform.as_ref(), envelope, shared) {
                Some(envelope) => envelope,
                None => return,
            };

            if shared.output.put(Message::Item(processed)).is_err() {
                return;
            }
        }

        shared.finish_one();
    }

    fn process(id: usize, transform: &dyn Transform, envelope: Envelope, shared: &PoolShared) -> Option<Envelope> {
        let Tagged { origin, value } = envelope;

        let record = match value {
            Outcome::Ok(record) => record,
            failed @ Outcome::Failed(_) => {
                shared.counters.passed_through.fetch_add(1, Ordering::Relaxed);
                return Some(Tagged::new(origin, failed));
            }
        };

        match apply_guarded(transform, record, id) {
            Ok(record) => {
                shared.counters.processed.fetch_add(1, Ordering::Relaxed);
                Some(Tagged::new(origin, Outcome::Ok(record)))
            }
            Err(StageError::Item(reason)) => {
                log::debug!("[{}] worker {} failed record {}: {}", shared.stage, id, origin, reason);
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                Some(Tagged::new(origin, Outcome::Failed(reason)))
            }
            Err(StageError::Fatal(message)) => {
                shared.control.fail(FlowError::WorkerFault {
                    stage: shared.stage.clone(),
                    worker: id,
                    message,
                });
                None
            }
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fans one stage out over a fixed number of workers.
///
/// A feeder thread drains the input into a bounded queue and closes it with a
/// single sentinel. Each worker re-posts that sentinel when it sees it, and the
/// last worker to exit posts the one sentinel of the output queue.
pub struct WorkerPool {
    stage: String,
    workers: usize,
    capacity: usize,
    poll_interval: Duration,
    control: RunControl,
}

impl WorkerPool {
    pub fn new(stage: impl Into<String>, workers: usize, control: RunControl) -> Self {
        Self {
            stage: stage.into(),
            workers: workers.max(1),
            capacity: DEFAULT_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            control,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn size(&self) -> usize {
        self.workers
    }

    pub fn run<I>(self, input: I, unit: &dyn ExecutionUnit) -> Result<PoolOutput, FlowError>
    where
        I: Iterator<Item = Envelope> + Send + 'static,
    {
        let token = self.control.token().child();
        let input_queue = Queue::bounded(self.capacity, token.clone()).with_poll_interval(self.poll_interval);
        let output_queue = Queue::bounded(self.capacity, token.clone()).with_poll_interval(self.poll_interval);

        let shared = Arc::new(PoolShared {
            stage: self.stage.clone(),
            workers: self.workers,
            input: input_queue.clone(),
            output: output_queue.clone(),
            finished: Mutex::new(0),
            counters: PoolCounters::default(),
            control: self.control.clone(),
        });

        let mut output = PoolOutput {
            output: output_queue,
            token,
            shared: shared.clone(),
            feeder: None,
            workers: Vec::with_capacity(self.workers),
            exhausted: false,
        };

        output.feeder = Some(spawn_unit(format!("{}-feeder", self.stage), move || {
            feed(input, input_queue);
        })?);

        for id in 0..self.workers {
            let worker = Worker::start(id, unit.transform_for(id), shared.clone())?;
            output.workers.push(worker);
        }

        log::debug!(
            "Stage '{}' running on {} {} worker(s)",
            self.stage,
            self.workers,
            unit.kind()
        );

        Ok(output)
    }
}

fn feed<I>(input: I, queue: Queue<Envelope>)
where
    I: Iterator<Item = Envelope>,
{
    for envelope in input {
        if queue.put(Message::Item(envelope)).is_err() {
            return;
        }
    }

    let _ = queue.put(Message::End);
}

/// The consumer side of a running pool. Dropping it cancels the pool and joins
/// every thread it started.
pub struct PoolOutput {
    output: Queue<Envelope>,
    token: CancelToken,
    shared: Arc<PoolShared>,
    feeder: Option<JoinHandle<()>>,
    workers: Vec<Worker>,
    exhausted: bool,
}

impl PoolOutput {
    pub fn stage(&self) -> &str {
        &self.shared.stage
    }

    pub fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;

        PoolStats {
            workers: self.shared.workers,
            processed: counters.processed.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            passed_through: counters.passed_through.load(Ordering::SeqCst),
            sentinels_observed: counters.sentinels_observed.load(Ordering::SeqCst),
            finished_workers: *self.shared.finished.lock(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.workers.iter().filter(|w| w.is_running()).count()
    }

    fn join_all(&mut self) {
        if let Some(handle) = self.feeder.take() {
            if handle.join().is_err() {
                log::warn!("Feeder of stage '{}' exited abnormally", self.shared.stage);
            }
        }

        for worker in &mut self.workers {
            worker.stop();
        }
        self.workers.clear();
    }
}

impl Iterator for PoolOutput {
    type Item = Envelope;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        match self.output.get() {
            Ok(Message::Item(envelope)) => Some(envelope),
            Ok(Message::End) => {
                self.exhausted = true;
                self.join_all();
                None
            }
            Err(_) => {
                self.exhausted = true;
                self.token.cancel();
                self.join_all();
                None
            }
        }
    }
}

impl Drop for PoolOutput {
    fn drop(&mut self) {
        if !self.exhausted {
            self.token.cancel();
        }
        self.join_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::unit::{unit_for, ExecutionKind, TransformFactory};
    use crate::record::{into_record, Record};
    use serde_json::json;
    use std::thread;

    fn envelopes(n: u64) -> impl Iterator<Item = Envelope> + Send + 'static {
        (0..n).map(|i| Tagged::new(i, Outcome::Ok(into_record(json!({"id": i})))))
    }

    fn factory<F>(f: F) -> TransformFactory
    where
        F: Fn(Record, usize) -> Result<Record, StageError> + Send + Sync + 'static,
    {
        let transform: Arc<dyn Transform> = Arc::new(f);
        Arc::new(move || transform.clone())
    }

    fn add_one(mut record: Record, _worker: usize) -> Result<Record, StageError> {
        let id = record.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
        thread::sleep(Duration::from_millis(id % 3));
        record.insert("id".to_string(), json!(id + 1));
        Ok(record)
    }

    fn ids(output: Vec<Envelope>) -> Vec<u64> {
        let mut ids: Vec<u64> = output
            .into_iter()
            .filter_map(|e| e.value.into_record())
            .filter_map(|r| r.get("id").and_then(|v| v.as_u64()))
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_pool_processes_every_item() {
        let unit = unit_for(ExecutionKind::Shared, &factory(add_one));
        let output = WorkerPool::new("add_one", 4, RunControl::new())
            .run(envelopes(20), unit.as_ref())
            .unwrap();

        let results: Vec<Envelope> = output.collect();
        assert_eq!(results.len(), 20);
        assert_eq!(ids(results), (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_pool_terminates_after_every_worker_sees_sentinel() {
        for workers in 1..=6 {
            let unit = unit_for(ExecutionKind::Isolated, &factory(add_one));
            let mut output = WorkerPool::new("terminate", workers, RunControl::new())
                .run(envelopes(10), unit.as_ref())
                .unwrap();

            let mut count = 0;
            while output.next().is_some() {
                count += 1;
            }
            assert_eq!(count, 10);

            let stats = output.stats();
            assert_eq!(stats.workers, workers);
            assert_eq!(stats.sentinels_observed, workers);
            assert_eq!(stats.finished_workers, workers);
            assert_eq!(stats.processed, 10);
            assert_eq!(output.active_count(), 0);
        }
    }

    #[test]
    fn test_empty_input_still_terminates() {
        let unit = unit_for(ExecutionKind::Shared, &factory(add_one));
        let output = WorkerPool::new("empty", 3, RunControl::new())
            .run(envelopes(0), unit.as_ref())
            .unwrap();

        assert_eq!(output.count(), 0);
    }

    #[test]
    fn test_item_failures_flow_downstream() {
        let transform = |record: Record, _worker: usize| -> Result<Record, StageError> {
            if record.get("id") == Some(&json!(5)) {
                return Err(StageError::item("five"));
            }
            Ok(record)
        };
        let unit = unit_for(ExecutionKind::Shared, &factory(transform));
        let mut output = WorkerPool::new("fail_five", 2, RunControl::new())
            .run(envelopes(10), unit.as_ref())
            .unwrap();

        let results: Vec<Envelope> = output.by_ref().collect();
        let failed: Vec<&Envelope> = results.iter().filter(|e| e.value.is_failed()).collect();
        assert_eq!(results.len(), 10);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].origin, 5);
        assert_eq!(output.stats().failed, 1);
    }

    #[test]
    fn test_failed_envelopes_skip_transform() {
        let transform = |_record: Record, _worker: usize| -> Result<Record, StageError> {
            panic!("must not run on failed envelopes");
        };
        let unit = unit_for(ExecutionKind::Shared, &factory(transform));
        let input = (0..4u64).map(|i| Tagged::new(i, Outcome::Failed("upstream".to_string())));
        let mut output = WorkerPool::new("skip", 2, RunControl::new())
            .run(input, unit.as_ref())
            .unwrap();

        let results: Vec<Envelope> = output.by_ref().collect();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|e| e.value.is_failed()));
        assert_eq!(output.stats().passed_through, 4);
    }

    #[test]
    fn test_fatal_error_cancels_run() {
        let transform = |record: Record, _worker: usize| -> Result<Record, StageError> {
            if record.get("id") == Some(&json!(3)) {
                return Err(StageError::fatal("device lost"));
            }
            Ok(record)
        };
        let control = RunControl::new();
        let unit = unit_for(ExecutionKind::Shared, &factory(transform));
        let output = WorkerPool::new("fatal", 3, control.clone())
            .with_poll_interval(Duration::from_millis(5))
            .run(envelopes(1000), unit.as_ref())
            .unwrap();

        let seen = output.count();
        assert!(seen < 1000);
        assert!(control.is_cancelled());
        match control.take_fault() {
            Some(FlowError::WorkerFault { stage, message, .. }) => {
                assert_eq!(stage, "fatal");
                assert_eq!(message, "device lost");
            }
            other => panic!("expected worker fault, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_before_exhaustion_joins_threads() {
        let control = RunControl::new();
        let unit = unit_for(ExecutionKind::Shared, &factory(add_one));
        let mut output = WorkerPool::new("early_drop", 4, control.clone())
            .with_poll_interval(Duration::from_millis(5))
            .run(envelopes(10_000), unit.as_ref())
            .unwrap();

        assert!(output.next().is_some());
        drop(output);
        assert!(!control.is_cancelled());
    }

    #[test]
    fn test_stats_while_output_is_full() {
        let unit = unit_for(ExecutionKind::Shared, &factory(add_one));
        let output = WorkerPool::new("full_output", 2, RunControl::new())
            .with_capacity(1)
            .with_poll_interval(Duration::from_millis(5))
            .run(envelopes(1), unit.as_ref())
            .unwrap();

        // the item fills the output, so the last worker waits to post the end
        thread::sleep(Duration::from_millis(300));

        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::spawn(move || {
            let stats = output.stats();
            let _ = tx.send((stats, output));
        });

        let (stats, output) = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("stats() blocked on a full output");
        assert_eq!(stats.finished_workers, 2);
        assert_eq!(stats.processed, 1);
        assert_eq!(output.count(), 1);
    }

    #[test]
    fn test_chained_pools() {
        let first = unit_for(ExecutionKind::Shared, &factory(add_one));
        let second = unit_for(ExecutionKind::Isolated, &factory(add_one));
        let control = RunControl::new();

        let upstream = WorkerPool::new("first", 2, control.clone())
            .run(envelopes(20), first.as_ref())
            .unwrap();
        let downstream = WorkerPool::new("second", 2, control)
            .run(upstream, second.as_ref())
            .unwrap();

        let results: Vec<Envelope> = downstream.collect();
        assert_eq!(ids(results), (2..=21).collect::<Vec<_>>());
    }
}
