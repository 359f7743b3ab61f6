// Wed Jan 14 2026 - Alex

use crate::engine::control::RunControl;
use crate::engine::result::RunCounter;
use crate::engine::unit::{apply_guarded, Transform};
use crate::error::{FlowError, StageError};
use crate::record::{Envelope, Outcome, Record, Tagged};
use std::sync::Arc;

pub type EnvelopeStream = Box<dyn Iterator<Item = Envelope> + Send>;
pub type TaggedStream = Box<dyn Iterator<Item = Tagged<Record>> + Send>;

/// Skips `offset` records, tags the rest with origin ids from 0 and stops after
/// `limit` of them.
pub struct Clip<I> {
    inner: I,
    offset: usize,
    limit: Option<usize>,
    index: usize,
    next_origin: u64,
    verbose: bool,
    control: RunControl,
}

impl<I> Clip<I>
where
    I: Iterator<Item = Record>,
{
    pub fn new(inner: I, offset: usize, limit: Option<usize>, control: RunControl) -> Self {
        Self {
            inner,
            offset,
            limit,
            index: 0,
            next_origin: 0,
            verbose: false,
            control,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl<I> Iterator for Clip<I>
where
    I: Iterator<Item = Record>,
{
    type Item = Envelope;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(limit) = self.limit {
            if self.next_origin >= limit as u64 {
                return None;
            }
        }

        loop {
            if self.control.is_cancelled() {
                return None;
            }

            let record = self.inner.next()?;
            let index = self.index;
            self.index += 1;

            if index < self.offset {
                continue;
            }

            if self.verbose {
                log::info!("Preparing record {}", index);
            }

            let origin = self.next_origin;
            self.next_origin += 1;
            return Some(Tagged::new(origin, Outcome::Ok(record)));
        }
    }
}

/// Runs a single-worker stage on the consuming thread, without queues.
pub struct InlineStage<I> {
    inner: I,
    stage: String,
    transform: Arc<dyn Transform>,
    control: RunControl,
    halted: bool,
}

impl<I> InlineStage<I>
where
    I: Iterator<Item = Envelope>,
{
    pub fn new(inner: I, stage: impl Into<String>, transform: Arc<dyn Transform>, control: RunControl) -> Self {
        Self {
            inner,
            stage: stage.into(),
            transform,
            control,
            halted: false,
        }
    }
}

impl<I> Iterator for InlineStage<I>
where
    I: Iterator<Item = Envelope>,
{
    type Item = Envelope;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted || self.control.is_cancelled() {
            return None;
        }

        let Tagged { origin, value } = self.inner.next()?;
        let record = match value {
            Outcome::Ok(record) => record,
            failed @ Outcome::Failed(_) => return Some(Tagged::new(origin, failed)),
        };

        match apply_guarded(self.transform.as_ref(), record, 0) {
            Ok(record) => Some(Tagged::new(origin, Outcome::Ok(record))),
            Err(StageError::Item(reason)) => {
                log::debug!("[{}] failed record {}: {}", self.stage, origin, reason);
                Some(Tagged::new(origin, Outcome::Failed(reason)))
            }
            Err(StageError::Fatal(message)) => {
                self.halted = true;
                self.control.fail(FlowError::WorkerFault {
                    stage: self.stage.clone(),
                    worker: 0,
                    message,
                });
                None
            }
        }
    }
}

/// Counts every envelope and drops the failed ones.
pub struct Count<I> {
    inner: I,
    counter: Arc<RunCounter>,
}

impl<I> Count<I>
where
    I: Iterator<Item = Envelope>,
{
    pub fn new(inner: I, counter: Arc<RunCounter>) -> Self {
        Self { inner, counter }
    }
}

impl<I> Iterator for Count<I>
where
    I: Iterator<Item = Envelope>,
{
    type Item = Tagged<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Tagged { origin, value } = self.inner.next()?;
            self.counter.record_seen();

            match value {
                Outcome::Ok(record) => return Some(Tagged::new(origin, record)),
                Outcome::Failed(reason) => {
                    self.counter.record_error();
                    log::debug!("Dropping record {}: {}", origin, reason);
                }
            }
        }
    }
}

pub fn strip_origin<I>(items: I, counter: Arc<RunCounter>) -> impl Iterator<Item = Record>
where
    I: Iterator<Item = Tagged<Record>>,
{
    items.map(move |tagged| {
        counter.record_delivered();
        tagged.into_value()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::into_record;
    use serde_json::json;

    fn records(n: u64) -> impl Iterator<Item = Record> {
        (0..n).map(|i| into_record(json!({"id": i})))
    }

    fn id_of(record: &Record) -> u64 {
        record.get("id").and_then(|v| v.as_u64()).unwrap()
    }

    #[test]
    fn test_clip_offset_and_limit() {
        let clipped: Vec<Envelope> = Clip::new(records(20), 5, Some(10), RunControl::new()).collect();

        assert_eq!(clipped.len(), 10);
        for (i, envelope) in clipped.iter().enumerate() {
            assert_eq!(envelope.origin, i as u64);
            assert_eq!(id_of(envelope.value.record().unwrap()), i as u64 + 5);
        }
    }

    #[test]
    fn test_clip_without_limit() {
        let clipped: Vec<Envelope> = Clip::new(records(8), 3, None, RunControl::new()).collect();
        let origins: Vec<u64> = clipped.iter().map(|e| e.origin).collect();
        assert_eq!(origins, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clip_limit_does_not_pull_extra_records() {
        let mut pulled = 0;
        let source = records(100).inspect(|_| pulled += 1);
        let clipped: Vec<Envelope> = Clip::new(source, 2, Some(3), RunControl::new()).collect();
        assert_eq!(clipped.len(), 3);
        assert_eq!(pulled, 5);
    }

    #[test]
    fn test_clip_stops_on_interrupt() {
        let control = RunControl::new();
        let mut clip = Clip::new(records(u64::MAX), 0, None, control.clone());
        assert!(clip.next().is_some());
        control.interrupt();
        assert!(clip.next().is_none());
    }

    #[test]
    fn test_inline_stage_applies_transform() {
        let transform: Arc<dyn Transform> = Arc::new(|mut record: Record, _worker: usize| {
            let id = record.get("id").and_then(|v| v.as_u64()).unwrap_or(0);
            if id == 2 {
                return Err(StageError::item("two"));
            }
            record.insert("id".to_string(), json!(id * 10));
            Ok(record)
        });
        let clip = Clip::new(records(4), 0, None, RunControl::new());
        let output: Vec<Envelope> = InlineStage::new(clip, "times_ten", transform, RunControl::new()).collect();

        assert_eq!(output.len(), 4);
        assert_eq!(id_of(output[1].value.record().unwrap()), 10);
        assert_eq!(output[2].value.failure_reason(), Some("two"));
        assert_eq!(id_of(output[3].value.record().unwrap()), 30);
    }

    #[test]
    fn test_inline_stage_fatal_halts() {
        let control = RunControl::new();
        let transform: Arc<dyn Transform> = Arc::new(|record: Record, _worker: usize| {
            if record.get("id") == Some(&json!(1)) {
                return Err(StageError::fatal("broken"));
            }
            Ok(record)
        });
        let clip = Clip::new(records(5), 0, None, control.clone());
        let output: Vec<Envelope> = InlineStage::new(clip, "fragile", transform, control.clone()).collect();

        assert_eq!(output.len(), 1);
        assert!(control.take_fault().map_or(false, |e| e.is_worker_fault()));
    }

    #[test]
    fn test_count_drops_failures() {
        let counter = Arc::new(RunCounter::new());
        let input = vec![
            Tagged::new(0, Outcome::Ok(into_record(json!({"id": 0})))),
            Tagged::new(1, Outcome::Failed("bad".to_string())),
            Tagged::new(2, Outcome::Ok(into_record(json!({"id": 2})))),
        ];

        let kept: Vec<Record> = strip_origin(Count::new(input.into_iter(), counter.clone()), counter.clone()).collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(counter.total(), 3);
        assert_eq!(counter.errors(), 1);
        assert_eq!(counter.delivered(), 2);
    }
}
