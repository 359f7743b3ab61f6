// Thu Jan 15 2026 - Alex

pub mod json;
pub mod jsonl;
pub mod text;

pub use json::JsonWriter;
pub use jsonl::{JsonlReader, JsonlWriter};
pub use text::{TextReader, TextWriter};

use crate::error::FlowError;
use crate::record::Record;
use parking_lot::Mutex;
use std::sync::Arc;

pub type RecordStream = Box<dyn Iterator<Item = Record> + Send>;

pub trait Source: Send {
    fn open(&mut self) -> Result<RecordStream, FlowError>;
}

pub trait Sink: Send {
    fn consume(&mut self, records: &mut dyn Iterator<Item = Record>) -> Result<(), FlowError>;
}

impl<F, I> Source for F
where
    F: FnMut() -> I + Send,
    I: Iterator<Item = Record> + Send + 'static,
{
    fn open(&mut self) -> Result<RecordStream, FlowError> {
        Ok(Box::new(self()))
    }
}

/// A source over an iterator that can be opened once.
pub struct IterSource {
    stream: Option<RecordStream>,
}

impl IterSource {
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
        I::IntoIter: Send + 'static,
    {
        Self {
            stream: Some(Box::new(records.into_iter())),
        }
    }
}

impl Source for IterSource {
    fn open(&mut self) -> Result<RecordStream, FlowError> {
        self.stream
            .take()
            .ok_or_else(|| FlowError::InvalidState("source was already consumed".to_string()))
    }
}

/// Collects everything it receives; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Sink for CollectSink {
    fn consume(&mut self, records: &mut dyn Iterator<Item = Record>) -> Result<(), FlowError> {
        for record in records {
            self.records.lock().push(record);
        }
        Ok(())
    }
}

/// Pulls every record and throws it away.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl Sink for DiscardSink {
    fn consume(&mut self, records: &mut dyn Iterator<Item = Record>) -> Result<(), FlowError> {
        records.for_each(drop);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::into_record;
    use serde_json::json;

    #[test]
    fn test_iter_source_opens_once() {
        let mut source = IterSource::new(vec![into_record(json!({"id": 1}))]);
        assert_eq!(source.open().unwrap().count(), 1);
        assert!(matches!(source.open(), Err(FlowError::InvalidState(_))));
    }

    #[test]
    fn test_closure_source_reopens() {
        let mut source = || (0..3u64).map(|i| into_record(json!({"id": i})));
        assert_eq!(source.open().unwrap().count(), 3);
        assert_eq!(source.open().unwrap().count(), 3);
    }

    #[test]
    fn test_collect_sink_shares_storage() {
        let sink = CollectSink::new();
        let mut writer = sink.clone();
        let mut records = (0..4u64).map(|i| into_record(json!({"id": i})));

        writer.consume(&mut records).unwrap();
        assert_eq!(sink.len(), 4);
        assert_eq!(sink.records()[3].get("id"), Some(&json!(3)));
    }
}
