// Thu Jan 15 2026 - Alex

use crate::error::FlowError;
use crate::io::Sink;
use crate::record::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Batching sink: materializes every record, then writes one JSON array.
pub struct JsonWriter {
    path: PathBuf,
    pretty: bool,
}

impl JsonWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Sink for JsonWriter {
    fn consume(&mut self, records: &mut dyn Iterator<Item = Record>) -> Result<(), FlowError> {
        let records: Vec<Record> = records.collect();
        let mut writer = BufWriter::new(File::create(&self.path)?);

        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &records)?;
        } else {
            serde_json::to_writer(&mut writer, &records)?;
        }

        writer.flush()?;
        log::debug!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::into_record;
    use serde_json::{json, Value};
    use std::fs;

    #[test]
    fn test_writes_single_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut records = (0..2u64).map(|i| into_record(json!({"id": i})));
        JsonWriter::new(&path).pretty(true).consume(&mut records).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, json!([{"id": 0}, {"id": 1}]));
    }
}
