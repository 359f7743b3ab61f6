// Thu Jan 15 2026 - Alex

use crate::error::FlowError;
use crate::io::{RecordStream, Sink, Source};
use crate::record::{text_record, Record, TEXT_FIELD};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Reads plain text, one `{"text": line}` record per line.
pub struct TextReader {
    path: PathBuf,
}

impl TextReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for TextReader {
    fn open(&mut self) -> Result<RecordStream, FlowError> {
        let file = File::open(&self.path)?;
        let path = self.path.clone();

        let lines = BufReader::new(file).lines().map_while(move |line| match line {
            Ok(line) => Some(text_record(line.trim())),
            Err(e) => {
                log::error!("Stopped reading {}: {}", path.display(), e);
                None
            }
        });

        Ok(Box::new(lines))
    }
}

/// Writes the `text` field of each record on its own line. Records without a
/// string `text` field are written as JSON.
pub struct TextWriter {
    path: PathBuf,
}

impl TextWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn render_line(record: &Record) -> Result<String, FlowError> {
    match record.get(TEXT_FIELD) {
        Some(Value::String(text)) => Ok(text.clone()),
        _ => Ok(serde_json::to_string(record)?),
    }
}

impl Sink for TextWriter {
    fn consume(&mut self, records: &mut dyn Iterator<Item = Record>) -> Result<(), FlowError> {
        let mut writer = BufWriter::new(File::create(&self.path)?);

        for record in records {
            writeln!(writer, "{}", render_line(&record)?)?;
        }

        writer.flush()?;
        Ok(())
    }
}
