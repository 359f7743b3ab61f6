// Thu Jan 15 2026 - Alex

use crate::error::FlowError;
use crate::io::{RecordStream, Sink, Source};
use crate::record::{into_record, text_record, Record};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Reads one JSON document per line. Lines that are not valid JSON become
/// `{"text": line}` records.
pub struct JsonlReader {
    path: PathBuf,
}

impl JsonlReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn parse_line(line: &str) -> Record {
    match serde_json::from_str(line) {
        Ok(value) => into_record(value),
        Err(_) => text_record(line.trim()),
    }
}

impl Source for JsonlReader {
    fn open(&mut self) -> Result<RecordStream, FlowError> {
        let file = File::open(&self.path)?;
        let path = self.path.clone();

        let lines = BufReader::new(file)
            .lines()
            .map_while(move |line| match line {
                Ok(line) => Some(line),
                Err(e) => {
                    log::error!("Stopped reading {}: {}", path.display(), e);
                    None
                }
            })
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_line(&line));

        Ok(Box::new(lines))
    }
}

pub struct JsonlWriter {
    path: PathBuf,
    append: bool,
    buffer_size: usize,
}

impl JsonlWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Smaller buffers get records onto disk sooner; 0 writes every record through.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

impl Sink for JsonlWriter {
    fn consume(&mut self, records: &mut dyn Iterator<Item = Record>) -> Result<(), FlowError> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&self.path)?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);

        for record in records {
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut records = (0..3u64).map(|i| into_record(json!({"id": i, "name": "行"})));
        JsonlWriter::new(&path).consume(&mut records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("行"));

        let read: Vec<Record> = JsonlReader::new(&path).open().unwrap().collect();
        assert_eq!(read.len(), 3);
        assert_eq!(read[2].get("id"), Some(&json!(2)));
    }

    #[test]
    fn test_append_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let mut first = std::iter::once(into_record(json!({"id": 1})));
        JsonlWriter::new(&path).consume(&mut first).unwrap();
        let mut second = std::iter::once(into_record(json!({"id": 2})));
        JsonlWriter::new(&path).append(true).buffer_size(0).consume(&mut second).unwrap();

        let read: Vec<Record> = JsonlReader::new(&path).open().unwrap().collect();
        assert_eq!(read.len(), 2);
    }

    #[test]
    fn test_invalid_lines_become_text() {
        assert_eq!(parse_line("{\"id\": 4}").get("id"), Some(&json!(4)));
        assert_eq!(parse_line("  not json  ").get("text"), Some(&json!("not json")));
        assert_eq!(parse_line("[1, 2]").get("value"), Some(&json!([1, 2])));
    }
}
