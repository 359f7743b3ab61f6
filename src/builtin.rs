// Fri Jan 16 2026 - Alex

use crate::engine::stage::StageTable;
use crate::engine::unit::ExecutionKind;
use crate::error::{FlowError, StageError};
use crate::record::{Record, TEXT_FIELD};
use serde_json::Value;
use std::str::FromStr;

/// A stage requested as `name[:workers[:kind]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: String,
    pub workers: Option<usize>,
    pub kind: ExecutionKind,
}

impl FromStr for StageSpec {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');

        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(FlowError::Config(format!("empty stage name in '{}'", s)));
        }

        let workers = match parts.next().map(str::trim) {
            None | Some("") => None,
            Some(n) => {
                let workers: usize = n
                    .parse()
                    .map_err(|_| FlowError::Config(format!("bad worker count '{}' in '{}'", n, s)))?;
                if workers == 0 {
                    return Err(FlowError::Config(format!("stage '{}' needs at least one worker", name)));
                }
                Some(workers)
            }
        };

        let kind = match parts.next() {
            Some(kind) => kind.trim().parse()?,
            None => ExecutionKind::default(),
        };

        if parts.next().is_some() {
            return Err(FlowError::Config(format!("too many fields in stage '{}'", s)));
        }

        Ok(Self {
            name: name.to_string(),
            workers,
            kind,
        })
    }
}

pub fn identity(record: Record, _worker: usize) -> Result<Record, StageError> {
    Ok(record)
}

/// Adds one to the integer `id` field.
pub fn increment(mut record: Record, _worker: usize) -> Result<Record, StageError> {
    let id = match record.get("id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| StageError::item(format!("id {} is not an integer", n)))?,
        Some(other) => return Err(StageError::item(format!("id {} is not a number", other))),
        None => return Err(StageError::item("record has no id")),
    };

    record.insert("id".to_string(), Value::from(id + 1));
    Ok(record)
}

/// Upper-cases the `text` field.
pub fn uppercase(mut record: Record, _worker: usize) -> Result<Record, StageError> {
    match record.get_mut(TEXT_FIELD) {
        Some(Value::String(text)) => {
            *text = text.to_uppercase();
            Ok(record)
        }
        _ => Err(StageError::item("record has no text field")),
    }
}

pub fn builtin_table() -> StageTable {
    StageTable::new()
        .with_fn("identity", identity)
        .with_fn("increment", increment)
        .with_fn("uppercase", uppercase)
}
