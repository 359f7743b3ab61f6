// Tue Jan 13 2026 - Alex

use serde_json::{Map, Value};

pub const TEXT_FIELD: &str = "text";
pub const VALUE_FIELD: &str = "value";

/// A structured item flowing through a pipeline.
pub type Record = Map<String, Value>;

/// Builds a record from any JSON value. Objects are used as-is, anything else is
/// stored under `"value"`.
pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => {
            let mut record = Record::new();
            record.insert(VALUE_FIELD.to_string(), other);
            record
        }
    }
}

pub fn text_record(line: &str) -> Record {
    let mut record = Record::new();
    record.insert(TEXT_FIELD.to_string(), Value::String(line.to_string()));
    record
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(Record),
    Failed(String),
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Outcome::Ok(record) => Some(record),
            Outcome::Failed(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Outcome::Ok(record) => Some(record),
            Outcome::Failed(_) => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Outcome::Failed(reason) => Some(reason),
            Outcome::Ok(_) => None,
        }
    }
}

/// A value paired with the origin id it was given when it entered the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    pub origin: u64,
    pub value: T,
}

impl<T> Tagged<T> {
    pub fn new(origin: u64, value: T) -> Self {
        Self { origin, value }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Tagged<U> {
        Tagged {
            origin: self.origin,
            value: f(self.value),
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

pub type Envelope = Tagged<Outcome>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_record_wraps_scalars() {
        let record = into_record(json!(42));
        assert_eq!(record.get(VALUE_FIELD), Some(&json!(42)));

        let record = into_record(json!({"id": 1}));
        assert_eq!(record.get("id"), Some(&json!(1)));
        assert!(record.get(VALUE_FIELD).is_none());
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = Outcome::Ok(text_record("hello"));
        assert!(ok.is_ok());
        assert_eq!(ok.record().and_then(|r| r.get(TEXT_FIELD)), Some(&json!("hello")));

        let failed = Outcome::Failed("boom".to_string());
        assert!(failed.is_failed());
        assert_eq!(failed.failure_reason(), Some("boom"));
        assert!(failed.into_record().is_none());
    }

    #[test]
    fn test_tagged_map_keeps_origin() {
        let tagged = Tagged::new(7, 3).map(|v| v * 2);
        assert_eq!(tagged.origin, 7);
        assert_eq!(tagged.into_value(), 6);
    }
}
