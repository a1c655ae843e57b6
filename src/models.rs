use indexmap::IndexMap;
use serde::Serialize;

/// Lenient parse output: field name to raw token, in schema order.
/// Trailing fields are absent when the line was short.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawRecord(IndexMap<&'static str, String>);

impl RawRecord {
    pub fn insert(&mut self, field: &'static str, value: String) {
        self.0.insert(field, value);
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[allow(dead_code)]
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Typed planning row produced under the strict token policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanningRecord {
    pub fiscal: String,
    pub productgroup: String,
    pub market: String,
    pub state: String,
    pub region: String,
    pub department: String,
    pub channel: String,
    pub month: i64,
    pub quarter: i64,
    pub event: i64,
    pub cost: f64,
    pub kpi: f64,
}

/// A line the strict policy refused, kept for the dead-letter output.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedLine {
    pub line: u64,
    pub raw: String,
    pub error: crate::error::RecordError,
}

/// One data line from the source, numbered from 1 at the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub number: u64,
    pub text: String,
}
