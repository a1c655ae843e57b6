use thiserror::Error;

use crate::schema::FieldType;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported source: {0} (only local paths, file:// URIs and '-' are readable)")]
    UnsupportedSource(String),

    #[error("Source is not valid UTF-8: {0}")]
    NonUtf8Source(String),

    #[error("Invalid table name: {0} (expected dataset.table)")]
    InvalidTableName(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table is not empty: {0}")]
    TableNotEmpty(String),

    #[error("Schema mismatch on {table}: expected [{expected}], found [{found}]")]
    SchemaMismatch {
        table: String,
        expected: String,
        found: String,
    },

    #[error("Sink rejected row {row}: {source}")]
    Load {
        row: usize,
        source: rusqlite::Error,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Credentials file not found: {0}")]
    Credentials(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Execution engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Per-line failure under the strict token policy. Never aborts sibling lines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("malformed record: expected {expected} fields, found {found}")]
    Malformed { expected: usize, found: usize },

    #[error("invalid {expected} value for {field}: {value:?}")]
    InvalidNumber {
        field: String,
        expected: FieldType,
        value: String,
    },
}
