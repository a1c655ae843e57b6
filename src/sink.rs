use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::{PlanningRecord, RawRecord};
use crate::schema::TableSchema;

pub const LOAD_JOBS_TABLE: &str = "_load_jobs";

const LOAD_JOBS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS _load_jobs (
    id INTEGER PRIMARY KEY,
    source TEXT NOT NULL,
    table_name TEXT NOT NULL,
    disposition TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    rejected_count INTEGER NOT NULL,
    checksum TEXT,
    loaded_at TEXT NOT NULL
);
";

// ---------------------------------------------------------------------------
// Table naming
// ---------------------------------------------------------------------------

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"))
}

/// Qualified destination `dataset.table`. The dataset names a database file
/// under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || PipelineError::InvalidTableName(name.to_string());
        let (dataset, table) = name.split_once('.').ok_or_else(invalid)?;
        if !identifier_re().is_match(dataset) || !identifier_re().is_match(table) {
            return Err(invalid());
        }
        if table.eq_ignore_ascii_case(LOAD_JOBS_TABLE) {
            return Err(invalid());
        }
        Ok(Self {
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }

    pub fn db_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.db", self.dataset))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

// ---------------------------------------------------------------------------
// Dispositions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CreateDisposition {
    /// Create the table from the declared schema when missing.
    #[default]
    IfNeeded,
    /// Fail when the table does not exist.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WriteDisposition {
    /// Replace all existing rows.
    #[default]
    Truncate,
    /// Add rows after the existing ones.
    Append,
    /// Fail unless the table has no rows.
    Empty,
}

impl WriteDisposition {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Truncate => "truncate",
            Self::Append => "append",
            Self::Empty => "empty",
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Anything the sink can bind against the declared schema, column by column.
pub trait TableRow {
    fn value(&self, field: &str) -> Value;
}

impl TableRow for RawRecord {
    fn value(&self, field: &str) -> Value {
        match self.get(field) {
            Some(v) => Value::Text(v.to_string()),
            None => Value::Null,
        }
    }
}

impl TableRow for PlanningRecord {
    fn value(&self, field: &str) -> Value {
        match field {
            "fiscal" => Value::Text(self.fiscal.clone()),
            "productgroup" => Value::Text(self.productgroup.clone()),
            "market" => Value::Text(self.market.clone()),
            "state" => Value::Text(self.state.clone()),
            "region" => Value::Text(self.region.clone()),
            "department" => Value::Text(self.department.clone()),
            "channel" => Value::Text(self.channel.clone()),
            "month" => Value::Integer(self.month),
            "quarter" => Value::Integer(self.quarter),
            "event" => Value::Integer(self.event),
            "cost" => Value::Real(self.cost),
            "kpi" => Value::Real(self.kpi),
            _ => Value::Null,
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Bookkeeping for one load, stored in `_load_jobs` in the same transaction.
#[derive(Debug, Clone)]
pub struct LoadJob {
    pub source: String,
    pub checksum: Option<String>,
    pub rejected: usize,
}

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// SQLite table names are case-insensitive, so `YOY` finds `yoy`.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE")?;
    Ok(stmt.exists([table])?)
}

pub fn row_count(conn: &Connection, table: &str) -> Result<i64> {
    Ok(conn.query_row(&format!("SELECT count(*) FROM \"{table}\""), [], |r| r.get(0))?)
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn verify_columns(conn: &Connection, table: &TableRef, schema: &TableSchema) -> Result<()> {
    let found = table_columns(conn, &table.table)?;
    let expected: Vec<(String, String)> = schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.field_type.sql_type().to_string()))
        .collect();
    let matches = found.len() == expected.len()
        && found
            .iter()
            .zip(&expected)
            .all(|((fname, ftype), (ename, etype))| fname == ename && ftype.eq_ignore_ascii_case(etype));
    if matches {
        return Ok(());
    }
    let render = |cols: &[(String, String)]| {
        cols.iter()
            .map(|(n, t)| format!("{n} {t}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    Err(PipelineError::SchemaMismatch {
        table: table.to_string(),
        expected: render(&expected),
        found: render(&found),
    })
}

/// Destination table with its declared schema and dispositions.
pub struct TableSink {
    conn: Connection,
    table: TableRef,
    schema: TableSchema,
    create: CreateDisposition,
    write: WriteDisposition,
}

impl TableSink {
    pub fn open(
        data_dir: &Path,
        table: TableRef,
        schema: TableSchema,
        create: CreateDisposition,
        write: WriteDisposition,
    ) -> Result<Self> {
        let conn = get_connection(&table.db_path(data_dir))?;
        conn.execute_batch(LOAD_JOBS_SCHEMA)?;
        Ok(Self {
            conn,
            table,
            schema,
            create,
            write,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Load `rows` in one transaction. Either every row lands and the
    /// disposition is applied, or the table is left as it was.
    pub fn write<R: TableRow>(&mut self, rows: &[R], job: &LoadJob) -> Result<usize> {
        let name = self.table.table.clone();
        let tx = self.conn.transaction()?;

        if table_exists(&tx, &name)? {
            verify_columns(&tx, &self.table, &self.schema)?;
        } else {
            match self.create {
                CreateDisposition::IfNeeded => {
                    tx.execute_batch(&self.schema.create_table_sql(&name))?;
                }
                CreateDisposition::Never => {
                    return Err(PipelineError::TableNotFound(self.table.to_string()));
                }
            }
        }

        match self.write {
            WriteDisposition::Truncate => {
                tx.execute(&format!("DELETE FROM \"{name}\""), [])?;
            }
            WriteDisposition::Append => {}
            WriteDisposition::Empty => {
                if row_count(&tx, &name)? > 0 {
                    return Err(PipelineError::TableNotEmpty(self.table.to_string()));
                }
            }
        }

        {
            let mut stmt = tx.prepare_cached(&self.schema.insert_sql(&name))?;
            for (idx, row) in rows.iter().enumerate() {
                let values = self.schema.fields.iter().map(|f| row.value(&f.name));
                stmt.execute(rusqlite::params_from_iter(values))
                    .map_err(|source| PipelineError::Load { row: idx + 1, source })?;
            }
        }

        tx.execute(
            "INSERT INTO _load_jobs (source, table_name, disposition, record_count, rejected_count, checksum, loaded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                job.source,
                name,
                self.write.key(),
                rows.len() as i64,
                job.rejected as i64,
                job.checksum,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        tx.commit()?;
        Ok(rows.len())
    }
}
