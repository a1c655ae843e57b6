use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::engine::EngineOptions;
use crate::error::{PipelineError, RecordError, Result};
use crate::models::{PlanningRecord, RejectedLine, SourceLine};
use crate::parser::{parse_line, parse_record};
use crate::schema::TableSchema;
use crate::sink::{CreateDisposition, LoadJob, TableRef, TableRow, TableSink, WriteDisposition};
use crate::source::{read_source, SourceBatch, SourceLocation};

/// How a line whose shape does not fit the schema is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenPolicy {
    /// Keep whatever fields are present and defer typing to the sink.
    #[default]
    Lenient,
    /// Require twelve tokens and parseable numbers; reject the rest.
    Strict,
}

/// Everything the driver needs, built once and handed to [`Pipeline::new`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: SourceLocation,
    pub output: TableRef,
    pub data_dir: PathBuf,
    pub policy: TokenPolicy,
    pub dead_letter: Option<PathBuf>,
    pub create: CreateDisposition,
    pub write: WriteDisposition,
    pub credentials: Option<PathBuf>,
    pub engine: EngineOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub source: String,
    pub table: String,
    pub bytes: u64,
    pub lines: usize,
    pub written: usize,
    pub rejected: usize,
    pub checksum: String,
    pub dead_letter: Option<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        if let Some(creds) = &config.credentials {
            if !creds.is_file() {
                return Err(PipelineError::Credentials(creds.display().to_string()));
            }
        }
        let unrecognized = config.engine.unrecognized();
        if !unrecognized.is_empty() {
            debug!(args = ?unrecognized, "engine arguments passed through");
        }
        let pool = config.engine.build_pool()?;
        Ok(Self { config, pool })
    }

    pub fn run(&self) -> Result<RunSummary> {
        info!(source = %self.config.input.describe(), "reading source");
        let batch = read_source(&self.config.input)?;
        self.run_batch(batch)
    }

    /// Parse every line of `batch` in parallel and load the result.
    pub fn run_batch(&self, batch: SourceBatch) -> Result<RunSummary> {
        info!(
            lines = batch.lines.len(),
            bytes = batch.bytes,
            workers = self.pool.current_num_threads(),
            "parsing"
        );

        let (written, rejected) = match self.config.policy {
            TokenPolicy::Lenient => {
                let rows = self.pool.install(|| {
                    batch.lines.par_iter().map(|l| parse_line(&l.text)).collect::<Vec<_>>()
                });
                trace_rows(&batch.lines, &rows);
                let schema = TableSchema::planning();
                for (line, row) in batch.lines.iter().zip(&rows) {
                    if let Err(error) = schema.check(row) {
                        warn!(line = line.number, %error, "record will fail table coercion");
                    }
                }
                (self.load(&batch, &rows, 0)?, 0)
            }
            TokenPolicy::Strict => {
                let outcomes: Vec<std::result::Result<PlanningRecord, RecordError>> = self.pool.install(|| {
                    batch.lines.par_iter().map(|l| parse_record(&l.text)).collect()
                });
                let (rows, rejects) = split_outcomes(&batch.lines, outcomes);
                for reject in &rejects {
                    warn!(line = reject.line, error = %reject.error, "rejected record");
                }
                if let Some(path) = &self.config.dead_letter {
                    write_dead_letters(path, &rejects)?;
                }
                let (lines, records): (Vec<SourceLine>, Vec<PlanningRecord>) = rows.into_iter().unzip();
                trace_rows(&lines, &records);
                let loaded = SourceBatch {
                    lines,
                    checksum: batch.checksum.clone(),
                    bytes: batch.bytes,
                };
                (self.load(&loaded, &records, rejects.len())?, rejects.len())
            }
        };

        info!(written, rejected, table = %self.config.output, "load complete");
        Ok(RunSummary {
            source: self.config.input.describe(),
            table: self.config.output.to_string(),
            bytes: batch.bytes,
            lines: batch.lines.len(),
            written,
            rejected,
            checksum: batch.checksum,
            dead_letter: self.config.dead_letter.clone(),
        })
    }

    fn load<R: TableRow>(&self, batch: &SourceBatch, rows: &[R], rejected: usize) -> Result<usize> {
        let mut sink = TableSink::open(
            &self.config.data_dir,
            self.config.output.clone(),
            TableSchema::planning(),
            self.config.create,
            self.config.write,
        )?;
        let job = LoadJob {
            source: self.config.input.describe(),
            checksum: Some(batch.checksum.clone()),
            rejected,
        };
        info!(table = %sink.table(), rows = rows.len(), disposition = self.config.write.key(), "writing");
        sink.write(rows, &job).map_err(|e| {
            if let PipelineError::Load { row, .. } = &e {
                if let Some(line) = batch.lines.get(row - 1) {
                    error!(line = line.number, raw = %line.text, "sink rejected source line");
                }
            }
            e
        })
    }
}

fn split_outcomes(
    lines: &[SourceLine],
    outcomes: Vec<std::result::Result<PlanningRecord, RecordError>>,
) -> (Vec<(SourceLine, PlanningRecord)>, Vec<RejectedLine>) {
    let mut rows = Vec::new();
    let mut rejects = Vec::new();
    for (line, outcome) in lines.iter().zip(outcomes) {
        match outcome {
            Ok(record) => rows.push((line.clone(), record)),
            Err(error) => rejects.push(RejectedLine {
                line: line.number,
                raw: line.text.clone(),
                error,
            }),
        }
    }
    (rows, rejects)
}

/// Per-record diagnostic, emitted as JSON. Purely observational.
fn trace_rows<R: serde::Serialize>(lines: &[SourceLine], rows: &[R]) {
    if !tracing::enabled!(tracing::Level::TRACE) {
        return;
    }
    for (line, row) in lines.iter().zip(rows) {
        let json = serde_json::to_string(row).unwrap_or_default();
        trace!(line = line.number, record = %json, "parsed");
    }
}

/// Write rejected lines as CSV: `line,error,raw`.
pub fn write_dead_letters(path: &std::path::Path, rejects: &[RejectedLine]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["line", "error", "raw"])?;
    for reject in rejects {
        wtr.write_record([reject.line.to_string(), reject.error.to_string(), reject.raw.clone()])?;
    }
    wtr.flush()?;
    Ok(())
}
