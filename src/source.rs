use std::io::Read;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};
use crate::models::SourceLine;

/// Where the raw planning extract is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Stdin,
}

impl SourceLocation {
    /// Resolve a path or URI. Remote object stores are not readable here.
    pub fn parse(location: &str) -> Result<Self> {
        if location == "-" {
            return Ok(Self::Stdin);
        }
        if let Some(path) = location.strip_prefix("file://") {
            return Ok(Self::File(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = location.split_once("://") {
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
                return Err(PipelineError::UnsupportedSource(location.to_string()));
            }
        }
        Ok(Self::File(PathBuf::from(location)))
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Stdin => "<stdin>".to_string(),
        }
    }
}

/// Data lines plus fingerprint of the whole source.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub lines: Vec<SourceLine>,
    pub checksum: String,
    pub bytes: u64,
}

pub fn read_source(location: &SourceLocation) -> Result<SourceBatch> {
    let data = match location {
        SourceLocation::File(path) => std::fs::read(path)?,
        SourceLocation::Stdin => {
            let mut buf = Vec::new();
            std::io::stdin().lock().read_to_end(&mut buf)?;
            buf
        }
    };
    split_source(&data, &location.describe())
}

/// Split raw bytes into numbered data lines, skipping the header line.
pub fn split_source(data: &[u8], name: &str) -> Result<SourceBatch> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let checksum = hex::encode(hasher.finalize());

    let text = std::str::from_utf8(data)
        .map_err(|e| PipelineError::NonUtf8Source(format!("{name}: {e}")))?;

    let lines = text
        .lines()
        .enumerate()
        .skip(1)
        .map(|(idx, line)| SourceLine {
            number: idx as u64 + 1,
            text: line.to_string(),
        })
        .collect();

    Ok(SourceBatch {
        lines,
        checksum,
        bytes: data.len() as u64,
    })
}
