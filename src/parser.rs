use std::str::FromStr;

use crate::error::RecordError;
use crate::models::{PlanningRecord, RawRecord};
use crate::schema::{FieldType, FIELD_COUNT, PLANNING_FIELDS};

// ---------------------------------------------------------------------------
// Cleaning and tokenizing
// ---------------------------------------------------------------------------

/// Strip every double quote, then every embedded CR+LF pair.
///
/// CR+LF removal repeats until none remain, since `"\r\r\n\n"` leaves a
/// fresh pair behind after one pass. That keeps cleaning idempotent.
pub fn clean_line(raw: &str) -> String {
    let mut cleaned = raw.replace('"', "");
    while cleaned.contains("\r\n") {
        cleaned = cleaned.replace("\r\n", "");
    }
    cleaned
}

/// Split on commas, keeping empty tokens.
pub fn tokenize(cleaned: &str) -> Vec<&str> {
    cleaned.split(',').collect()
}

// ---------------------------------------------------------------------------
// Lenient policy
// ---------------------------------------------------------------------------

/// Map one raw line onto the planning fields by position.
///
/// Short lines leave trailing fields absent and excess tokens are dropped.
/// Values stay strings; the sink schema does the coercion.
pub fn parse_line(raw: &str) -> RawRecord {
    let cleaned = clean_line(raw);
    let mut record = RawRecord::default();
    for (&(name, _), value) in PLANNING_FIELDS.iter().zip(tokenize(&cleaned)) {
        record.insert(name, value.to_string());
    }
    record
}

// ---------------------------------------------------------------------------
// Strict policy
// ---------------------------------------------------------------------------

/// Parse one raw line into a typed record, failing on a token count other
/// than twelve or on a numeric field that does not parse.
pub fn parse_record(raw: &str) -> Result<PlanningRecord, RecordError> {
    let cleaned = clean_line(raw);
    let tokens = tokenize(&cleaned);
    if tokens.len() != FIELD_COUNT {
        return Err(RecordError::Malformed {
            expected: FIELD_COUNT,
            found: tokens.len(),
        });
    }

    Ok(PlanningRecord {
        fiscal: tokens[0].to_string(),
        productgroup: tokens[1].to_string(),
        market: tokens[2].to_string(),
        state: tokens[3].to_string(),
        region: tokens[4].to_string(),
        department: tokens[5].to_string(),
        channel: tokens[6].to_string(),
        month: integer(&tokens, 7)?,
        quarter: integer(&tokens, 8)?,
        event: integer(&tokens, 9)?,
        cost: float(&tokens, 10)?,
        kpi: float(&tokens, 11)?,
    })
}

fn integer(tokens: &[&str], idx: usize) -> Result<i64, RecordError> {
    typed(tokens, idx, FieldType::Integer)
}

fn float(tokens: &[&str], idx: usize) -> Result<f64, RecordError> {
    let value: f64 = typed(tokens, idx, FieldType::Float)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(idx, tokens[idx]))
    }
}

fn typed<T: FromStr>(tokens: &[&str], idx: usize, expected: FieldType) -> Result<T, RecordError> {
    debug_assert_eq!(PLANNING_FIELDS[idx].1, expected);
    tokens[idx].parse().map_err(|_| invalid(idx, tokens[idx]))
}

fn invalid(idx: usize, value: &str) -> RecordError {
    let (field, expected) = PLANNING_FIELDS[idx];
    RecordError::InvalidNumber {
        field: field.to_string(),
        expected,
        value: value.to_string(),
    }
}
