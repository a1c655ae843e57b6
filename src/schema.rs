use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, RecordError, Result};
use crate::models::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Integer,
    Float,
}

impl FieldType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
        }
    }

    /// Column type used in a STRICT SQLite table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::String => "TEXT",
            Self::Integer => "INTEGER",
            Self::Float => "REAL",
        }
    }

    /// Whether a STRICT column of this type stores `value` after SQLite's
    /// text-to-number conversion.
    ///
    /// Surrounding whitespace is ignored, and an INTEGER column also takes
    /// real literals with no fractional part (`3.0`, `1e2`).
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim_matches(|c: char| c.is_ascii_whitespace());
        match self {
            Self::String => true,
            Self::Integer => value.parse::<i64>().is_ok() || real(value).is_some_and(is_integral),
            Self::Float => real(value).is_some(),
        }
    }
}

fn real(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_integral(v: f64) -> bool {
    v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FieldType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => Ok(Self::String),
            "INTEGER" | "INT64" => Ok(Self::Integer),
            "FLOAT" | "FLOAT64" => Ok(Self::Float),
            other => Err(PipelineError::Schema(format!("unknown field type: {other}"))),
        }
    }
}

/// Planning columns in source order.
pub const PLANNING_FIELDS: [(&str, FieldType); 12] = [
    ("fiscal", FieldType::String),
    ("productgroup", FieldType::String),
    ("market", FieldType::String),
    ("state", FieldType::String),
    ("region", FieldType::String),
    ("department", FieldType::String),
    ("channel", FieldType::String),
    ("month", FieldType::Integer),
    ("quarter", FieldType::Integer),
    ("event", FieldType::Integer),
    ("cost", FieldType::Float),
    ("kpi", FieldType::Float),
];

pub const FIELD_COUNT: usize = PLANNING_FIELDS.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
}

/// Ordered field-name/type pairs declared at the sink boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub fields: Vec<FieldSpec>,
}

impl TableSchema {
    pub fn planning() -> Self {
        Self {
            fields: PLANNING_FIELDS
                .iter()
                .map(|(name, field_type)| FieldSpec {
                    name: name.to_string(),
                    field_type: *field_type,
                })
                .collect(),
        }
    }

    /// Parse the compact `name:TYPE,name:TYPE` form.
    #[allow(dead_code)]
    pub fn parse(spec: &str) -> Result<Self> {
        let mut fields = Vec::new();
        for part in spec.split(',') {
            let Some((name, ty)) = part.split_once(':') else {
                return Err(PipelineError::Schema(format!("expected name:TYPE, got {part:?}")));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(PipelineError::Schema(format!("empty field name in {part:?}")));
            }
            if fields.iter().any(|f: &FieldSpec| f.name == name) {
                return Err(PipelineError::Schema(format!("duplicate field: {name}")));
            }
            fields.push(FieldSpec {
                name: name.to_string(),
                field_type: ty.parse()?,
            });
        }
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn create_table_sql(&self, table: &str) -> String {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("\"{}\" {}", f.name, f.field_type.sql_type()))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" ({}) STRICT",
            columns.join(", ")
        )
    }

    pub fn insert_sql(&self, table: &str) -> String {
        let columns: Vec<String> = self.fields.iter().map(|f| format!("\"{}\"", f.name)).collect();
        let placeholders: Vec<String> = (1..=self.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// Verify that every present field of a lenient record coerces to its declared type.
    pub fn check(&self, record: &RawRecord) -> std::result::Result<(), RecordError> {
        for spec in &self.fields {
            let Some(value) = record.get(&spec.name) else {
                continue;
            };
            if !spec.field_type.accepts(value) {
                return Err(RecordError::InvalidNumber {
                    field: spec.name.clone(),
                    expected: spec.field_type,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|s| format!("{}:{}", s.name, s.field_type))
            .collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    const ORIGINAL_SCHEMA: &str = "fiscal:STRING,productgroup:STRING,market:STRING,state:STRING,\
region:STRING,department:STRING,channel:STRING,month:INTEGER,\
quarter:INTEGER,event:INTEGER,cost:FLOAT,kpi:FLOAT";

    #[test]
    fn test_planning_schema_renders_compact_form() {
        assert_eq!(TableSchema::planning().to_string(), ORIGINAL_SCHEMA);
    }

    #[test]
    fn test_parse_compact_form() {
        let schema = TableSchema::parse(ORIGINAL_SCHEMA).unwrap();
        assert_eq!(schema, TableSchema::planning());
        assert_eq!(schema.len(), 12);
    }

    #[test]
    fn test_type_counts() {
        let schema = TableSchema::planning();
        let count = |t: FieldType| schema.fields.iter().filter(|f| f.field_type == t).count();
        assert_eq!(count(FieldType::String), 7);
        assert_eq!(count(FieldType::Integer), 3);
        assert_eq!(count(FieldType::Float), 2);
    }

    #[test]
    fn test_parse_rejects_bad_specs() {
        assert!(TableSchema::parse("fiscal").is_err());
        assert!(TableSchema::parse("fiscal:DATE").is_err());
        assert!(TableSchema::parse(":STRING").is_err());
        assert!(TableSchema::parse("a:STRING,a:INTEGER").is_err());
    }

    #[test]
    fn test_create_table_sql() {
        let sql = TableSchema::parse("month:INTEGER,cost:FLOAT,fiscal:STRING").unwrap().create_table_sql("yoy");
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"yoy\" (\"month\" INTEGER, \"cost\" REAL, \"fiscal\" TEXT) STRICT"
        );
    }

    #[test]
    fn test_insert_sql_placeholders() {
        let sql = TableSchema::parse("a:STRING,b:FLOAT").unwrap().insert_sql("t");
        assert_eq!(sql, "INSERT INTO \"t\" (\"a\", \"b\") VALUES (?1, ?2)");
    }

    #[test]
    fn test_well_formed_record_coerces_against_schema() {
        let record = parse_line("FY24,GroceryA,US,CA,West,Marketing,Retail,3,1,0,1250.50,88.2");
        assert!(TableSchema::planning().check(&record).is_ok());
    }

    #[test]
    fn test_non_numeric_token_fails_check() {
        let record = parse_line("FY24,GroceryA,US,CA,West,Marketing,Retail,March,1,0,1250.50,88.2");
        let err = TableSchema::planning().check(&record).unwrap_err();
        assert_eq!(
            err,
            RecordError::InvalidNumber {
                field: "month".to_string(),
                expected: FieldType::Integer,
                value: "March".to_string(),
            }
        );
    }

    #[test]
    fn test_absent_fields_pass_check() {
        let record = parse_line("FY24,GroceryA");
        assert!(TableSchema::planning().check(&record).is_ok());
    }

    #[test]
    fn test_accepts() {
        assert!(FieldType::Integer.accepts("-12"));
        assert!(!FieldType::Integer.accepts("3.5"));
        assert!(!FieldType::Integer.accepts(""));
        assert!(FieldType::Float.accepts("1e3"));
        assert!(!FieldType::Float.accepts("NaN"));
        assert!(FieldType::String.accepts(""));
    }

    #[test]
    fn test_accepts_follows_sqlite_text_conversion() {
        assert!(FieldType::Integer.accepts("3.0"));
        assert!(FieldType::Integer.accepts(" 3 "));
        assert!(FieldType::Integer.accepts("1e2"));
        assert!(FieldType::Integer.accepts("+7"));
        assert!(!FieldType::Integer.accepts("0x10"));
        assert!(!FieldType::Integer.accepts("1e30"));
        assert!(!FieldType::Integer.accepts("inf"));
        assert!(FieldType::Float.accepts(" 88.2\t"));
        assert!(FieldType::Float.accepts("12"));
        assert!(!FieldType::Float.accepts("$1250"));
    }

    #[test]
    fn test_check_agrees_with_strict_table() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let schema = TableSchema::planning();
        conn.execute_batch(&schema.create_table_sql("yoy")).unwrap();
        let mut stmt = conn.prepare(&schema.insert_sql("yoy")).unwrap();
        let lines = [
            "FY24,G,US,CA,West,Mkt,Retail,3.0,1,0,1250.50,88.2",
            "FY24,G,US,CA,West,Mkt,Retail, 3,1,0,1250.50 ,88",
            "FY24,G,US,CA,West,Mkt,Retail,3.5,1,0,1250.50,88.2",
            "FY24,G,US,CA,West,Mkt,Retail,March,1,0,1250.50,88.2",
            "FY24,G,US,CA,West,Mkt,Retail,3,1,0,$1250,88.2",
        ];
        for line in lines {
            let record = parse_line(line);
            let values: Vec<rusqlite::types::Value> = schema
                .fields
                .iter()
                .map(|f| match record.get(&f.name) {
                    Some(v) => rusqlite::types::Value::Text(v.to_string()),
                    None => rusqlite::types::Value::Null,
                })
                .collect();
            let stored = stmt.execute(rusqlite::params_from_iter(values)).is_ok();
            assert_eq!(schema.check(&record).is_ok(), stored, "disagreement on {line:?}");
        }
    }
}
