use std::fmt::{self, Write as _};

use rusqlite::types::ValueRef;
use serde::Serialize;

/// One column value as returned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(value) => Self::Integer(value),
            ValueRef::Real(value) => Self::Real(value),
            ValueRef::Text(bytes) => Self::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => f.write_str(&render_real(*value)),
            Self::Text(value) => f.write_str(&render_text(value)),
            Self::Blob(bytes) => f.write_str(&render_blob(bytes)),
        }
    }
}

/// An ordered tuple of column values. `Display` renders a tuple literal,
/// e.g. `('Artist A', 12)` or `(5,)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow(pub Vec<SqlValue>);

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('(')?;
        for (idx, value) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        if self.0.len() == 1 {
            f.write_char(',')?;
        }
        f.write_char(')')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Empty,
    RowSet(Vec<ResultRow>),
}

impl OperationResult {
    pub fn row_count(&self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::RowSet(rows) => Some(rows.len()),
        }
    }
}

fn render_real(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let rendered = format!("{value:e}");
        let (mantissa, exponent) = rendered.split_once('e').unwrap_or((rendered.as_str(), "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }

    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn preferred_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double { '"' } else { '\'' }
}

fn render_text(value: &str) -> String {
    let quote = preferred_quote(value.contains('\''), value.contains('"'));
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch == quote => {
                out.push('\\');
                out.push(ch);
            }
            ch if (ch as u32) < 0x20 || ch as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", ch as u32);
            }
            ch => out.push(ch),
        }
    }
    out.push(quote);
    out
}

fn render_blob(bytes: &[u8]) -> String {
    let quote = preferred_quote(bytes.contains(&b'\''), bytes.contains(&b'"'));
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in bytes {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            byte if byte as char == quote => {
                out.push('\\');
                out.push(byte as char);
            }
            0x20..=0x7e => out.push(byte as char),
            byte => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push(quote);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: String,
    pub status: StepStatus,
    pub rows: Option<usize>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub mode: String,
    pub failure_policy: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub database_path: String,
    pub steps: Vec<StepRecord>,
    pub table_counts: Vec<TableCount>,
    pub source_hashes: Vec<ResourceHash>,
}

#[cfg(test)]
mod tests {
    use super::{ResultRow, SqlValue};

    #[test]
    fn rows_render_as_tuple_literals() {
        let row = ResultRow(vec![SqlValue::from("Artist A"), SqlValue::Integer(12)]);
        assert_eq!(row.to_string(), "('Artist A', 12)");

        let single = ResultRow(vec![SqlValue::Integer(5)]);
        assert_eq!(single.to_string(), "(5,)");

        assert_eq!(ResultRow::default().to_string(), "()");
    }

    #[test]
    fn text_quoting_switches_to_double_quotes_for_apostrophes() {
        assert_eq!(SqlValue::from("Don't Stop").to_string(), "\"Don't Stop\"");
        assert_eq!(
            SqlValue::from("it's \"quoted\"").to_string(),
            "'it\\'s \"quoted\"'"
        );
        assert_eq!(SqlValue::from("a\\b\nc").to_string(), "'a\\\\b\\nc'");
    }

    #[test]
    fn reals_keep_a_fractional_part() {
        assert_eq!(SqlValue::Real(3.0).to_string(), "3.0");
        assert_eq!(SqlValue::Real(2.5).to_string(), "2.5");
        assert_eq!(SqlValue::Real(0.1).to_string(), "0.1");
        assert_eq!(SqlValue::Real(-4.0).to_string(), "-4.0");
        assert_eq!(SqlValue::Real(1e16).to_string(), "1e+16");
        assert_eq!(SqlValue::Real(1.5e-5).to_string(), "1.5e-05");
    }

    #[test]
    fn null_and_blob_values_render_like_literals() {
        assert_eq!(SqlValue::Null.to_string(), "None");
        assert_eq!(
            SqlValue::Blob(vec![b'a', 0, b'\'']).to_string(),
            "b\"a\\x00'\""
        );
    }
}
