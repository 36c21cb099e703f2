//! SQL values and their literal rendering.
//!
//! Bulk statements are sent as plain SQL text so that their size can be
//! measured against the statement budget. Every value therefore has to be
//! rendered as a MySQL literal. Quotes are doubled; backslashes and control
//! characters use backslash escapes, which the MySQL target keeps enabled by
//! pinning the session `sql_mode`.

use chrono::{NaiveDateTime, Timelike};

/// A single column value of a row headed for the target store.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    I64(i64),
    /// 64-bit floating point.
    F64(f64),
    /// Text data.
    Text(String),
    /// Timestamp without timezone.
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Render this value as a MySQL literal.
    #[must_use]
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F64(v) if !v.is_finite() => "NULL".to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Text(s) => quote_str(s),
            SqlValue::DateTime(dt) => format!("'{}'", format_datetime(dt)),
        }
    }

    /// Returns the integer if this is an `I64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string slice if this is `Text`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this value is stored as NULL. Non-finite floats are, since
    /// MySQL has no literal for them.
    #[must_use]
    pub fn is_null(&self) -> bool {
        match self {
            SqlValue::Null => true,
            SqlValue::F64(v) => !v.is_finite(),
            _ => false,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

/// Render a row as a parenthesized value tuple: `(1, 'a')`.
#[must_use]
pub fn render_tuple(values: &[SqlValue]) -> String {
    let rendered: Vec<String> = values.iter().map(SqlValue::to_sql_literal).collect();
    format!("({})", rendered.join(", "))
}

/// Quote a MySQL identifier.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    let base = dt.format("%Y-%m-%d %H:%M:%S").to_string();
    let micros = dt.nanosecond() / 1_000;
    if micros == 0 {
        base
    } else {
        format!("{}.{:06}", base, micros)
    }
}
