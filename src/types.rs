use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::ser::Serializer;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Values that can appear in a result row or be bound as query parameters.
///
/// One closed enum is shared between parameter binding and result
/// extraction so callers never touch driver types:
/// ```rust
/// use db_conduit::prelude::*;
///
/// let params = vec![
///     RowValue::Int(1),
///     RowValue::Text("alice".into()),
///     RowValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValue::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValue::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            // Try "YYYY-MM-DD HH:MM:SS.SSS"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S.%3f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Variant name used in `TypeMismatch` diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            RowValue::Int(_) => "integer",
            RowValue::Float(_) => "float",
            RowValue::Text(_) => "text",
            RowValue::Bool(_) => "boolean",
            RowValue::Timestamp(_) => "timestamp",
            RowValue::Null => "null",
            RowValue::JSON(_) => "json",
            RowValue::Blob(_) => "blob",
        }
    }
}

impl Serialize for RowValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RowValue::Int(i) => serializer.serialize_i64(*i),
            RowValue::Float(f) => serializer.serialize_f64(*f),
            RowValue::Text(s) => serializer.serialize_str(s),
            RowValue::Bool(b) => serializer.serialize_bool(*b),
            RowValue::Timestamp(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            RowValue::Null => serializer.serialize_none(),
            RowValue::JSON(value) => value.serialize(serializer),
            RowValue::Blob(bytes) => serializer.serialize_bytes(bytes),
        }
    }
}

/// Transaction isolation applied to every pooled connection.
///
/// SQLite is serializable by default; `ReadUncommitted` opts a connection
/// into dirty reads via `PRAGMA read_uncommitted` (useful with shared-cache
/// databases).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum IsolationLevel {
    /// Serializable isolation (the `SQLite` default)
    #[default]
    Serializable,
    /// Dirty reads permitted for shared-cache connections
    ReadUncommitted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_accessor_accepts_integer_flags() {
        assert_eq!(RowValue::Int(1).as_bool(), Some(&true));
        assert_eq!(RowValue::Int(0).as_bool(), Some(&false));
        assert_eq!(RowValue::Int(7).as_bool(), None);
        assert_eq!(RowValue::Bool(true).as_bool(), Some(&true));
    }

    #[test]
    fn timestamp_accessor_parses_text() {
        let parsed = RowValue::Text("2021-08-06 16:00:00".into())
            .as_timestamp()
            .unwrap();
        assert_eq!(
            parsed,
            NaiveDateTime::parse_from_str("2021-08-06 16:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
        assert!(RowValue::Text("not a date".into()).as_timestamp().is_none());
    }

    #[test]
    fn serializes_to_plain_json() {
        let json = serde_json::to_string(&RowValue::Int(42)).unwrap();
        assert_eq!(json, "42");
        let json = serde_json::to_string(&RowValue::Null).unwrap();
        assert_eq!(json, "null");
    }
}
