use deadpool_sqlite::rusqlite;
use rusqlite::types::Value;

use crate::types::RowValue;

/// Convert a single `RowValue` to a driver value for positional binding.
#[must_use]
pub fn to_sqlite_value(value: &RowValue) -> Value {
    match value {
        RowValue::Int(i) => Value::Integer(*i),
        RowValue::Float(f) => Value::Real(*f),
        RowValue::Text(s) => Value::Text(s.clone()),
        RowValue::Bool(b) => Value::Integer(i64::from(*b)),
        RowValue::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValue::Null => Value::Null,
        RowValue::JSON(jval) => Value::Text(jval.to_string()),
        RowValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert a parameter slice for one statement execution.
#[must_use]
pub fn convert_params(params: &[RowValue]) -> Vec<Value> {
    params.iter().map(to_sqlite_value).collect()
}

/// Extract a `RowValue` from a driver row at `idx`.
///
/// # Errors
/// Returns the driver error if the column cannot be read.
pub fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<RowValue, rusqlite::Error> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValue::Null,
        Value::Integer(i) => RowValue::Int(i),
        Value::Real(f) => RowValue::Float(f),
        Value::Text(s) => RowValue::Text(s),
        Value::Blob(b) => RowValue::Blob(b),
    })
}
