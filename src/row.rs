use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::DbError;
use crate::types::RowValue;

/// A single row from a query result.
///
/// Column names are shared across all rows of a result set; values sit in
/// result-set order. Lookup is by column label or positional index.
#[derive(Debug, Clone)]
pub struct Row {
    /// The column labels for this row (shared across the result set)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<RowValue>,
    // Cache for column lookups, to avoid repeated string comparisons
    #[doc(hidden)]
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl Row {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValue>) -> Self {
        let cache = Arc::new(
            column_names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>(),
        );

        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name.
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }

        // Fall back to linear search
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value by column name, or `None` if the column is absent.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValue> {
        let index_opt = self.column_index(column_name);
        if let Some(idx) = index_opt {
            self.values.get(idx)
        } else {
            None
        }
    }

    /// Get a value by column index, or `None` if out of bounds.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValue> {
        self.values.get(index)
    }

    /// Integer column accessor.
    ///
    /// Returns `Ok(None)` when the column is absent or NULL.
    ///
    /// # Errors
    /// Returns `DbError::TypeMismatch` if the value is a non-integer variant.
    pub fn get_long(&self, column: &str) -> Result<Option<i64>, DbError> {
        match self.get(column) {
            None | Some(RowValue::Null) => Ok(None),
            Some(RowValue::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(mismatch(column, "integer", other)),
        }
    }

    /// Float column accessor; integer values widen losslessly enough for
    /// aggregate results.
    ///
    /// # Errors
    /// Returns `DbError::TypeMismatch` if the value is neither float nor
    /// integer.
    pub fn get_double(&self, column: &str) -> Result<Option<f64>, DbError> {
        match self.get(column) {
            None | Some(RowValue::Null) => Ok(None),
            Some(RowValue::Float(f)) => Ok(Some(*f)),
            #[allow(clippy::cast_precision_loss)]
            Some(RowValue::Int(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(mismatch(column, "float", other)),
        }
    }

    /// Text column accessor.
    ///
    /// # Errors
    /// Returns `DbError::TypeMismatch` if the value is a non-text variant.
    pub fn get_string(&self, column: &str) -> Result<Option<&str>, DbError> {
        match self.get(column) {
            None | Some(RowValue::Null) => Ok(None),
            Some(RowValue::Text(s)) => Ok(Some(s)),
            Some(other) => Err(mismatch(column, "text", other)),
        }
    }

    /// Boolean column accessor; accepts 0/1 integer flags the way drivers
    /// commonly store booleans.
    ///
    /// # Errors
    /// Returns `DbError::TypeMismatch` if the value cannot be read as a
    /// boolean.
    pub fn get_bool(&self, column: &str) -> Result<Option<bool>, DbError> {
        match self.get(column) {
            None | Some(RowValue::Null) => Ok(None),
            Some(value) => value
                .as_bool()
                .copied()
                .map(Some)
                .ok_or_else(|| mismatch(column, "boolean", value)),
        }
    }

    /// Blob column accessor.
    ///
    /// # Errors
    /// Returns `DbError::TypeMismatch` if the value is a non-blob variant.
    pub fn get_blob(&self, column: &str) -> Result<Option<&[u8]>, DbError> {
        match self.get(column) {
            None | Some(RowValue::Null) => Ok(None),
            Some(RowValue::Blob(bytes)) => Ok(Some(bytes)),
            Some(other) => Err(mismatch(column, "blob", other)),
        }
    }
}

fn mismatch(column: &str, expected: &'static str, found: &RowValue) -> DbError {
    DbError::TypeMismatch {
        column: column.to_string(),
        expected,
        found: found.type_name(),
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.column_names.iter().zip(&self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        Row::new(
            Arc::new(vec!["id".to_string(), "name".to_string(), "active".to_string()]),
            vec![
                RowValue::Int(7),
                RowValue::Text("alice".into()),
                RowValue::Int(1),
            ],
        )
    }

    #[test]
    fn lookup_by_name_and_index_agree() {
        let row = sample_row();
        assert_eq!(row.get("name"), row.get_by_index(1));
        assert_eq!(row.column_index("active"), Some(2));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn typed_accessors_enforce_variants() {
        let row = sample_row();
        assert_eq!(row.get_long("id").unwrap(), Some(7));
        assert_eq!(row.get_string("name").unwrap(), Some("alice"));
        assert_eq!(row.get_bool("active").unwrap(), Some(true));
        assert_eq!(row.get_long("missing").unwrap(), None);

        let err = row.get_long("name").unwrap_err();
        assert!(matches!(
            err,
            DbError::TypeMismatch { expected: "integer", found: "text", .. }
        ));
    }

    #[test]
    fn serializes_as_ordered_map() {
        let row = sample_row();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":7,"name":"alice","active":1}"#);
    }
}
