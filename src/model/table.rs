//! Tabular procedure results.
//!
//! Both transports normalize their responses into [`DataTable`]: named
//! columns over rows of [`Value`] cells. Single-row decoding is explicit —
//! a call that expects one summary row fails loudly when it gets zero or
//! many, instead of silently squeezing.

use indexmap::IndexMap;

use super::Value;
use crate::{Error, Result};

/// A result table: rows of named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// A single row in the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, Value>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Expect exactly one row and return it.
    ///
    /// Procedures with a summary-row shape (`stats`, `mutate`, `write`,
    /// `exists`, ...) go through here; zero or multiple rows is a protocol
    /// violation and fails with `Error::RowCount`.
    pub fn single(&self) -> Result<&Row> {
        match self.rows.len() {
            1 => Ok(&self.rows[0]),
            n => Err(Error::RowCount { expected: 1, actual: n }),
        }
    }

    /// Collect one column as strings, e.g. catalog name listings.
    pub fn column_as_strings(&self, column: &str) -> Result<Vec<String>> {
        self.rows.iter().map(|row| row.get::<String>(column)).collect()
    }
}

impl Row {
    pub fn new() -> Self {
        Self { values: IndexMap::new() }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Get a typed value from the row.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        let val = self
            .values
            .get(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))?;
        T::from_value(val)
    }

    /// Get a typed value, or `None` when the column is absent or null.
    pub fn get_optional<T: FromValue>(&self, column: &str) -> Result<Option<T>> {
        match self.values.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(val) => T::from_value(val).map(Some),
        }
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Convert from Value to concrete types.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(val: &Value) -> Result<Self> {
        Ok(val.clone())
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::String(s) => Ok(s.clone()),
            _ => Err(Error::TypeMismatch {
                expected: "String".into(),
                got: val.type_name().into(),
            }),
        }
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| Error::TypeMismatch {
            expected: "Integer".into(),
            got: val.type_name().into(),
        })
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_float().ok_or_else(|| Error::TypeMismatch {
            expected: "Float".into(),
            got: val.type_name().into(),
        })
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_bool().ok_or_else(|| Error::TypeMismatch {
            expected: "Boolean".into(),
            got: val.type_name().into(),
        })
    }
}

impl FromValue for Vec<String> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::List(items) => items.iter().map(String::from_value).collect(),
            _ => Err(Error::TypeMismatch {
                expected: "LIST of STRING".into(),
                got: val.type_name().into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_rows(n: usize) -> DataTable {
        let mut table = DataTable::new(vec!["name".into()]);
        for i in 0..n {
            table.push(Row::new().with("name", format!("g{i}")));
        }
        table
    }

    #[test]
    fn single_accepts_exactly_one_row() {
        let table = table_with_rows(1);
        let name: String = table.single().unwrap().get("name").unwrap();
        assert_eq!(name, "g0");
    }

    #[test]
    fn single_fails_loudly_on_zero_and_many() {
        match table_with_rows(0).single() {
            Err(Error::RowCount { expected: 1, actual: 0 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
        match table_with_rows(3).single() {
            Err(Error::RowCount { expected: 1, actual: 3 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn typed_get_reports_mismatch() {
        let row = Row::new().with("nodeCount", 42i64);
        assert_eq!(row.get::<i64>("nodeCount").unwrap(), 42);
        match row.get::<String>("nodeCount") {
            Err(Error::TypeMismatch { expected, got }) => {
                assert_eq!(expected, "String");
                assert_eq!(got, "INTEGER");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            row.get::<i64>("missing"),
            Err(Error::ColumnNotFound(_))
        ));
    }

    #[test]
    fn optional_get_treats_null_as_absent() {
        let row = Row::new().with("jobId", Value::Null);
        assert_eq!(row.get_optional::<String>("jobId").unwrap(), None);
        assert_eq!(row.get_optional::<String>("missing").unwrap(), None);
    }
}
