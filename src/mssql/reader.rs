use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tiberius::Uuid;

use crate::error::{Result, SqlServerError};
use crate::results::{CustomDbRow, ResultSet};
use crate::types::{FromRowValue, RowValues};

/// Forward-only cursor over the buffered result sets of one execution.
///
/// The reader owns its rows, so the data object that produced it is free to
/// run other commands while the caller iterates.
///
/// ```rust
/// use mssql_fluent::prelude::*;
///
/// let mut reader = DataReader::default();
/// assert!(!reader.read());
/// assert!(!reader.next_result());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataReader {
    sets: Vec<ResultSet>,
    set_index: usize,
    // None before the first read()
    row_index: Option<usize>,
}

impl DataReader {
    #[must_use]
    pub fn new(sets: Vec<ResultSet>) -> Self {
        Self {
            sets,
            set_index: 0,
            row_index: None,
        }
    }

    fn current_set(&self) -> Option<&ResultSet> {
        self.sets.get(self.set_index)
    }

    /// Advance to the next row of the current result set.
    pub fn read(&mut self) -> bool {
        let Some(len) = self.current_set().map(|s| s.results.len()) else {
            return false;
        };
        let next = self.row_index.map_or(0, |i| i + 1);
        self.row_index = Some(next.min(len));
        next < len
    }

    /// Move to the next result set; the cursor goes back before its first row.
    pub fn next_result(&mut self) -> bool {
        if self.set_index < self.sets.len() {
            self.set_index += 1;
        }
        self.row_index = None;
        self.set_index < self.sets.len()
    }

    /// Whether the current result set has any rows.
    #[must_use]
    pub fn has_rows(&self) -> bool {
        self.current_set().is_some_and(|s| !s.is_empty())
    }

    /// Number of result sets buffered.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.sets.len()
    }

    /// Number of columns in the current result set.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.current_set().map_or(0, ResultSet::column_count)
    }

    fn column_names(&self) -> &[String] {
        self.current_set()
            .and_then(ResultSet::get_column_names)
            .map_or(&[][..], |names| names.as_slice())
    }

    /// Name of the column at `ordinal`.
    ///
    /// # Errors
    /// Returns `SqlServerError::ColumnNotFound` if the ordinal is out of range.
    pub fn get_name(&self, ordinal: usize) -> Result<&str> {
        self.column_names()
            .get(ordinal)
            .map(String::as_str)
            .ok_or_else(|| SqlServerError::ColumnNotFound(format!("ordinal {ordinal}")))
    }

    /// Ordinal of a column, matched ignoring ASCII case.
    ///
    /// # Errors
    /// Returns `SqlServerError::ColumnNotFound` if no column has that name.
    pub fn get_ordinal(&self, name: &str) -> Result<usize> {
        let names = self.column_names();
        names
            .iter()
            .position(|n| n == name)
            .or_else(|| names.iter().position(|n| n.eq_ignore_ascii_case(name)))
            .ok_or_else(|| SqlServerError::ColumnNotFound(name.to_string()))
    }

    /// The row under the cursor.
    ///
    /// # Errors
    /// Returns `SqlServerError::NoCurrentRow` unless the last `read()` returned true.
    pub fn current_row(&self) -> Result<&CustomDbRow> {
        self.row_index
            .and_then(|i| self.current_set().and_then(|s| s.results.get(i)))
            .ok_or(SqlServerError::NoCurrentRow)
    }

    /// Raw value of a column of the current row.
    ///
    /// # Errors
    /// Returns `SqlServerError::NoCurrentRow` or `SqlServerError::ColumnNotFound`.
    pub fn get_value(&self, ordinal: usize) -> Result<&RowValues> {
        self.current_row()?
            .get_by_index(ordinal)
            .ok_or_else(|| SqlServerError::ColumnNotFound(format!("ordinal {ordinal}")))
    }

    /// # Errors
    /// Same as [`DataReader::get_value`].
    pub fn is_db_null(&self, ordinal: usize) -> Result<bool> {
        Ok(self.get_value(ordinal)?.is_null())
    }

    /// Typed value; NULL is an error.
    ///
    /// # Errors
    /// Returns `SqlServerError::NullValue` on NULL, `SqlServerError::TypeMismatch`
    /// for another type, or the errors of [`DataReader::get_value`].
    pub fn get<T: FromRowValue>(&self, ordinal: usize) -> Result<T> {
        self.get_or_null(ordinal)?.ok_or_else(|| {
            let column = self.get_name(ordinal).unwrap_or("?");
            SqlServerError::NullValue(column.to_string())
        })
    }

    /// Typed value, `None` on NULL.
    ///
    /// # Errors
    /// Returns `SqlServerError::TypeMismatch` for another type, or the errors of
    /// [`DataReader::get_value`].
    pub fn get_or_null<T: FromRowValue>(&self, ordinal: usize) -> Result<Option<T>> {
        T::from_row_value(self.get_value(ordinal)?)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_bool(&self, ordinal: usize) -> Result<bool> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_byte(&self, ordinal: usize) -> Result<u8> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_i16(&self, ordinal: usize) -> Result<i16> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_i32(&self, ordinal: usize) -> Result<i32> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_i64(&self, ordinal: usize) -> Result<i64> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_f32(&self, ordinal: usize) -> Result<f32> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_f64(&self, ordinal: usize) -> Result<f64> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_decimal(&self, ordinal: usize) -> Result<Decimal> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_date_time(&self, ordinal: usize) -> Result<NaiveDateTime> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_string(&self, ordinal: usize) -> Result<String> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_bytes(&self, ordinal: usize) -> Result<Vec<u8>> {
        self.get(ordinal)
    }

    /// XML column as text.
    ///
    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_xml(&self, ordinal: usize) -> Result<String> {
        self.get(ordinal)
    }

    /// # Errors
    /// See [`DataReader::get`].
    pub fn get_guid(&self, ordinal: usize) -> Result<Uuid> {
        self.get(ordinal)
    }

    /// Give back the buffered result sets.
    #[must_use]
    pub fn into_result_sets(self) -> Vec<ResultSet> {
        self.sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn reader() -> DataReader {
        let mut departments = ResultSet::with_capacity(2);
        departments.set_column_names(Arc::new(vec![
            "DepartmentID".into(),
            "Name".into(),
            "GroupName".into(),
        ]));
        departments.add_row_values(vec![
            RowValues::SmallInt(1),
            RowValues::Text("Engineering".into()),
            RowValues::Null,
        ]);
        departments.add_row_values(vec![
            RowValues::SmallInt(2),
            RowValues::Text("Tool Design".into()),
            RowValues::Text("Research and Development".into()),
        ]);

        let mut empty = ResultSet::with_capacity(0);
        empty.set_column_names(Arc::new(vec!["ShiftID".into()]));

        DataReader::new(vec![departments, empty])
    }

    #[test]
    fn values_need_a_current_row() {
        let mut reader = reader();
        assert!(matches!(reader.get_value(0), Err(SqlServerError::NoCurrentRow)));
        assert!(reader.read());
        assert_eq!(reader.get_i16(0).unwrap(), 1);
        assert!(reader.read());
        assert!(!reader.read());
        assert!(matches!(reader.get_value(0), Err(SqlServerError::NoCurrentRow)));
        assert!(!reader.read());
    }

    #[test]
    fn ordinals_are_case_insensitive() {
        let reader = reader();
        assert_eq!(reader.field_count(), 3);
        assert_eq!(reader.get_ordinal("GroupName").unwrap(), 2);
        assert_eq!(reader.get_ordinal("groupname").unwrap(), 2);
        assert_eq!(reader.get_name(1).unwrap(), "Name");
        assert!(matches!(
            reader.get_ordinal("Missing"),
            Err(SqlServerError::ColumnNotFound(_))
        ));
        assert!(reader.get_name(9).is_err());
    }

    #[test]
    fn null_handling() {
        let mut reader = reader();
        reader.read();
        assert!(reader.is_db_null(2).unwrap());
        assert!(matches!(reader.get_string(2), Err(SqlServerError::NullValue(c)) if c == "GroupName"));
        assert_eq!(reader.get_or_null::<String>(2).unwrap(), None);
        assert_eq!(reader.get_string(1).unwrap(), "Engineering");
        // smallint widens but does not read as a string
        assert_eq!(reader.get_i32(0).unwrap(), 1);
        assert!(reader.get_string(0).is_err());
        assert!(reader.get_value(3).is_err());
    }

    #[test]
    fn moves_across_result_sets() {
        let mut reader = reader();
        assert_eq!(reader.result_count(), 2);
        assert!(reader.has_rows());
        reader.read();
        assert!(reader.next_result());
        assert!(!reader.has_rows());
        assert_eq!(reader.field_count(), 1);
        assert!(matches!(reader.current_row(), Err(SqlServerError::NoCurrentRow)));
        assert!(!reader.read());
        assert!(!reader.next_result());
        assert_eq!(reader.field_count(), 0);
        assert!(!reader.read());
    }
}
