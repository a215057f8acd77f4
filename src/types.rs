use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::Uuid;

use crate::error::{Result, SqlServerError};

/// Values that can be stored in a database row or used as parameter values.
///
/// The integer and floating point variants keep the width of the SQL Server
/// type they came from, so a `smallint` column reads back as
/// [`RowValues::SmallInt`] and binds back as `smallint`:
/// ```rust
/// use mssql_fluent::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("Engineering".into()),
///     RowValues::Bool(true),
/// ];
/// assert_eq!(values[0].as_int(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// `bit`
    Bool(bool),
    /// `tinyint`
    TinyInt(u8),
    /// `smallint`
    SmallInt(i16),
    /// `int`
    Int(i32),
    /// `bigint`
    BigInt(i64),
    /// `real`
    Real(f32),
    /// `float`
    Float(f64),
    /// `decimal` / `numeric` / `money`
    Decimal(Decimal),
    /// `datetime`, `smalldatetime`, `datetime2`
    Timestamp(NaiveDateTime),
    /// `date`
    Date(NaiveDate),
    /// `time`
    Time(NaiveTime),
    /// `datetimeoffset`
    DateTimeOffset(DateTime<FixedOffset>),
    /// Character data
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
    /// `xml`
    Xml(String),
    /// `uniqueidentifier`
    Guid(Uuid),
    /// NULL value
    Null,
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Any integer width, widened to `i64`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            RowValues::TinyInt(v) => Some(i64::from(*v)),
            RowValues::SmallInt(v) => Some(i64::from(*v)),
            RowValues::Int(v) => Some(i64::from(*v)),
            RowValues::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        if let RowValues::Bool(value) = self {
            return Some(*value);
        } else if let Some(i) = self.as_int() {
            if i == 1 {
                return Some(true);
            } else if i == 0 {
                return Some(false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(value) => Some(*value),
            RowValues::Date(date) => Some(date.and_time(NaiveTime::MIN)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            RowValues::Real(value) => Some(f64::from(*value)),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        if let RowValues::Decimal(value) = self {
            Some(*value)
        } else {
            self.as_int().map(Decimal::from)
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_xml(&self) -> Option<&str> {
        match self {
            RowValues::Xml(value) | RowValues::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_guid(&self) -> Option<Uuid> {
        if let RowValues::Guid(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RowValues::Bool(_) => "bit",
            RowValues::TinyInt(_) => "tinyint",
            RowValues::SmallInt(_) => "smallint",
            RowValues::Int(_) => "int",
            RowValues::BigInt(_) => "bigint",
            RowValues::Real(_) => "real",
            RowValues::Float(_) => "float",
            RowValues::Decimal(_) => "decimal",
            RowValues::Timestamp(_) => "datetime",
            RowValues::Date(_) => "date",
            RowValues::Time(_) => "time",
            RowValues::DateTimeOffset(_) => "datetimeoffset",
            RowValues::Text(_) => "nvarchar",
            RowValues::Blob(_) => "varbinary",
            RowValues::Xml(_) => "xml",
            RowValues::Guid(_) => "uniqueidentifier",
            RowValues::Null => "NULL",
        }
    }
}

/// Typed extraction of a [`RowValues`].
///
/// NULL yields `Ok(None)`; a value of another type (or an integer that does
/// not fit) yields [`SqlServerError::TypeMismatch`].
pub trait FromRowValue: Sized {
    /// Name of the target type, used in error messages.
    const TYPE_NAME: &'static str;

    /// Convert a value.
    ///
    /// # Errors
    /// Returns `SqlServerError::TypeMismatch` if the value cannot be represented as `Self`.
    fn from_row_value(value: &RowValues) -> Result<Option<Self>>;
}

fn mismatch<T>(expected: &str, value: &RowValues) -> Result<Option<T>> {
    Err(SqlServerError::type_mismatch(expected, value.kind()))
}

macro_rules! impl_from_row_value_int {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromRowValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
                    if value.is_null() {
                        return Ok(None);
                    }
                    match value.as_int() {
                        Some(i) => <$ty>::try_from(i).map(Some).map_err(|_| {
                            SqlServerError::type_mismatch($name, format!("{} {i}", value.kind()))
                        }),
                        None => mismatch($name, value),
                    }
                }
            }
        )*
    };
}

impl_from_row_value_int!(u8 => "tinyint", i16 => "smallint", i32 => "int", i64 => "bigint");

impl FromRowValue for bool {
    const TYPE_NAME: &'static str = "bit";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        value.as_bool().map_or_else(|| mismatch("bit", value), |b| Ok(Some(b)))
    }
}

impl FromRowValue for f64 {
    const TYPE_NAME: &'static str = "float";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        value.as_float().map_or_else(|| mismatch("float", value), |f| Ok(Some(f)))
    }
}

impl FromRowValue for f32 {
    const TYPE_NAME: &'static str = "real";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        match value {
            RowValues::Null => Ok(None),
            RowValues::Real(f) => Ok(Some(*f)),
            other => mismatch("real", other),
        }
    }
}

impl FromRowValue for Decimal {
    const TYPE_NAME: &'static str = "decimal";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        value.as_decimal().map_or_else(|| mismatch("decimal", value), |d| Ok(Some(d)))
    }
}

impl FromRowValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "datetime";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        value.as_timestamp().map_or_else(|| mismatch("datetime", value), |dt| Ok(Some(dt)))
    }
}

impl FromRowValue for NaiveDate {
    const TYPE_NAME: &'static str = "date";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        match value {
            RowValues::Null => Ok(None),
            RowValues::Date(d) => Ok(Some(*d)),
            RowValues::Timestamp(dt) => Ok(Some(dt.date())),
            other => mismatch("date", other),
        }
    }
}

impl FromRowValue for String {
    const TYPE_NAME: &'static str = "nvarchar";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        match value {
            RowValues::Null => Ok(None),
            RowValues::Text(s) | RowValues::Xml(s) => Ok(Some(s.clone())),
            other => mismatch("nvarchar", other),
        }
    }
}

impl FromRowValue for Vec<u8> {
    const TYPE_NAME: &'static str = "varbinary";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        match value {
            RowValues::Null => Ok(None),
            RowValues::Blob(bytes) => Ok(Some(bytes.clone())),
            other => mismatch("varbinary", other),
        }
    }
}

impl FromRowValue for Uuid {
    const TYPE_NAME: &'static str = "uniqueidentifier";

    fn from_row_value(value: &RowValues) -> Result<Option<Self>> {
        match value {
            RowValues::Null => Ok(None),
            RowValues::Guid(g) => Ok(Some(*g)),
            other => mismatch("uniqueidentifier", other),
        }
    }
}

/// Numeric (fixed width) parameter types, used to declare typed NULL inputs
/// and typed outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    Boolean,
    Byte,
    DateTime,
    Double,
    Int16,
    Int32,
    Int64,
    Single,
}

/// Direction of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterDirection {
    /// Value flows to the server only.
    Input,
    /// Value is produced by the server.
    Output,
    /// Value flows to the server and is read back.
    InputOutput,
    /// Return code of a stored procedure.
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the value is read back after execution.
    #[must_use]
    pub fn is_output(self) -> bool {
        !matches!(self, Self::Input)
    }

    /// Whether a value is bound on execution.
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::InputOutput)
    }
}

/// How a data object opens and keeps its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionMode {
    /// Open per operation, closed right after it.
    #[default]
    Normal,
    /// Open once, transaction started on open, kept until commit/rollback.
    Transactional,
    /// Open once and kept, results buffered so nested commands can run while
    /// reading (multiple active result sets).
    Mars,
}

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    /// Ad-hoc T-SQL.
    #[default]
    Text,
    /// Name of a stored procedure.
    StoredProcedure,
}
