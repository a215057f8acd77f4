use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{Result, SqlServerError};
use crate::types::{NumericType, ParameterDirection, RowValues};

/// Largest declared length of a non-`max` `nvarchar`/`nchar`.
pub const MAX_STRING_LENGTH: usize = 4000;
/// Highest `decimal` precision supported by SQL Server.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

static PARAMETER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_#][A-Za-z0-9_@$#]*$")
        .unwrap_or_else(|e| panic!("invalid parameter name regex: {e}"))
});

// @P1..@Pn are the driver's positional placeholders
static RESERVED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[Pp][0-9]+$").unwrap_or_else(|e| panic!("invalid reserved name regex: {e}"))
});

static OBJECT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    let part = r"(\[[^\]]+\]|[A-Za-z_#][A-Za-z0-9_@$#]*)";
    Regex::new(&format!(r"^{part}(\.{part}){{0,3}}$"))
        .unwrap_or_else(|e| panic!("invalid object name regex: {e}"))
});

/// Server-side type of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlDbType {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Decimal { precision: u8, scale: u8 },
    DateTime,
    /// Variable length; sizes above [`MAX_STRING_LENGTH`] declare `nvarchar(max)`.
    NVarChar(usize),
    /// Fixed length, at most [`MAX_STRING_LENGTH`].
    NChar(usize),
    VarBinary,
    Xml,
    /// Table-valued parameter of the named user-defined table type.
    Structured(String),
}

impl SqlDbType {
    /// `nvarchar(max)`
    #[must_use]
    pub fn nvarchar_max() -> Self {
        Self::NVarChar(usize::MAX)
    }

    /// T-SQL text used to declare a variable of this type.
    #[must_use]
    pub fn declaration(&self) -> String {
        match self {
            SqlDbType::Bit => "bit".into(),
            SqlDbType::TinyInt => "tinyint".into(),
            SqlDbType::SmallInt => "smallint".into(),
            SqlDbType::Int => "int".into(),
            SqlDbType::BigInt => "bigint".into(),
            SqlDbType::Real => "real".into(),
            SqlDbType::Float => "float".into(),
            SqlDbType::Decimal { precision, scale } => format!("decimal({precision},{scale})"),
            SqlDbType::DateTime => "datetime".into(),
            SqlDbType::NVarChar(size) if *size > MAX_STRING_LENGTH => "nvarchar(max)".into(),
            SqlDbType::NVarChar(size) => format!("nvarchar({size})"),
            SqlDbType::NChar(size) => format!("nchar({size})"),
            SqlDbType::VarBinary => "varbinary(max)".into(),
            SqlDbType::Xml => "xml".into(),
            SqlDbType::Structured(type_name) => type_name.clone(),
        }
    }

    /// Check sizes, precision and type names.
    ///
    /// # Errors
    /// Returns `SqlServerError::ParameterError` describing the invalid part.
    pub fn validate(&self) -> Result<()> {
        match self {
            SqlDbType::Decimal { precision, scale } => {
                if *precision == 0 || *precision > MAX_DECIMAL_PRECISION {
                    return Err(SqlServerError::ParameterError(format!(
                        "Decimal precision {precision} is outside 1..={MAX_DECIMAL_PRECISION}"
                    )));
                }
                if scale > precision {
                    return Err(SqlServerError::ParameterError(format!(
                        "Decimal scale {scale} exceeds precision {precision}"
                    )));
                }
            }
            SqlDbType::NVarChar(0) | SqlDbType::NChar(0) => {
                return Err(SqlServerError::ParameterError(
                    "String size must be at least 1".into(),
                ));
            }
            SqlDbType::NChar(size) if *size > MAX_STRING_LENGTH => {
                return Err(SqlServerError::ParameterError(format!(
                    "Fixed-length string size {size} exceeds {MAX_STRING_LENGTH}"
                )));
            }
            SqlDbType::Structured(type_name) => validate_object_name(type_name)?,
            _ => {}
        }
        Ok(())
    }

    /// Convert a value into this type.
    ///
    /// # Errors
    /// Returns `SqlServerError::TypeMismatch` when the value does not fit.
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(&self, value: RowValues) -> Result<RowValues> {
        if value.is_null() {
            return Ok(RowValues::Null);
        }

        let expected = self.declaration();
        let fail = |value: &RowValues| -> Result<RowValues> {
            Err(SqlServerError::type_mismatch(&expected, value.kind()))
        };

        match self {
            SqlDbType::Bit => match value.as_bool() {
                Some(b) => Ok(RowValues::Bool(b)),
                None => fail(&value),
            },
            SqlDbType::TinyInt => narrow(&value, &expected, RowValues::TinyInt),
            SqlDbType::SmallInt => narrow(&value, &expected, RowValues::SmallInt),
            SqlDbType::Int => narrow(&value, &expected, RowValues::Int),
            SqlDbType::BigInt => narrow(&value, &expected, RowValues::BigInt),
            SqlDbType::Real => match value {
                RowValues::Real(_) => Ok(value),
                ref v => match v.as_int() {
                    Some(i) => Ok(RowValues::Real(i as f32)),
                    None => fail(v),
                },
            },
            SqlDbType::Float => match value {
                RowValues::Float(_) => Ok(value),
                RowValues::Real(f) => Ok(RowValues::Float(f64::from(f))),
                ref v => match v.as_int() {
                    Some(i) => Ok(RowValues::Float(i as f64)),
                    None => fail(v),
                },
            },
            SqlDbType::Decimal { .. } => match value.as_decimal() {
                Some(d) => Ok(RowValues::Decimal(d)),
                None => fail(&value),
            },
            SqlDbType::DateTime => match value.as_timestamp() {
                Some(ts) => Ok(RowValues::Timestamp(ts)),
                None => fail(&value),
            },
            SqlDbType::NVarChar(_) | SqlDbType::NChar(_) => match value {
                RowValues::Text(s) | RowValues::Xml(s) => Ok(RowValues::Text(s)),
                ref v => fail(v),
            },
            SqlDbType::Xml => match value {
                RowValues::Text(s) | RowValues::Xml(s) => Ok(RowValues::Xml(s)),
                ref v => fail(v),
            },
            SqlDbType::VarBinary => match value {
                RowValues::Blob(_) => Ok(value),
                ref v => fail(v),
            },
            SqlDbType::Structured(_) => fail(&value),
        }
    }
}

impl fmt::Display for SqlDbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.declaration())
    }
}

fn narrow<T: TryFrom<i64>>(
    value: &RowValues,
    expected: &str,
    wrap: impl FnOnce(T) -> RowValues,
) -> Result<RowValues> {
    let Some(i) = value.as_int() else {
        return Err(SqlServerError::type_mismatch(expected, value.kind()));
    };
    T::try_from(i)
        .map(wrap)
        .map_err(|_| SqlServerError::type_mismatch(expected, format!("{} {i}", value.kind())))
}

impl From<NumericType> for SqlDbType {
    fn from(value: NumericType) -> Self {
        match value {
            NumericType::Boolean => SqlDbType::Bit,
            NumericType::Byte => SqlDbType::TinyInt,
            NumericType::DateTime => SqlDbType::DateTime,
            NumericType::Double => SqlDbType::Float,
            NumericType::Int16 => SqlDbType::SmallInt,
            NumericType::Int32 => SqlDbType::Int,
            NumericType::Int64 => SqlDbType::BigInt,
            NumericType::Single => SqlDbType::Real,
        }
    }
}

/// Values that can be bound as parameters, paired with the type they
/// declare by default.
///
/// `None` and [`NumericType`] produce typed NULLs. Empty strings and empty
/// byte arrays are stored as NULL.
pub trait IntoParameter {
    fn into_parameter(self) -> (SqlDbType, RowValues);
}

macro_rules! impl_into_parameter {
    ($($ty:ty => $db:expr, $variant:ident);* $(;)?) => {
        $(
            impl IntoParameter for $ty {
                fn into_parameter(self) -> (SqlDbType, RowValues) {
                    ($db, RowValues::$variant(self))
                }
            }

            impl IntoParameter for Option<$ty> {
                fn into_parameter(self) -> (SqlDbType, RowValues) {
                    ($db, self.map_or(RowValues::Null, RowValues::$variant))
                }
            }
        )*
    };
}

impl_into_parameter! {
    bool => SqlDbType::Bit, Bool;
    u8 => SqlDbType::TinyInt, TinyInt;
    i16 => SqlDbType::SmallInt, SmallInt;
    i32 => SqlDbType::Int, Int;
    i64 => SqlDbType::BigInt, BigInt;
    f32 => SqlDbType::Real, Real;
    f64 => SqlDbType::Float, Float;
    NaiveDateTime => SqlDbType::DateTime, Timestamp;
}

impl IntoParameter for NaiveDate {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        (SqlDbType::DateTime, RowValues::Timestamp(self.and_time(NaiveTime::MIN)))
    }
}

impl IntoParameter for Decimal {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        let scale = u8::try_from(self.scale()).unwrap_or(MAX_DECIMAL_PRECISION);
        (
            SqlDbType::Decimal {
                precision: MAX_DECIMAL_PRECISION,
                scale,
            },
            RowValues::Decimal(self),
        )
    }
}

impl IntoParameter for Option<NaiveDate> {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        match self {
            Some(date) => date.into_parameter(),
            None => (SqlDbType::DateTime, RowValues::Null),
        }
    }
}

impl IntoParameter for Option<Decimal> {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        match self {
            Some(value) => value.into_parameter(),
            None => (
                SqlDbType::Decimal {
                    precision: MAX_DECIMAL_PRECISION,
                    scale: 0,
                },
                RowValues::Null,
            ),
        }
    }
}

fn text_value(value: String) -> RowValues {
    if value.is_empty() {
        RowValues::Null
    } else {
        RowValues::Text(value)
    }
}

fn blob_value(value: Vec<u8>) -> RowValues {
    if value.is_empty() {
        RowValues::Null
    } else {
        RowValues::Blob(value)
    }
}

impl IntoParameter for String {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        (SqlDbType::nvarchar_max(), text_value(self))
    }
}

impl IntoParameter for &str {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        self.to_owned().into_parameter()
    }
}

impl IntoParameter for &String {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        self.as_str().into_parameter()
    }
}

impl IntoParameter for Option<String> {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        (SqlDbType::nvarchar_max(), self.map_or(RowValues::Null, text_value))
    }
}

impl IntoParameter for Option<&str> {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        self.map(str::to_owned).into_parameter()
    }
}

impl IntoParameter for Vec<u8> {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        (SqlDbType::VarBinary, blob_value(self))
    }
}

impl IntoParameter for &[u8] {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        self.to_vec().into_parameter()
    }
}

impl IntoParameter for Option<Vec<u8>> {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        (SqlDbType::VarBinary, self.map_or(RowValues::Null, blob_value))
    }
}

impl IntoParameter for NumericType {
    fn into_parameter(self) -> (SqlDbType, RowValues) {
        (self.into(), RowValues::Null)
    }
}

/// Strip a leading `@` and check the name is a plain identifier that does
/// not collide with the driver's positional placeholders.
///
/// # Errors
/// Returns `SqlServerError::ParameterError` for empty, malformed or reserved names.
pub fn normalize_parameter_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let bare = trimmed.strip_prefix('@').unwrap_or(trimmed);

    if bare.is_empty() {
        return Err(SqlServerError::ParameterError(
            "Parameter name must not be empty".into(),
        ));
    }
    if !PARAMETER_NAME.is_match(bare) {
        return Err(SqlServerError::ParameterError(format!(
            "Invalid parameter name '{name}'"
        )));
    }
    if RESERVED_NAME.is_match(bare) {
        return Err(SqlServerError::ParameterError(format!(
            "Parameter name '{name}' is reserved for positional placeholders"
        )));
    }
    Ok(bare.to_string())
}

/// Validate a (possibly schema-qualified, possibly bracketed) object name
/// such as a stored procedure or user-defined table type.
///
/// # Errors
/// Returns `SqlServerError::ParameterError` if the name is not a plain identifier path.
pub fn validate_object_name(name: &str) -> Result<()> {
    if OBJECT_NAME.is_match(name) {
        Ok(())
    } else {
        Err(SqlServerError::ParameterError(format!(
            "Invalid object name '{name}'"
        )))
    }
}

/// Rows of a table-valued parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    rows: Vec<Vec<RowValues>>,
}

impl DataTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; every row must have the width of the first one.
    ///
    /// # Errors
    /// Returns `SqlServerError::ParameterError` for empty or ragged rows.
    pub fn add_row(&mut self, row: Vec<RowValues>) -> Result<&mut Self> {
        if row.is_empty() {
            return Err(SqlServerError::ParameterError(
                "Table rows must have at least one column".into(),
            ));
        }
        if let Some(width) = self.column_count() {
            if width != row.len() {
                return Err(SqlServerError::ParameterError(format!(
                    "Table row has {} columns, expected {width}",
                    row.len()
                )));
            }
        }
        self.rows.push(row);
        Ok(self)
    }

    /// Build a table from rows.
    ///
    /// # Errors
    /// Same as [`DataTable::add_row`].
    pub fn from_rows(rows: impl IntoIterator<Item = Vec<RowValues>>) -> Result<Self> {
        let mut table = Self::new();
        for row in rows {
            table.add_row(row)?;
        }
        Ok(table)
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<RowValues>] {
        &self.rows
    }

    /// Width of the rows, `None` while empty.
    #[must_use]
    pub fn column_count(&self) -> Option<usize> {
        self.rows.first().map(Vec::len)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One named command parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlParameter {
    name: String,
    db_type: SqlDbType,
    direction: ParameterDirection,
    value: RowValues,
    table: Option<DataTable>,
}

impl SqlParameter {
    /// Create a validated parameter; input values are coerced to `db_type`.
    ///
    /// # Errors
    /// Returns `SqlServerError::ParameterError` for bad names or types and
    /// `SqlServerError::TypeMismatch` when the value does not fit the type.
    pub fn new(
        name: &str,
        db_type: SqlDbType,
        direction: ParameterDirection,
        value: RowValues,
    ) -> Result<Self> {
        let name = normalize_parameter_name(name)?;
        db_type.validate()?;
        if matches!(db_type, SqlDbType::Structured(_)) {
            return Err(SqlServerError::ParameterError(format!(
                "Table-valued parameter '{name}' needs a table"
            )));
        }
        let value = if direction.is_input() {
            db_type.coerce(value)?
        } else {
            RowValues::Null
        };
        Ok(Self {
            name,
            db_type,
            direction,
            value,
            table: None,
        })
    }

    /// Create a table-valued input parameter.
    ///
    /// # Errors
    /// Returns `SqlServerError::ParameterError` for bad parameter or type names.
    pub fn table(name: &str, type_name: &str, table: DataTable) -> Result<Self> {
        let name = normalize_parameter_name(name)?;
        let db_type = SqlDbType::Structured(type_name.to_string());
        db_type.validate()?;
        Ok(Self {
            name,
            db_type,
            direction: ParameterDirection::Input,
            value: RowValues::Null,
            table: Some(table),
        })
    }

    /// Name without the leading `@`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn db_type(&self) -> &SqlDbType {
        &self.db_type
    }

    #[must_use]
    pub fn direction(&self) -> ParameterDirection {
        self.direction
    }

    #[must_use]
    pub fn value(&self) -> &RowValues {
        &self.value
    }

    #[must_use]
    pub fn data_table(&self) -> Option<&DataTable> {
        self.table.as_ref()
    }

    /// Replace the value, coerced to the declared type.
    ///
    /// # Errors
    /// Returns `SqlServerError::TypeMismatch` when the value does not fit.
    pub fn set_value(&mut self, value: RowValues) -> Result<()> {
        self.value = self.db_type.coerce(value)?;
        Ok(())
    }

    pub(crate) fn set_output(&mut self, value: RowValues) {
        self.value = value;
    }
}

/// Ordered parameters with case-insensitive unique names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterCollection {
    params: Vec<SqlParameter>,
}

impl ParameterCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    ///
    /// # Errors
    /// Returns `SqlServerError::ParameterError` if the name is already used.
    pub fn add(&mut self, param: SqlParameter) -> Result<()> {
        if self.contains(param.name()) {
            return Err(SqlServerError::ParameterError(format!(
                "Parameter '{}' already exists",
                param.name()
            )));
        }
        if param.direction() == ParameterDirection::ReturnValue
            && self.return_value().is_some()
        {
            return Err(SqlServerError::ParameterError(
                "Only one return value parameter is allowed".into(),
            ));
        }
        self.params.push(param);
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        let bare = name.trim().strip_prefix('@').unwrap_or(name.trim());
        self.params
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(bare))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlParameter> {
        self.position(name).map(|i| &self.params[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SqlParameter> {
        self.position(name).map(|i| &mut self.params[i])
    }

    /// The stored procedure return value parameter, if any.
    #[must_use]
    pub fn return_value(&self) -> Option<&SqlParameter> {
        self.params
            .iter()
            .find(|p| p.direction == ParameterDirection::ReturnValue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SqlParameter> {
        self.params.iter()
    }

    /// Parameters whose value is read back after execution.
    pub fn outputs(&self) -> impl Iterator<Item = &SqlParameter> {
        self.params.iter().filter(|p| p.direction.is_output())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_types_map_to_db_types() {
        assert_eq!(SqlDbType::from(NumericType::Boolean), SqlDbType::Bit);
        assert_eq!(SqlDbType::from(NumericType::Byte), SqlDbType::TinyInt);
        assert_eq!(SqlDbType::from(NumericType::DateTime), SqlDbType::DateTime);
        assert_eq!(SqlDbType::from(NumericType::Double), SqlDbType::Float);
        assert_eq!(SqlDbType::from(NumericType::Int16), SqlDbType::SmallInt);
        assert_eq!(SqlDbType::from(NumericType::Int32), SqlDbType::Int);
        assert_eq!(SqlDbType::from(NumericType::Int64), SqlDbType::BigInt);
        assert_eq!(SqlDbType::from(NumericType::Single), SqlDbType::Real);
    }

    #[test]
    fn declarations() {
        assert_eq!(SqlDbType::NVarChar(50).declaration(), "nvarchar(50)");
        assert_eq!(SqlDbType::NVarChar(4001).declaration(), "nvarchar(max)");
        assert_eq!(SqlDbType::nvarchar_max().declaration(), "nvarchar(max)");
        assert_eq!(SqlDbType::NChar(3).declaration(), "nchar(3)");
        assert_eq!(
            SqlDbType::Decimal { precision: 19, scale: 4 }.declaration(),
            "decimal(19,4)"
        );
        assert_eq!(SqlDbType::VarBinary.declaration(), "varbinary(max)");
        assert_eq!(
            SqlDbType::Structured("dbo.IdList".into()).declaration(),
            "dbo.IdList"
        );
    }

    #[test]
    fn validation_of_sizes_and_precision() {
        assert!(SqlDbType::Decimal { precision: 0, scale: 0 }.validate().is_err());
        assert!(SqlDbType::Decimal { precision: 39, scale: 0 }.validate().is_err());
        assert!(SqlDbType::Decimal { precision: 5, scale: 6 }.validate().is_err());
        assert!(SqlDbType::Decimal { precision: 38, scale: 38 }.validate().is_ok());
        assert!(SqlDbType::NVarChar(0).validate().is_err());
        assert!(SqlDbType::NChar(4001).validate().is_err());
        assert!(SqlDbType::NVarChar(8000).validate().is_ok());
        assert!(SqlDbType::Structured("bad name; drop".into()).validate().is_err());
    }

    #[test]
    fn integers_narrow_with_range_checks() {
        assert_eq!(SqlDbType::TinyInt.coerce(RowValues::Int(255)).unwrap(), RowValues::TinyInt(255));
        assert!(SqlDbType::TinyInt.coerce(RowValues::Int(256)).is_err());
        assert!(SqlDbType::TinyInt.coerce(RowValues::Int(-1)).is_err());
        assert_eq!(SqlDbType::SmallInt.coerce(RowValues::Int(42)).unwrap(), RowValues::SmallInt(42));
        assert!(SqlDbType::Int.coerce(RowValues::BigInt(i64::MAX)).is_err());
        assert_eq!(SqlDbType::BigInt.coerce(RowValues::TinyInt(1)).unwrap(), RowValues::BigInt(1));
    }

    #[test]
    fn widening_conversions() {
        assert_eq!(SqlDbType::Float.coerce(RowValues::Real(0.5)).unwrap(), RowValues::Float(0.5));
        assert_eq!(SqlDbType::Float.coerce(RowValues::Int(3)).unwrap(), RowValues::Float(3.0));
        assert_eq!(SqlDbType::Real.coerce(RowValues::SmallInt(2)).unwrap(), RowValues::Real(2.0));
        assert!(SqlDbType::Real.coerce(RowValues::Float(1.0)).is_err());
        assert_eq!(
            SqlDbType::Decimal { precision: 10, scale: 2 }
                .coerce(RowValues::Int(7))
                .unwrap(),
            RowValues::Decimal(Decimal::from(7))
        );

        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(
            SqlDbType::DateTime.coerce(RowValues::Date(date)).unwrap(),
            RowValues::Timestamp(date.and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn bit_and_strings() {
        assert_eq!(SqlDbType::Bit.coerce(RowValues::Int(1)).unwrap(), RowValues::Bool(true));
        assert!(SqlDbType::Bit.coerce(RowValues::Int(5)).is_err());
        assert_eq!(
            SqlDbType::Xml.coerce(RowValues::Text("<a/>".into())).unwrap(),
            RowValues::Xml("<a/>".into())
        );
        assert_eq!(
            SqlDbType::NVarChar(10).coerce(RowValues::Xml("<a/>".into())).unwrap(),
            RowValues::Text("<a/>".into())
        );
        assert!(SqlDbType::NVarChar(10).coerce(RowValues::Int(1)).is_err());
        assert!(SqlDbType::VarBinary.coerce(RowValues::Text("x".into())).is_err());
    }

    #[test]
    fn null_always_coerces() {
        for ty in [SqlDbType::Bit, SqlDbType::Xml, SqlDbType::VarBinary, SqlDbType::DateTime] {
            assert_eq!(ty.coerce(RowValues::Null).unwrap(), RowValues::Null);
        }
    }

    #[test]
    fn into_parameter_dispatch() {
        assert_eq!(42i32.into_parameter(), (SqlDbType::Int, RowValues::Int(42)));
        assert_eq!(7u8.into_parameter(), (SqlDbType::TinyInt, RowValues::TinyInt(7)));
        assert_eq!(None::<i16>.into_parameter(), (SqlDbType::SmallInt, RowValues::Null));
        assert_eq!(
            NumericType::Double.into_parameter(),
            (SqlDbType::Float, RowValues::Null)
        );
        assert_eq!("".into_parameter().1, RowValues::Null);
        assert_eq!(Vec::<u8>::new().into_parameter().1, RowValues::Null);
        assert_eq!(
            Some("Sales").into_parameter(),
            (SqlDbType::nvarchar_max(), RowValues::Text("Sales".into()))
        );
        assert_eq!(
            [1u8, 2].as_slice().into_parameter(),
            (SqlDbType::VarBinary, RowValues::Blob(vec![1, 2]))
        );
        let (ty, _) = Decimal::new(12345, 2).into_parameter();
        assert_eq!(ty, SqlDbType::Decimal { precision: 38, scale: 2 });
        assert_eq!(
            Some(Decimal::new(12345, 2)).into_parameter(),
            Decimal::new(12345, 2).into_parameter()
        );
        assert_eq!(
            None::<Decimal>.into_parameter(),
            (SqlDbType::Decimal { precision: 38, scale: 0 }, RowValues::Null)
        );
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Some(day).into_parameter(), day.into_parameter());
        assert_eq!(None::<NaiveDate>.into_parameter(), (SqlDbType::DateTime, RowValues::Null));
    }

    #[test]
    fn parameter_names() {
        assert_eq!(normalize_parameter_name("@Name").unwrap(), "Name");
        assert_eq!(normalize_parameter_name("GroupName").unwrap(), "GroupName");
        assert!(normalize_parameter_name("").is_err());
        assert!(normalize_parameter_name("@").is_err());
        assert!(normalize_parameter_name("1abc").is_err());
        assert!(normalize_parameter_name("a b").is_err());
        assert!(normalize_parameter_name("x;DROP").is_err());
        assert!(normalize_parameter_name("P1").is_err());
        assert!(normalize_parameter_name("@p12").is_err());
        assert!(normalize_parameter_name("Param1").is_ok());
    }

    #[test]
    fn object_names() {
        assert!(validate_object_name("uspGetManagerEmployees").is_ok());
        assert!(validate_object_name("dbo.uspGetManagerEmployees").is_ok());
        assert!(validate_object_name("[HumanResources].[Update Employee]").is_ok());
        assert!(validate_object_name("db.dbo.proc").is_ok());
        assert!(validate_object_name("proc; DROP TABLE x").is_err());
        assert!(validate_object_name("").is_err());
    }

    #[test]
    fn output_parameters_start_null() {
        let p = SqlParameter::new(
            "@Name",
            SqlDbType::NVarChar(50),
            ParameterDirection::Output,
            RowValues::Text("ignored".into()),
        )
        .unwrap();
        assert_eq!(p.name(), "Name");
        assert!(p.value().is_null());
    }

    #[test]
    fn structured_parameters_need_a_table() {
        let err = SqlParameter::new(
            "Ids",
            SqlDbType::Structured("dbo.IdList".into()),
            ParameterDirection::Input,
            RowValues::Null,
        );
        assert!(err.is_err());
        let table = DataTable::from_rows(vec![vec![RowValues::Int(1)]]).unwrap();
        let p = SqlParameter::table("Ids", "dbo.IdList", table).unwrap();
        assert_eq!(p.data_table().map(DataTable::len), Some(1));
    }

    #[test]
    fn data_table_rejects_ragged_rows() {
        let mut table = DataTable::new();
        table.add_row(vec![RowValues::Int(1), RowValues::Null]).unwrap();
        assert!(table.add_row(vec![RowValues::Int(2)]).is_err());
        assert!(table.add_row(Vec::new()).is_err());
        assert_eq!(table.column_count(), Some(2));
    }

    #[test]
    fn collection_is_case_insensitive_and_unique() {
        let mut params = ParameterCollection::new();
        let p = |name: &str| {
            SqlParameter::new(name, SqlDbType::Int, ParameterDirection::Input, RowValues::Int(1))
                .unwrap()
        };
        params.add(p("DepartmentID")).unwrap();
        assert!(params.add(p("departmentid")).is_err());
        assert!(params.get("@DEPARTMENTID").is_some());

        params
            .add(
                SqlParameter::new("Ret", SqlDbType::Int, ParameterDirection::ReturnValue, RowValues::Null)
                    .unwrap(),
            )
            .unwrap();
        let second = SqlParameter::new(
            "Ret2",
            SqlDbType::Int,
            ParameterDirection::ReturnValue,
            RowValues::Null,
        )
        .unwrap();
        assert!(params.add(second).is_err());
        assert_eq!(params.outputs().count(), 1);
        assert_eq!(params.len(), 2);
    }
}
