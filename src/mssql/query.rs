use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::{ColumnData, FromSql, Query};

use super::command::SqlCommand;
use super::params::{SqlDbType, SqlParameter};
use crate::error::{Result, SqlServerError};
use crate::results::ResultSet;
use crate::types::{CommandType, ParameterDirection, RowValues};

/// Most values a single request may bind.
pub const MAX_BOUND_VALUES: usize = 2100;
/// Most rows a single `INSERT ... VALUES` may carry.
pub const MAX_TABLE_ROWS_PER_INSERT: usize = 1000;
/// Column of the trailing output result set holding the body's row count.
pub const ROWCOUNT_COLUMN: &str = "@@ROWCOUNT";

/// A value bound to one positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// Value of a named parameter; NULL binds as a NULL of the declared type.
    Parameter { db_type: SqlDbType, value: RowValues },
    /// Non-NULL cell of a table-valued parameter.
    Cell(RowValues),
}

/// A command compiled into one parameterized batch.
///
/// Named parameters become variables declared in a prologue and assigned from
/// the positional placeholders the driver binds. Output values come back in a
/// trailing result set that callers never see.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    sql: String,
    values: Vec<BoundValue>,
    outputs: Vec<String>,
}

impl Batch {
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn values(&self) -> &[BoundValue] {
        &self.values
    }

    /// Names of the parameters read back, in epilogue column order.
    #[must_use]
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Whether the last result set carries output values.
    #[must_use]
    pub fn has_epilogue(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Driver query with every value bound.
    #[must_use]
    pub fn to_query(&self) -> Query<'static> {
        let mut query = Query::new(self.sql.clone());
        for value in &self.values {
            match value {
                BoundValue::Parameter {
                    db_type,
                    value: RowValues::Null,
                } => bind_null(&mut query, db_type),
                BoundValue::Parameter { value, .. } | BoundValue::Cell(value) => {
                    bind_value(&mut query, value);
                }
            }
        }
        query
    }
}

/// Compile a command into a batch.
///
/// # Errors
/// Returns the command's deferred error, `SqlServerError::CommandError` for a
/// return value on a text command, or `SqlServerError::TooManyParameters` when
/// more than [`MAX_BOUND_VALUES`] values would be bound.
pub fn compose_batch(command: &SqlCommand) -> Result<Batch> {
    command.check()?;

    let params = command.parameters();
    if command.command_type() == CommandType::Text && params.return_value().is_some() {
        return Err(SqlServerError::CommandError(
            "Return value parameters require a stored procedure".into(),
        ));
    }

    let mut sql = String::new();
    let mut values = Vec::new();

    // table inserts would otherwise add their own row counts
    let fills_tables = params
        .iter()
        .any(|p| p.data_table().is_some_and(|t| !t.is_empty()));
    if fills_tables {
        sql.push_str("SET NOCOUNT ON;\n");
    }
    for param in params.iter() {
        declare(&mut sql, &mut values, param);
    }
    if fills_tables {
        sql.push_str("SET NOCOUNT OFF;\n");
    }

    let outputs: Vec<String> = params.outputs().map(|p| p.name().to_string()).collect();

    match command.command_type() {
        CommandType::Text => {
            sql.push_str(command.text());
            sql.push('\n');
            if !outputs.is_empty() && !command.text().trim_end().ends_with(';') {
                sql.push(';');
            }
        }
        CommandType::StoredProcedure => {
            sql.push_str(&exec_statement(command));
            sql.push('\n');
        }
    }

    if !outputs.is_empty() {
        let columns: Vec<String> = outputs.iter().map(|n| format!("@{n} AS [{n}]")).collect();
        sql.push_str(&format!(
            "SELECT @@ROWCOUNT AS [{ROWCOUNT_COLUMN}], {};",
            columns.join(", ")
        ));
    }

    if values.len() > MAX_BOUND_VALUES {
        return Err(SqlServerError::TooManyParameters {
            count: values.len(),
            limit: MAX_BOUND_VALUES,
        });
    }

    Ok(Batch {
        sql,
        values,
        outputs,
    })
}

fn declare(sql: &mut String, values: &mut Vec<BoundValue>, param: &SqlParameter) {
    let name = param.name();
    let decl = param.db_type().declaration();

    if let Some(table) = param.data_table() {
        sql.push_str(&format!("DECLARE @{name} {decl};\n"));
        for chunk in table.rows().chunks(MAX_TABLE_ROWS_PER_INSERT) {
            let rows: Vec<String> = chunk
                .iter()
                .map(|row| {
                    let cells: Vec<String> = row
                        .iter()
                        .map(|cell| {
                            if cell.is_null() {
                                "NULL".to_string()
                            } else {
                                values.push(BoundValue::Cell(cell.clone()));
                                format!("@P{}", values.len())
                            }
                        })
                        .collect();
                    format!("({})", cells.join(", "))
                })
                .collect();
            sql.push_str(&format!("INSERT INTO @{name} VALUES {};\n", rows.join(", ")));
        }
    } else if param.direction().is_input() {
        values.push(BoundValue::Parameter {
            db_type: param.db_type().clone(),
            value: param.value().clone(),
        });
        sql.push_str(&format!("DECLARE @{name} {decl} = @P{};\n", values.len()));
    } else {
        sql.push_str(&format!("DECLARE @{name} {decl};\n"));
    }
}

fn exec_statement(command: &SqlCommand) -> String {
    let params = command.parameters();
    let mut exec = String::from("EXEC ");
    if let Some(ret) = params.return_value() {
        exec.push_str(&format!("@{} = ", ret.name()));
    }
    exec.push_str(command.text());

    let args: Vec<String> = params
        .iter()
        .filter(|p| p.direction() != ParameterDirection::ReturnValue)
        .map(|p| {
            let name = p.name();
            if p.direction().is_output() {
                format!("@{name} = @{name} OUTPUT")
            } else {
                format!("@{name} = @{name}")
            }
        })
        .collect();
    if !args.is_empty() {
        exec.push(' ');
        exec.push_str(&args.join(", "));
    }
    exec.push(';');
    exec
}

/// Values read back from the trailing output result set.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OutputValues {
    pub rows_affected: usize,
    pub values: Vec<(String, RowValues)>,
}

/// Remove the output result set from `sets` and decode it.
pub(crate) fn take_outputs(
    batch: &Batch,
    sets: &mut Vec<ResultSet>,
) -> Result<Option<OutputValues>> {
    if !batch.has_epilogue() {
        return Ok(None);
    }

    let missing = || SqlServerError::CommandError("Output values were not returned".into());
    let last = sets.pop().ok_or_else(missing)?;
    let row = last.results.first().ok_or_else(missing)?;

    let rows_affected = row
        .get_by_index(0)
        .and_then(RowValues::as_int)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    let values = batch
        .outputs
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = row.get_by_index(i + 1).cloned().unwrap_or(RowValues::Null);
            (name.clone(), value)
        })
        .collect();

    Ok(Some(OutputValues {
        rows_affected,
        values,
    }))
}

/// Bind a non-NULL value by its variant.
pub(crate) fn bind_value(query: &mut Query<'static>, value: &RowValues) {
    match value {
        RowValues::Bool(b) => query.bind(*b),
        RowValues::TinyInt(v) => query.bind(*v),
        RowValues::SmallInt(v) => query.bind(*v),
        RowValues::Int(v) => query.bind(*v),
        RowValues::BigInt(v) => query.bind(*v),
        RowValues::Real(v) => query.bind(*v),
        RowValues::Float(v) => query.bind(*v),
        RowValues::Decimal(d) => query.bind(*d),
        RowValues::Timestamp(dt) => query.bind(*dt),
        RowValues::Date(d) => query.bind(*d),
        RowValues::Time(t) => query.bind(*t),
        // converted implicitly from its ISO 8601 text
        RowValues::DateTimeOffset(dt) => query.bind(dt.to_rfc3339()),
        RowValues::Text(s) | RowValues::Xml(s) => query.bind(s.clone()),
        RowValues::Blob(bytes) => query.bind(bytes.clone()),
        RowValues::Guid(g) => query.bind(*g),
        RowValues::Null => query.bind(Option::<String>::None),
    }
}

/// Bind a NULL typed after the declared parameter type.
pub(crate) fn bind_null(query: &mut Query<'static>, db_type: &SqlDbType) {
    match db_type {
        SqlDbType::Bit => query.bind(Option::<bool>::None),
        SqlDbType::TinyInt => query.bind(Option::<u8>::None),
        SqlDbType::SmallInt => query.bind(Option::<i16>::None),
        SqlDbType::Int => query.bind(Option::<i32>::None),
        SqlDbType::BigInt => query.bind(Option::<i64>::None),
        SqlDbType::Real => query.bind(Option::<f32>::None),
        SqlDbType::Float => query.bind(Option::<f64>::None),
        SqlDbType::Decimal { .. } => query.bind(Option::<Decimal>::None),
        SqlDbType::DateTime => query.bind(Option::<NaiveDateTime>::None),
        SqlDbType::VarBinary => query.bind(Option::<Vec<u8>>::None),
        SqlDbType::NVarChar(_) | SqlDbType::NChar(_) | SqlDbType::Xml | SqlDbType::Structured(_) => {
            query.bind(Option::<String>::None);
        }
    }
}

/// Map one driver column value to a [`RowValues`].
///
/// # Errors
/// Returns `SqlServerError::MssqlError` if a temporal or numeric value cannot
/// be decoded, or `SqlServerError::TypeMismatch` for a column type with no
/// [`RowValues`] counterpart.
pub fn column_value(data: ColumnData<'static>) -> Result<RowValues> {
    let value = match data {
        ColumnData::U8(v) => v.map_or(RowValues::Null, RowValues::TinyInt),
        ColumnData::I16(v) => v.map_or(RowValues::Null, RowValues::SmallInt),
        ColumnData::I32(v) => v.map_or(RowValues::Null, RowValues::Int),
        ColumnData::I64(v) => v.map_or(RowValues::Null, RowValues::BigInt),
        ColumnData::F32(v) => v.map_or(RowValues::Null, RowValues::Real),
        ColumnData::F64(v) => v.map_or(RowValues::Null, RowValues::Float),
        ColumnData::Bit(v) => v.map_or(RowValues::Null, RowValues::Bool),
        ColumnData::String(v) => v.map_or(RowValues::Null, |s| RowValues::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(RowValues::Null, RowValues::Guid),
        ColumnData::Binary(v) => v.map_or(RowValues::Null, |b| RowValues::Blob(b.into_owned())),
        ColumnData::Xml(v) => v.map_or(RowValues::Null, |x| {
            RowValues::Xml(x.into_owned().into_string())
        }),
        ColumnData::Numeric(_) => {
            Decimal::from_sql(&data)?.map_or(RowValues::Null, RowValues::Decimal)
        }
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(&data)?.map_or(RowValues::Null, RowValues::Timestamp)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(&data)?.map_or(RowValues::Null, RowValues::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map_or(RowValues::Null, RowValues::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(&data)?
            .map_or(RowValues::Null, RowValues::DateTimeOffset),
        #[allow(unreachable_patterns)]
        other => {
            return Err(SqlServerError::type_mismatch(
                "a supported column type",
                format!("{other:?}"),
            ));
        }
    };
    Ok(value)
}
