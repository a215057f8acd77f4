//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and traits
//! to make it easier to get started with the library.

pub use crate::config::AppSettings;
pub use crate::error::{ConstraintKind, Result, SqlServerError};
pub use crate::mssql::{
    DataObjectBuilder, DataReader, DataTable, IntoParameter, SqlDbType, SqlParameter,
    SqlServerDataObject, SqlServerStatement, SqlServerStatementBuilder, SqlServerTransaction,
    SqlServerTransactionBuilder,
};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::types::{
    CommandType, ConnectionMode, FromRowValue, NumericType, ParameterDirection, RowValues,
};
