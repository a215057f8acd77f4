//! Fluent, strongly-typed statements and transactions for SQL Server.
//!
//! A [`SqlServerStatementBuilder`] or [`SqlServerTransactionBuilder`] is
//! created once from a connection string and hands out data objects. Each data
//! object carries one command that is configured with chained builder calls
//! and then executed:
//!
//! ```rust,no_run
//! use mssql_fluent::prelude::*;
//!
//! # async fn run() -> mssql_fluent::Result<()> {
//! let settings = AppSettings::from_file("appsettings.json")?;
//! let builder = SqlServerStatementBuilder::new(&settings, "DefaultConnection")?;
//!
//! let mut statement = builder.build()?;
//! let name = statement
//!     .set_sql("SELECT [Name] FROM HumanResources.Department WHERE DepartmentID = @Id")
//!     .add_in_parameter("Id", 1i16)
//!     .scalar_string()
//!     .await?;
//! println!("{name:?}");
//! # Ok(())
//! # }
//! ```
//!
//! Builder calls never fail on their own. The first problem is stored and
//! returned by the next execution, so a chain reads top to bottom with a single
//! `?` at the end.

pub mod config;
pub mod error;
pub mod mssql;
pub mod prelude;
pub mod results;
pub mod types;

pub use config::AppSettings;
pub use error::{ConstraintKind, Result, SqlServerError};
pub use mssql::{
    DataObjectBuilder, DataReader, DataTable, SqlDbType, SqlServerStatement,
    SqlServerStatementBuilder, SqlServerTransaction, SqlServerTransactionBuilder,
};
pub use results::{CustomDbRow, ResultSet};
pub use types::{CommandType, ConnectionMode, NumericType, ParameterDirection, RowValues};
