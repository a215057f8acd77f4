// SQL Server access on top of tiberius
//
// - client: raw connection setup and teardown
// - params: parameter types, values and validation
// - command: command text plus parameters and deferred errors
// - query: batch composition and column conversion
// - executor: running batches against a client
// - reader: buffered forward-only reader
// - data_object: connection modes and the fluent API
// - statement / transaction: the public wrappers and their builders

pub mod client;
pub mod command;
pub mod data_object;
pub mod executor;
pub mod params;
pub mod query;
pub mod reader;
pub mod statement;
pub mod transaction;

pub use client::{MssqlClient, create_mssql_client};
pub use command::SqlCommand;
pub use data_object::SqlServerDataObject;
pub use params::{DataTable, IntoParameter, ParameterCollection, SqlDbType, SqlParameter};
pub use query::{Batch, compose_batch};
pub use reader::DataReader;
pub use statement::{DataObjectBuilder, SqlServerStatement, SqlServerStatementBuilder};
pub use transaction::{SqlServerTransaction, SqlServerTransactionBuilder};
