use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tiberius::{Config, Uuid};
use tracing::{debug, warn};

use super::client::{MssqlClient, close_mssql_client, create_mssql_client};
use super::command::SqlCommand;
use super::executor::{execute_batch, execute_simple, query_batch};
use super::params::{DataTable, IntoParameter, SqlDbType, SqlParameter};
use super::query::{Batch, compose_batch, take_outputs};
use super::reader::DataReader;
use crate::config::parse_connection_string;
use crate::error::{Result, SqlServerError};
use crate::results::ResultSet;
use crate::types::{ConnectionMode, FromRowValue, NumericType, ParameterDirection, RowValues};

/// Connection, command and transaction state shared by statements and
/// transactions.
///
/// Builder methods return `&mut Self` and never fail; the first problem is
/// reported by the next execution. Every execution compiles the current
/// command into a self-contained batch and buffers all of its results, so the
/// command can be reconfigured and run again while a [`DataReader`] from an
/// earlier execution is still being read.
pub struct SqlServerDataObject {
    config: Config,
    mode: ConnectionMode,
    client: Option<MssqlClient>,
    command: SqlCommand,
    in_transaction: bool,
    // set when close() dropped a running transaction
    transaction_lost: bool,
}

impl std::fmt::Debug for SqlServerDataObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerDataObject")
            .field("addr", &self.config.get_addr())
            .field("mode", &self.mode)
            .field("connected", &self.client.is_some())
            .field("command", &self.command)
            .field("in_transaction", &self.in_transaction)
            .field("transaction_lost", &self.transaction_lost)
            .finish()
    }
}

fn transaction_rolled_back() -> SqlServerError {
    SqlServerError::TransactionError("connection closed; transaction was rolled back".into())
}

macro_rules! typed_scalar {
    ($($(#[$doc:meta])* $name:ident => $ty:ty;)*) => {
        $(
            $(#[$doc])*
            ///
            /// # Errors
            /// See [`SqlServerDataObject::scalar`].
            pub async fn $name(&mut self) -> Result<Option<$ty>> {
                self.scalar::<$ty>().await
            }
        )*
    };
}

macro_rules! typed_getter {
    ($($name:ident, $or_null:ident => $ty:ty;)*) => {
        $(
            /// Output value; NULL reads as the type's default.
            ///
            /// # Errors
            /// See [`SqlServerDataObject::get`].
            pub fn $name(&self, name: &str) -> Result<$ty> {
                self.get::<$ty>(name)
            }

            /// Output value, `None` on NULL.
            ///
            /// # Errors
            /// See [`SqlServerDataObject::get_or_null`].
            pub fn $or_null(&self, name: &str) -> Result<Option<$ty>> {
                self.get_or_null::<$ty>(name)
            }
        )*
    };
}

impl SqlServerDataObject {
    /// Create a data object; no connection is opened yet.
    ///
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the connection string is invalid.
    pub fn new(connection_string: &str, mode: ConnectionMode) -> Result<Self> {
        Ok(Self::with_config(parse_connection_string(connection_string)?, mode))
    }

    #[must_use]
    pub fn with_config(config: Config, mode: ConnectionMode) -> Self {
        Self {
            config,
            mode,
            client: None,
            command: SqlCommand::new(),
            in_transaction: false,
            transaction_lost: false,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    #[must_use]
    pub fn command(&self) -> &SqlCommand {
        &self.command
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Whether a transaction was started and not yet finished.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    // ----- command ---------------------------------------------------------

    /// Use ad-hoc T-SQL; clears parameters, errors and preparation.
    pub fn set_sql(&mut self, sql: &str) -> &mut Self {
        self.command.set_sql(sql);
        self
    }

    /// Call a stored procedure; clears parameters, errors and preparation.
    pub fn set_stored_procedure(&mut self, name: &str) -> &mut Self {
        self.command.set_stored_procedure(name);
        self
    }

    /// Add a parameter of an explicit type and direction.
    pub fn add_parameter(
        &mut self,
        name: &str,
        db_type: SqlDbType,
        direction: ParameterDirection,
        value: RowValues,
    ) -> &mut Self {
        self.command
            .add_parameter(SqlParameter::new(name, db_type, direction, value));
        self
    }

    fn add_typed(
        &mut self,
        name: &str,
        db_type: SqlDbType,
        direction: ParameterDirection,
        value: impl IntoParameter,
    ) -> &mut Self {
        let (_, value) = value.into_parameter();
        self.add_parameter(name, db_type, direction, value)
    }

    /// Input parameter typed after the value; `None` and [`NumericType`]
    /// give typed NULLs.
    pub fn add_in_parameter(&mut self, name: &str, value: impl IntoParameter) -> &mut Self {
        let (db_type, value) = value.into_parameter();
        self.add_parameter(name, db_type, ParameterDirection::Input, value)
    }

    /// `nvarchar(size)` input; empty strings are NULL.
    pub fn add_in_string(&mut self, name: &str, value: impl IntoParameter, size: usize) -> &mut Self {
        self.add_typed(name, SqlDbType::NVarChar(size), ParameterDirection::Input, value)
    }

    /// `nchar(size)` input.
    pub fn add_in_char(&mut self, name: &str, value: impl IntoParameter, size: usize) -> &mut Self {
        self.add_typed(name, SqlDbType::NChar(size), ParameterDirection::Input, value)
    }

    pub fn add_in_decimal(
        &mut self,
        name: &str,
        value: impl IntoParameter,
        precision: u8,
        scale: u8,
    ) -> &mut Self {
        self.add_typed(
            name,
            SqlDbType::Decimal { precision, scale },
            ParameterDirection::Input,
            value,
        )
    }

    /// `xml` input from a document's text.
    pub fn add_in_xml(&mut self, name: &str, value: impl IntoParameter) -> &mut Self {
        self.add_typed(name, SqlDbType::Xml, ParameterDirection::Input, value)
    }

    /// Table-valued input of a user-defined table type.
    pub fn add_in_table(&mut self, name: &str, type_name: &str, table: DataTable) -> &mut Self {
        self.command
            .add_parameter(SqlParameter::table(name, type_name, table));
        self
    }

    pub fn add_in_out_parameter(&mut self, name: &str, value: impl IntoParameter) -> &mut Self {
        let (db_type, value) = value.into_parameter();
        self.add_parameter(name, db_type, ParameterDirection::InputOutput, value)
    }

    pub fn add_in_out_string(
        &mut self,
        name: &str,
        value: impl IntoParameter,
        size: usize,
    ) -> &mut Self {
        self.add_typed(
            name,
            SqlDbType::NVarChar(size),
            ParameterDirection::InputOutput,
            value,
        )
    }

    pub fn add_in_out_decimal(
        &mut self,
        name: &str,
        value: impl IntoParameter,
        precision: u8,
        scale: u8,
    ) -> &mut Self {
        self.add_typed(
            name,
            SqlDbType::Decimal { precision, scale },
            ParameterDirection::InputOutput,
            value,
        )
    }

    pub fn add_in_out_xml(&mut self, name: &str, value: impl IntoParameter) -> &mut Self {
        self.add_typed(name, SqlDbType::Xml, ParameterDirection::InputOutput, value)
    }

    pub fn add_out_parameter(&mut self, name: &str, numeric_type: NumericType) -> &mut Self {
        self.add_parameter(
            name,
            numeric_type.into(),
            ParameterDirection::Output,
            RowValues::Null,
        )
    }

    pub fn add_out_string(&mut self, name: &str, size: usize) -> &mut Self {
        self.add_parameter(
            name,
            SqlDbType::NVarChar(size),
            ParameterDirection::Output,
            RowValues::Null,
        )
    }

    pub fn add_out_decimal(&mut self, name: &str, precision: u8, scale: u8) -> &mut Self {
        self.add_parameter(
            name,
            SqlDbType::Decimal { precision, scale },
            ParameterDirection::Output,
            RowValues::Null,
        )
    }

    pub fn add_out_xml(&mut self, name: &str) -> &mut Self {
        self.add_parameter(name, SqlDbType::Xml, ParameterDirection::Output, RowValues::Null)
    }

    pub fn add_out_binary(&mut self, name: &str) -> &mut Self {
        self.add_parameter(
            name,
            SqlDbType::VarBinary,
            ParameterDirection::Output,
            RowValues::Null,
        )
    }

    /// Stored procedure return code (`int`).
    pub fn add_return_value(&mut self, name: &str) -> &mut Self {
        self.add_parameter(
            name,
            SqlDbType::Int,
            ParameterDirection::ReturnValue,
            RowValues::Null,
        )
    }

    /// Replace a parameter value, converted to its declared type. Works after
    /// [`prepare`](Self::prepare).
    pub fn set_parameter(&mut self, name: &str, value: impl IntoParameter) -> &mut Self {
        let (_, value) = value.into_parameter();
        self.command.set_parameter(name, value);
        self
    }

    // ----- connection ------------------------------------------------------

    /// Connect if needed. A transactional object starts its transaction on
    /// the new connection.
    ///
    /// # Errors
    /// Returns `SqlServerError::ConnectionError` on connect failure, the
    /// server error raised by `BEGIN TRANSACTION`, or
    /// `SqlServerError::TransactionError` when a transaction was already lost
    /// to [`SqlServerDataObject::close`].
    pub async fn open_connection(&mut self) -> Result<&mut MssqlClient> {
        if self.transaction_lost {
            return Err(transaction_rolled_back());
        }
        if self.client.is_none() {
            let mut client = create_mssql_client(&self.config).await?;
            if self.mode == ConnectionMode::Transactional {
                execute_simple(&mut client, "BEGIN TRANSACTION").await?;
                self.in_transaction = true;
                debug!("transaction started");
            }
            self.client = Some(client);
        }
        self.client
            .as_mut()
            .ok_or_else(|| SqlServerError::ConnectionError("Connection is not open".into()))
    }

    /// Normal mode closes after every operation unless the command is prepared.
    async fn finish_operation(&mut self) {
        if self.mode == ConnectionMode::Normal && !self.command.is_prepared() {
            self.close().await;
        }
    }

    /// Close the connection, if any.
    ///
    /// Closing with a transaction running makes the server roll it back; the
    /// object then refuses further work and `commit`/`rollback` report it.
    pub async fn close(&mut self) {
        if self.in_transaction {
            warn!("connection closed inside a transaction; the server rolls it back");
            self.in_transaction = false;
            self.transaction_lost = true;
        }
        if let Some(client) = self.client.take() {
            close_mssql_client(client).await;
        }
    }

    /// End the running transaction with `COMMIT` or `ROLLBACK` and close.
    ///
    /// # Errors
    /// Returns `SqlServerError::TransactionError` if the statement fails or the
    /// transaction was already rolled back by [`SqlServerDataObject::close`].
    pub(crate) async fn end_transaction(&mut self, commit: bool) -> Result<()> {
        if self.transaction_lost {
            self.transaction_lost = false;
            return Err(transaction_rolled_back());
        }
        let Some(mut client) = self.client.take() else {
            return Ok(());
        };

        let result = if self.in_transaction {
            let sql = if commit {
                "COMMIT TRANSACTION"
            } else {
                "ROLLBACK TRANSACTION"
            };
            let result = execute_simple(&mut client, sql).await;
            if result.is_ok() {
                debug!(commit, "transaction finished");
            }
            result.map_err(|e| SqlServerError::TransactionError(format!("{sql} failed: {e}")))
        } else {
            Ok(())
        };

        self.in_transaction = false;
        close_mssql_client(client).await;
        result
    }

    // ----- execution -------------------------------------------------------

    async fn run_query(&mut self, batch: &Batch) -> Result<Vec<ResultSet>> {
        let client = self.open_connection().await?;
        let result = query_batch(client, batch).await;
        self.finish_operation().await;
        result
    }

    /// Execute and buffer every caller-visible result set, writing output
    /// values back into their parameters.
    async fn run_sets(&mut self, batch: &Batch) -> Result<(Vec<ResultSet>, Option<usize>)> {
        let mut sets = self.run_query(batch).await?;

        let rows_affected = match take_outputs(batch, &mut sets)? {
            Some(outputs) => {
                let params = self.command.parameters_mut();
                for (name, value) in outputs.values {
                    if let Some(param) = params.get_mut(&name) {
                        param.set_output(value);
                    }
                }
                Some(outputs.rows_affected)
            }
            None => None,
        };
        Ok((sets, rows_affected))
    }

    async fn fetch(&mut self) -> Result<Vec<ResultSet>> {
        let batch = compose_batch(&self.command)?;
        let (sets, _) = self.run_sets(&batch).await?;
        Ok(sets)
    }

    /// Run the command as a non-query.
    ///
    /// Returns the rows affected: the summed counts of every statement, or the
    /// `@@ROWCOUNT` of the last statement when output parameters are present.
    ///
    /// # Errors
    /// Returns the deferred builder error, a connection error, or the
    /// translated server error.
    pub async fn execute(&mut self) -> Result<usize> {
        let batch = compose_batch(&self.command)?;
        if batch.has_epilogue() {
            let (_, rows_affected) = self.run_sets(&batch).await?;
            return Ok(rows_affected.unwrap_or(0));
        }

        let client = self.open_connection().await?;
        let result = execute_batch(client, &batch).await;
        self.finish_operation().await;
        result
    }

    /// First column of the first row of the first result set.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute), plus `SqlServerError::TypeMismatch`
    /// when the value is not a `T`.
    pub async fn scalar<T: FromRowValue>(&mut self) -> Result<Option<T>> {
        let sets = self.fetch().await?;
        match sets.first().and_then(ResultSet::first_value) {
            Some(value) => T::from_row_value(value),
            None => Ok(None),
        }
    }

    typed_scalar! {
        scalar_bool => bool;
        scalar_byte => u8;
        scalar_i16 => i16;
        scalar_i32 => i32;
        scalar_i64 => i64;
        scalar_f32 => f32;
        scalar_f64 => f64;
        scalar_decimal => Decimal;
        scalar_date_time => NaiveDateTime;
        scalar_string => String;
        scalar_binary => Vec<u8>;
        scalar_guid => Uuid;
    }

    /// XML produced by `FOR XML`, which the server splits across rows of the
    /// first column. `None` when there are no rows.
    ///
    /// # Errors
    /// Same as [`scalar`](Self::scalar).
    pub async fn scalar_xml(&mut self) -> Result<Option<String>> {
        let sets = self.fetch().await?;
        let Some(first) = sets.first() else {
            return Ok(None);
        };
        if first.is_empty() {
            return Ok(None);
        }

        let mut xml = String::new();
        for row in &first.results {
            if let Some(part) = row.get_by_index(0) {
                if let Some(text) = String::from_row_value(part)? {
                    xml.push_str(&text);
                }
            }
        }
        Ok(Some(xml))
    }

    /// First result set, empty when the command returned none.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute).
    pub async fn query(&mut self) -> Result<ResultSet> {
        let sets = self.fetch().await?;
        Ok(sets.into_iter().next().unwrap_or_default())
    }

    /// Every result set, in order.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute).
    pub async fn query_all(&mut self) -> Result<Vec<ResultSet>> {
        self.fetch().await
    }

    /// Buffered reader over every result set.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute).
    pub async fn execute_reader(&mut self) -> Result<DataReader> {
        let sets = self.fetch().await?;
        Ok(DataReader::new(sets))
    }

    /// Run the command and feed the first result set to callbacks: `setter`
    /// once before the first row, then `filler` for every row. Whatever the
    /// setter returns (typically looked-up ordinals) is handed to each
    /// `filler` call. An error from either callback stops the read.
    ///
    /// # Errors
    /// Same as [`execute`](Self::execute), plus any callback error.
    pub async fn read<O, S, F>(&mut self, setter: S, mut filler: F) -> Result<()>
    where
        S: FnOnce(&DataReader) -> Result<O>,
        F: FnMut(&O, &DataReader) -> Result<()>,
    {
        let mut reader = self.execute_reader().await?;
        let ordinals = setter(&reader)?;
        while reader.read() {
            filler(&ordinals, &reader)?;
        }
        Ok(())
    }

    /// Check the command, open the connection and keep it for repeated
    /// executions. Afterwards only [`set_parameter`](Self::set_parameter) may
    /// change the command.
    ///
    /// # Errors
    /// Returns the deferred builder error or a connection error.
    pub async fn prepare(&mut self) -> Result<()> {
        compose_batch(&self.command)?;
        self.open_connection().await?;
        self.command.set_prepared();
        debug!(sql = self.command.text(), "command prepared");
        Ok(())
    }

    // ----- output values ---------------------------------------------------

    fn parameter_value(&self, name: &str) -> Result<&RowValues> {
        self.command
            .parameters()
            .get(name)
            .map(SqlParameter::value)
            .ok_or_else(|| SqlServerError::ParameterError(format!("Parameter '{name}' not found")))
    }

    /// Parameter value; NULL reads as `T::default()`.
    ///
    /// # Errors
    /// Returns `SqlServerError::ParameterError` for an unknown name or
    /// `SqlServerError::TypeMismatch` for another type.
    pub fn get<T: FromRowValue + Default>(&self, name: &str) -> Result<T> {
        Ok(self.get_or_null(name)?.unwrap_or_default())
    }

    /// Parameter value, `None` on NULL.
    ///
    /// # Errors
    /// Same as [`get`](Self::get).
    pub fn get_or_null<T: FromRowValue>(&self, name: &str) -> Result<Option<T>> {
        T::from_row_value(self.parameter_value(name)?)
    }

    typed_getter! {
        get_bool, get_bool_or_null => bool;
        get_byte, get_byte_or_null => u8;
        get_date_time, get_date_time_or_null => NaiveDateTime;
        get_decimal, get_decimal_or_null => Decimal;
        get_f64, get_f64_or_null => f64;
        get_i16, get_i16_or_null => i16;
        get_i32, get_i32_or_null => i32;
        get_i64, get_i64_or_null => i64;
        get_f32, get_f32_or_null => f32;
    }

    /// String output; NULL reads as an empty string.
    ///
    /// # Errors
    /// Same as [`get`](Self::get).
    pub fn get_string(&self, name: &str) -> Result<String> {
        self.get::<String>(name)
    }

    /// # Errors
    /// Same as [`get`](Self::get).
    pub fn get_binary(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.get_or_null(name)
    }

    /// # Errors
    /// Same as [`get`](Self::get).
    pub fn get_xml(&self, name: &str) -> Result<Option<String>> {
        self.get_or_null(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CS: &str = "server=tcp:localhost,1433;database=AdventureWorks;user=sa;password=secret";

    fn object() -> SqlServerDataObject {
        SqlServerDataObject::new(CS, ConnectionMode::Normal).unwrap()
    }

    #[test]
    fn builder_chain_collects_parameters() {
        let mut obj = object();
        obj.set_sql("UPDATE HumanResources.Department SET [Name] = @Name WHERE DepartmentID = @DepartmentID")
            .add_in_string("Name", "Engineering", 50)
            .add_in_parameter("DepartmentID", 1i16)
            .add_out_parameter("Changed", NumericType::Int32);

        let params = obj.command().parameters();
        assert_eq!(params.len(), 3);
        assert_eq!(
            params.get("Name").map(|p| p.db_type().clone()),
            Some(SqlDbType::NVarChar(50))
        );
        assert_eq!(
            params.get("DepartmentID").map(|p| p.value().clone()),
            Some(RowValues::SmallInt(1))
        );
        assert!(obj.command().check().is_ok());
        assert!(!obj.is_connected());
    }

    #[tokio::test]
    async fn execution_without_command_fails_before_connecting() {
        let mut obj = object();
        assert!(matches!(obj.execute().await, Err(SqlServerError::CommandError(_))));
        assert!(!obj.is_connected());
    }

    #[tokio::test]
    async fn deferred_errors_surface_on_execution() {
        let mut obj = object();
        obj.set_sql("SELECT @Id")
            .add_in_parameter("Id", 1)
            .add_in_parameter("id", 2)
            .add_in_decimal("Price", 1.5f64, 40, 2);

        let err = obj.scalar_i32().await.unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        assert!(obj.prepare().await.is_err());
        assert!(!obj.is_connected());
    }

    #[test]
    fn decimals_and_dates_accept_typed_nulls() {
        let mut obj = object();
        obj.set_sql("SELECT @Rate, @Due")
            .add_in_decimal("Rate", None::<Decimal>, 19, 4)
            .add_in_parameter("Due", None::<chrono::NaiveDate>);
        obj.set_parameter("Rate", Some(Decimal::new(125, 1)));
        obj.set_parameter("Rate", None::<Decimal>);
        assert!(obj.command().check().is_ok());

        let rate = obj.command().parameters().get("Rate").unwrap();
        assert_eq!(rate.db_type(), &SqlDbType::Decimal { precision: 19, scale: 4 });
        assert!(rate.value().is_null());
        let due = obj.command().parameters().get("Due").unwrap();
        assert_eq!(due.db_type(), &SqlDbType::DateTime);
    }

    #[tokio::test]
    async fn coercion_failures_are_deferred() {
        let mut obj = object();
        obj.set_sql("SELECT @Flag").add_in_parameter("Flag", NumericType::Boolean);
        obj.set_parameter("Flag", "yes");
        assert!(matches!(
            obj.query().await,
            Err(SqlServerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn output_getters_apply_null_defaults() {
        let mut obj = object();
        obj.set_sql("SELECT 1")
            .add_out_string("Name", 50)
            .add_out_parameter("Count", NumericType::Int32)
            .add_out_binary("Photo");

        assert_eq!(obj.get_string("Name").unwrap(), "");
        assert_eq!(obj.get_i32("Count").unwrap(), 0);
        assert_eq!(obj.get_i32_or_null("Count").unwrap(), None);
        assert_eq!(obj.get_binary("Photo").unwrap(), None);
        assert!(matches!(
            obj.get_i32("Missing"),
            Err(SqlServerError::ParameterError(_))
        ));
        assert!(obj.get_string("Count").is_ok());
    }

    #[tokio::test]
    async fn close_inside_transaction_poisons_the_object() {
        let mut obj = SqlServerDataObject::new(CS, ConnectionMode::Transactional).unwrap();
        obj.in_transaction = true;
        obj.close().await;
        assert!(!obj.in_transaction());

        // no silent reconnect into a second transaction
        obj.set_sql("SELECT 1");
        assert!(matches!(
            obj.execute().await,
            Err(SqlServerError::TransactionError(_))
        ));
        assert!(!obj.is_connected());

        let err = obj.end_transaction(true).await.unwrap_err();
        assert!(err.to_string().contains("rolled back"), "{err}");
        // reported once
        assert!(obj.end_transaction(true).await.is_ok());
    }

    #[tokio::test]
    async fn close_without_transaction_keeps_commit_a_no_op() {
        let mut obj = SqlServerDataObject::new(CS, ConnectionMode::Transactional).unwrap();
        obj.close().await;
        assert!(obj.end_transaction(true).await.is_ok());
    }

    #[test]
    fn invalid_connection_string_is_rejected() {
        let err = SqlServerDataObject::new("server=tcp:localhost,notaport", ConnectionMode::Normal);
        assert!(matches!(err, Err(SqlServerError::ConfigError(_))));
    }
}
