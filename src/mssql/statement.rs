use std::ops::{Deref, DerefMut};

use super::data_object::SqlServerDataObject;
use crate::config::{AppSettings, enable_mars, parse_connection_string};
use crate::error::Result;
use crate::types::ConnectionMode;

/// Something that hands out fresh data objects.
pub trait DataObjectBuilder {
    type Output;

    /// Create a new data object; no connection is opened.
    ///
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the connection string is invalid.
    fn build(&self) -> Result<Self::Output>;
}

/// Statement in [`ConnectionMode::Normal`] or [`ConnectionMode::Mars`].
///
/// All command, execution and output methods come from
/// [`SqlServerDataObject`] through `Deref`.
#[derive(Debug)]
pub struct SqlServerStatement {
    inner: SqlServerDataObject,
}

impl SqlServerStatement {
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the connection string is invalid.
    pub fn new(connection_string: &str, mode: ConnectionMode) -> Result<Self> {
        Ok(Self {
            inner: SqlServerDataObject::new(connection_string, mode)?,
        })
    }
}

impl Deref for SqlServerStatement {
    type Target = SqlServerDataObject;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SqlServerStatement {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Builds [`SqlServerStatement`]s from one connection string.
///
/// ```rust
/// use mssql_fluent::prelude::*;
///
/// let builder = SqlServerStatementBuilder::from_connection_string(
///     "server=tcp:localhost,1433;database=AdventureWorks;user=sa;password=secret",
/// )
/// .unwrap();
/// let mars = builder.with_mars();
/// assert_eq!(builder.mode(), ConnectionMode::Normal);
/// assert_eq!(mars.mode(), ConnectionMode::Mars);
/// ```
#[derive(Debug, Clone)]
pub struct SqlServerStatementBuilder {
    connection_string: String,
    mode: ConnectionMode,
}

impl SqlServerStatementBuilder {
    /// Use the named connection string of the settings.
    ///
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the name is unknown or the
    /// connection string is invalid.
    pub fn new(settings: &AppSettings, connection_name: &str) -> Result<Self> {
        Self::from_connection_string(&settings.connection_string(connection_name)?)
    }

    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the connection string is invalid.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        parse_connection_string(connection_string)?;
        Ok(Self {
            connection_string: connection_string.to_string(),
            mode: ConnectionMode::Normal,
        })
    }

    /// A builder for MARS statements; `self` is left as it is.
    #[must_use]
    pub fn with_mars(&self) -> Self {
        Self {
            connection_string: enable_mars(&self.connection_string),
            mode: ConnectionMode::Mars,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl DataObjectBuilder for SqlServerStatementBuilder {
    type Output = SqlServerStatement;

    fn build(&self) -> Result<SqlServerStatement> {
        SqlServerStatement::new(&self.connection_string, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CS: &str = "server=tcp:localhost,1433;database=AdventureWorks;user=sa;password=secret";

    #[test]
    fn builds_from_settings() {
        let settings = AppSettings::default().with_connection_string("DefaultConnection", CS);
        let builder = SqlServerStatementBuilder::new(&settings, "DefaultConnection").unwrap();
        let statement = builder.build().unwrap();
        assert_eq!(statement.mode(), ConnectionMode::Normal);
        assert!(!statement.is_connected());

        assert!(SqlServerStatementBuilder::new(&settings, "Other").is_err());
    }

    #[test]
    fn with_mars_copies_the_builder() {
        let builder = SqlServerStatementBuilder::from_connection_string(CS).unwrap();
        let mars = builder.with_mars();
        assert_eq!(builder.connection_string(), CS);
        assert!(mars.connection_string().ends_with(";MultipleActiveResultSets=True"));

        let statement = mars.build().unwrap();
        assert_eq!(statement.mode(), ConnectionMode::Mars);
    }

    #[test]
    fn statements_chain_through_deref() {
        let mut statement = SqlServerStatementBuilder::from_connection_string(CS)
            .unwrap()
            .build()
            .unwrap();
        statement
            .set_sql("SELECT @Id")
            .add_in_parameter("Id", 5i32);
        assert_eq!(statement.command().parameters().len(), 1);
    }
}
