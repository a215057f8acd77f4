use std::ops::{Deref, DerefMut};

use tracing::warn;

use super::data_object::SqlServerDataObject;
use super::statement::DataObjectBuilder;
use crate::config::{AppSettings, parse_connection_string};
use crate::error::Result;
use crate::types::ConnectionMode;

/// Data object whose commands all run in one transaction.
///
/// The transaction begins with the first command. Finish it with
/// [`commit`](Self::commit) or [`rollback`](Self::rollback); dropping an
/// unfinished transaction closes the connection, which makes the server roll
/// it back.
#[derive(Debug)]
pub struct SqlServerTransaction {
    inner: SqlServerDataObject,
}

impl SqlServerTransaction {
    /// # Errors
    /// Returns `SqlServerError::ConfigError` if the connection string is invalid.
    pub fn new(connection_string: &str) -> Result<Self> {
        Ok(Self {
            inner: SqlServerDataObject::new(connection_string, ConnectionMode::Transactional)?,
        })
    }

    /// Commit and close. Does nothing when no command ever ran.
    ///
    /// # Errors
    /// Returns `SqlServerError::TransactionError` if the commit fails, or if
    /// `close()` already ended the connection and the server rolled back.
    pub async fn commit(mut self) -> Result<()> {
        self.inner.end_transaction(true).await
    }

    /// Roll back and close. Does nothing when no command ever ran.
    ///
    /// # Errors
    /// Returns `SqlServerError::TransactionError` if the rollback fails, or if
    /// `close()` already ended the connection and the server rolled back.
    pub async fn rollback(mut self) -> Result<()> {
        self.inner.end_transaction(false).await
    }
}

impl Drop for SqlServerTransaction {
    fn drop(&mut self) {
        if self.inner.in_transaction() {
            warn!("transaction dropped without commit or rollback; it will be rolled back");
        }
    }
}

impl Deref for SqlServerTransaction {
    type Target = SqlServerDataObject;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SqlServerTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Builds [`SqlServerTransaction`]s from one connection string.
#[derive(Debug, Clone)]
pub struct SqlServerTransactionBuilder {
    connection_string: String,
}

impl SqlServerTransactionBuilder {
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
        })
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

impl DataObjectBuilder for SqlServerTransactionBuilder {
    type Output = SqlServerTransaction;

    fn build(&self) -> Result<SqlServerTransaction> {
        SqlServerTransaction::new(&self.connection_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SqlServerError;

    const CS: &str = "server=tcp:localhost,1433;database=AdventureWorks;user=sa;password=secret";

    #[tokio::test]
    async fn finishing_an_unused_transaction_is_a_no_op() {
        let builder = SqlServerTransactionBuilder::from_connection_string(CS).unwrap();

        let transaction = builder.build().unwrap();
        assert_eq!(transaction.mode(), ConnectionMode::Transactional);
        assert!(!transaction.in_transaction());
        transaction.commit().await.unwrap();

        builder.build().unwrap().rollback().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_command_fails_without_starting_a_transaction() {
        let mut transaction = SqlServerTransactionBuilder::from_connection_string(CS)
            .unwrap()
            .build()
            .unwrap();
        transaction.set_stored_procedure("not a name");
        assert!(matches!(
            transaction.execute().await,
            Err(SqlServerError::ParameterError(_))
        ));
        assert!(!transaction.in_transaction());
        transaction.rollback().await.unwrap();
    }
}
