use tiberius::{Client, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use crate::error::{Result, SqlServerError};

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Helper function to open a new SQL Server connection
///
/// Named instances are resolved through the SQL Browser service. A routing
/// redirect (Azure SQL gateways) is followed once.
///
/// # Errors
/// Returns `SqlServerError::ConnectionError` if the TCP or TDS connection fails.
pub async fn create_mssql_client(config: &Config) -> Result<MssqlClient> {
    let tcp = TcpStream::connect_named(config)
        .await
        .map_err(|e| SqlServerError::ConnectionError(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| SqlServerError::ConnectionError(format!("TCP configuration error: {e}")))?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => {
            debug!(addr = %config.get_addr(), "connected to SQL Server");
            Ok(client)
        }
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!(%host, port, "following SQL Server routing redirect");
            let mut routed = config.clone();
            routed.host(&host);
            routed.port(port);

            let tcp = TcpStream::connect(routed.get_addr()).await.map_err(|e| {
                SqlServerError::ConnectionError(format!("TCP connection error after redirect: {e}"))
            })?;
            tcp.set_nodelay(true).map_err(|e| {
                SqlServerError::ConnectionError(format!("TCP configuration error: {e}"))
            })?;

            Client::connect(routed, tcp.compat_write()).await.map_err(|e| {
                SqlServerError::ConnectionError(format!("SQL Server connection error: {e}"))
            })
        }
        Err(e) => Err(SqlServerError::ConnectionError(format!(
            "SQL Server connection error: {e}"
        ))),
    }
}

/// Close a connection, logging instead of failing.
pub async fn close_mssql_client(client: MssqlClient) {
    if let Err(e) = client.close().await {
        warn!(error = %e, "failed to close SQL Server connection");
    } else {
        debug!("closed SQL Server connection");
    }
}
