use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum DemoError {
    #[error(transparent)]
    Database(#[from] mssql_fluent::SqlServerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Logging(String),
}

pub(crate) type DemoResult<T> = Result<T, DemoError>;
