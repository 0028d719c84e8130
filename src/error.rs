use thiserror::Error;

#[derive(Debug, Error)]
pub enum MssqlConnectorError {
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Rolling back after a failure failed as well; `original` is the failure
    /// that triggered the rollback.
    #[error("Rollback failed ({source}) after: {original}")]
    RollbackFailed {
        original: String,
        #[source]
        source: Box<MssqlConnectorError>,
    },

    #[error("Connection pool has been closed")]
    PoolClosed,
}

impl MssqlConnectorError {
    pub(crate) fn rollback_failed(original: impl Into<String>, source: MssqlConnectorError) -> Self {
        MssqlConnectorError::RollbackFailed {
            original: original.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, MssqlConnectorError>;
