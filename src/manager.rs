//! The connection manager: one pool, lazily connected, shared by plain queries
//! and scoped transactions.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::driver::{
    PoolFactory, PoolHandle, RequestFactory, RequestHandle, TransactionFactory, TransactionHandle,
};
use crate::error::{MssqlConnectorError, Result};
use crate::host::{HostContext, HostLogger, Plugin};
use crate::mssql::{MssqlOptions, TiberiusDriver};
use crate::results::QueryResult;
use crate::types::QueryParam;

const DEFAULT_ID: &str = "mssql";

/// Lifecycle of the managed pool. There is no way back from `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Uninitialized,
    Connected,
    Closed,
}

/// Owns one connection pool and runs queries and transactions against it.
///
/// ```rust,no_run
/// use mssql_connector::prelude::*;
///
/// # async fn demo() -> Result<(), MssqlConnectorError> {
/// let options = MssqlOptions::builder("localhost", "app", "sa", "secret").finish();
/// let manager = ConnectionManager::new(&HostContext::tracing(), Some(options), None)?;
///
/// let result = manager
///     .query("SELECT @id AS id", &[QueryParam::inferred("id", RowValues::Int(1))])
///     .await?;
/// assert_eq!(result.row_count, 1);
///
/// let inserted = manager
///     .transaction(|q| {
///         Box::pin(async move {
///             let r = q.query("INSERT INTO t VALUES (1)", &[]).await?;
///             Ok::<_, MssqlConnectorError>(r.row_count)
///         })
///     })
///     .await?;
/// # let _ = inserted;
/// manager.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<F: PoolFactory = TiberiusDriver> {
    id: String,
    driver: F,
    pool: F::Pool,
    logger: Arc<dyn HostLogger>,
    // also serializes check-and-connect
    state: Mutex<PoolState>,
}

impl<F: PoolFactory> std::fmt::Debug for ConnectionManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("id", &self.id)
            .field("pool", &"<PoolHandle>")
            .finish_non_exhaustive()
    }
}

impl ConnectionManager<TiberiusDriver> {
    /// Build a manager over a tiberius pool. Does not connect.
    ///
    /// # Errors
    /// Returns `ConfigError` if `options` is `None` or invalid.
    pub fn new(host: &HostContext, options: Option<MssqlOptions>, id: Option<&str>) -> Result<Self> {
        Self::with_driver(TiberiusDriver, host, options, id)
    }

    /// Build a manager from the host's opaque JSON options.
    ///
    /// # Errors
    /// Returns `ConfigError` if `options` is `null` or malformed.
    pub fn from_json(host: &HostContext, options: JsonValue, id: Option<&str>) -> Result<Self> {
        let options = MssqlOptions::from_json(options).inspect_err(|e| host.logger().error(e))?;
        Self::new(host, Some(options), id)
    }
}

impl<F: PoolFactory> ConnectionManager<F> {
    /// Build a manager over the pool produced by `driver`. Does not connect.
    ///
    /// # Errors
    /// Returns `ConfigError` if `options` is `None` or the driver rejects them.
    pub fn with_driver(
        driver: F,
        host: &HostContext,
        options: Option<MssqlOptions>,
        id: Option<&str>,
    ) -> Result<Self> {
        let logger = Arc::clone(host.logger());
        let pool = options
            .ok_or_else(|| MssqlConnectorError::ConfigError("Empty connection config".to_string()))
            .and_then(|options| driver.create_pool(&options))
            .inspect_err(|e| logger.error(e))?;

        Ok(Self {
            id: id.unwrap_or(DEFAULT_ID).to_string(),
            driver,
            pool,
            logger,
            state: Mutex::new(PoolState::Uninitialized),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &F::Pool {
        &self.pool
    }

    /// The driver that built the pool.
    #[must_use]
    pub fn sdk(&self) -> &F {
        &self.driver
    }

    pub async fn state(&self) -> PoolState {
        *self.state.lock().await
    }

    fn log_error(&self, error: &dyn Display) {
        self.logger.error(error);
    }

    async fn ensure_connection(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match *state {
            PoolState::Closed => Err(MssqlConnectorError::PoolClosed),
            PoolState::Connected if self.pool.is_connected() => Ok(()),
            PoolState::Connected | PoolState::Uninitialized => {
                tracing::debug!(connector = %self.id, "connecting pool");
                self.pool.connect().await?;
                *state = PoolState::Connected;
                Ok(())
            }
        }
    }

    /// Run one parameterized statement on a fresh request scope.
    ///
    /// # Errors
    /// Returns the connection, parameter or execution error after logging it.
    pub async fn query(&self, sql: &str, params: &[QueryParam]) -> Result<QueryResult> {
        let outcome = async {
            self.ensure_connection().await?;
            let mut request = self.pool.request();
            execute_request(request.as_mut(), sql, params).await
        }
        .await;
        outcome.inspect_err(|e| self.log_error(e))
    }

    /// Run `sequence` inside one transaction.
    ///
    /// The transaction commits when `sequence` returns `Ok` and rolls back
    /// when it returns `Err`; the error is then handed back unchanged. If the
    /// rollback itself fails, `RollbackFailed` is returned instead.
    ///
    /// # Errors
    /// Returns the sequence's error, or a connection/transaction error
    /// converted into `E`.
    pub async fn transaction<T, E, S>(&self, sequence: S) -> std::result::Result<T, E>
    where
        S: for<'t> FnOnce(&'t mut TransactionQuery<'_>) -> BoxFuture<'t, std::result::Result<T, E>>,
        E: From<MssqlConnectorError> + Display,
    {
        if let Err(e) = self.ensure_connection().await {
            self.log_error(&e);
            return Err(e.into());
        }

        let mut scope = TransactionQuery {
            tx: self.pool.transaction(),
        };
        if let Err(e) = scope.tx.begin().await {
            self.log_error(&e);
            return Err(e.into());
        }
        tracing::debug!(connector = %self.id, "transaction begun");

        match sequence(&mut scope).await {
            Ok(value) => match scope.tx.commit().await {
                Ok(()) => {
                    tracing::debug!(connector = %self.id, "transaction committed");
                    Ok(value)
                }
                Err(commit_err) => {
                    self.log_error(&commit_err);
                    let original = commit_err.to_string();
                    match self.roll_back(scope.tx.as_mut(), original).await {
                        Ok(()) => Err(commit_err.into()),
                        Err(rollback_err) => Err(rollback_err.into()),
                    }
                }
            },
            Err(err) => {
                self.log_error(&err);
                match self.roll_back(scope.tx.as_mut(), err.to_string()).await {
                    Ok(()) => Err(err),
                    Err(rollback_err) => Err(rollback_err.into()),
                }
            }
        }
    }

    async fn roll_back(&self, tx: &mut (dyn TransactionHandle + '_), original: String) -> Result<()> {
        match tx.rollback().await {
            Ok(()) => {
                tracing::debug!(connector = %self.id, "transaction rolled back");
                Ok(())
            }
            Err(e) => {
                let err = MssqlConnectorError::rollback_failed(original, e);
                self.log_error(&err);
                Err(err)
            }
        }
    }

    /// Close the pool. Later operations fail with `PoolClosed`.
    ///
    /// # Errors
    /// Returns the driver's error, e.g. when the pool was already closed.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let outcome = self.pool.close().await;
        *state = PoolState::Closed;
        tracing::debug!(connector = %self.id, "pool closed");
        outcome.inspect_err(|e| self.log_error(e))
    }
}

#[async_trait]
impl<F: PoolFactory> Plugin for ConnectionManager<F> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn on_stop(&self) {
        // close() has already logged any failure
        let _ = self.close().await;
    }
}

/// Query function handed to a transaction sequence. Every call runs on a
/// fresh request bound to the one transaction.
pub struct TransactionQuery<'a> {
    tx: Box<dyn TransactionHandle + 'a>,
}

impl TransactionQuery<'_> {
    /// # Errors
    /// Returns the parameter or execution error; the enclosing transaction
    /// logs it and rolls back if the sequence propagates it.
    pub async fn query(&mut self, sql: &str, params: &[QueryParam]) -> Result<QueryResult> {
        let mut request = self.tx.request();
        execute_request(request.as_mut(), sql, params).await
    }
}

async fn execute_request(
    request: &mut (dyn RequestHandle + '_),
    sql: &str,
    params: &[QueryParam],
) -> Result<QueryResult> {
    // a reused scope must never carry bindings over
    request.clear_parameters();
    for param in params {
        request.input(param.clone())?;
    }
    let raw = request.query(sql).await?;
    Ok(QueryResult::from(raw))
}
