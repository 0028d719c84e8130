use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use deadpool::managed::Object;

use super::MssqlClient;
use super::config::{MssqlOptions, build_pool};
use super::params::Bindings;
use super::query::run_query;
use super::transaction::TiberiusTransaction;
use crate::driver::{
    PoolFactory, PoolHandle, RequestFactory, RequestHandle, TransactionFactory, TransactionHandle,
};
use crate::error::{MssqlConnectorError, Result};
use crate::results::RawResult;
use crate::types::QueryParam;

/// Pooled SQL Server connection.
pub type PooledClient = Object<deadpool_tiberius::Manager>;

/// Production driver: builds deadpool-tiberius pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiberiusDriver;

impl PoolFactory for TiberiusDriver {
    type Pool = TiberiusPool;

    fn create_pool(&self, options: &MssqlOptions) -> Result<TiberiusPool> {
        options.validate()?;
        Ok(TiberiusPool::new(build_pool(options)?))
    }
}

/// A deadpool-tiberius pool with connect/close bookkeeping.
///
/// deadpool opens connections on demand, so `connect` checks out one
/// connection and runs `SELECT 1` to prove the server is reachable.
pub struct TiberiusPool {
    pool: deadpool_tiberius::Pool,
    connected: AtomicBool,
}

impl std::fmt::Debug for TiberiusPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiberiusPool")
            .field("pool", &"<TiberiusPool>")
            .field("connected", &self.connected.load(Ordering::Acquire))
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

impl TiberiusPool {
    #[must_use]
    pub fn new(pool: deadpool_tiberius::Pool) -> Self {
        Self {
            pool,
            connected: AtomicBool::new(false),
        }
    }

    /// The underlying deadpool pool.
    #[must_use]
    pub fn inner(&self) -> &deadpool_tiberius::Pool {
        &self.pool
    }

    pub(crate) async fn checkout(&self) -> Result<PooledClient> {
        if self.pool.is_closed() {
            return Err(MssqlConnectorError::PoolClosed);
        }
        self.pool.get().await.map_err(|e| {
            self.connected.store(false, Ordering::Release);
            MssqlConnectorError::ConnectionError(format!("Failed to get SQL Server connection: {e}"))
        })
    }
}

#[async_trait]
impl PoolHandle for TiberiusPool {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.pool.is_closed()
    }

    async fn connect(&self) -> Result<()> {
        let mut conn = self.checkout().await?;
        let client: &mut MssqlClient = &mut conn;
        let ping = async {
            client.simple_query("SELECT 1").await?.into_results().await
        };
        ping.await.map_err(|e| {
            MssqlConnectorError::ConnectionError(format!("SQL Server connection error: {e}"))
        })?;
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(MssqlConnectorError::PoolClosed);
        }
        self.pool.close();
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl RequestFactory for TiberiusPool {
    fn request(&self) -> Box<dyn RequestHandle + '_> {
        Box::new(TiberiusRequest {
            target: RequestTarget::Pool(self),
            bindings: Bindings::default(),
        })
    }
}

impl TransactionFactory for TiberiusPool {
    fn transaction(&self) -> Box<dyn TransactionHandle + '_> {
        Box::new(TiberiusTransaction::new(self))
    }
}

pub(crate) enum RequestTarget<'a> {
    /// Checks out a pooled connection per execution.
    Pool(&'a TiberiusPool),
    /// Runs on the connection pinned by a transaction.
    Pinned(&'a mut MssqlClient),
    /// Transaction not begun or already finished.
    Unavailable,
}

/// Request scope over tiberius.
pub struct TiberiusRequest<'a> {
    pub(crate) target: RequestTarget<'a>,
    pub(crate) bindings: Bindings,
}

#[async_trait]
impl RequestHandle for TiberiusRequest<'_> {
    fn input(&mut self, param: QueryParam) -> Result<()> {
        self.bindings.push(param)
    }

    fn clear_parameters(&mut self) {
        self.bindings.clear();
    }

    async fn query(&mut self, sql: &str) -> Result<RawResult> {
        match &mut self.target {
            RequestTarget::Pool(pool) => {
                let mut conn = pool.checkout().await?;
                run_query(&mut conn, sql, &self.bindings).await
            }
            RequestTarget::Pinned(client) => run_query(client, sql, &self.bindings).await,
            RequestTarget::Unavailable => Err(MssqlConnectorError::TransactionError(
                "Request is bound to a transaction that is not active".to_string(),
            )),
        }
    }
}
