//! Driver abstraction the connection manager is written against.
//!
//! The production implementation lives in [`crate::mssql`]; tests substitute
//! an in-memory fake.

use async_trait::async_trait;

use crate::error::Result;
use crate::mssql::MssqlOptions;
use crate::results::RawResult;
use crate::types::QueryParam;

/// One statement execution scope with its own parameter bindings.
#[async_trait]
pub trait RequestHandle: Send {
    /// Bind a parameter by name.
    ///
    /// # Errors
    /// Returns `ParameterError` if the name is invalid or already bound on
    /// this request.
    fn input(&mut self, param: QueryParam) -> Result<()>;

    /// Drop every binding made so far.
    fn clear_parameters(&mut self);

    /// Execute `sql` with the current bindings.
    ///
    /// # Errors
    /// Returns an error if execution fails.
    async fn query(&mut self, sql: &str) -> Result<RawResult>;
}

/// Hands out request scopes that are not bound to a transaction.
pub trait RequestFactory {
    fn request(&self) -> Box<dyn RequestHandle + '_>;
}

/// One transactional context. Requests created from it run inside it.
#[async_trait]
pub trait TransactionHandle: Send {
    /// # Errors
    /// Returns an error if the transaction cannot be started.
    async fn begin(&mut self) -> Result<()>;

    /// # Errors
    /// Returns an error if the commit fails.
    async fn commit(&mut self) -> Result<()>;

    /// # Errors
    /// Returns an error if the rollback fails.
    async fn rollback(&mut self) -> Result<()>;

    /// A fresh request scope bound to this transaction.
    fn request(&mut self) -> Box<dyn RequestHandle + '_>;
}

/// Hands out new, unstarted transactions.
pub trait TransactionFactory {
    fn transaction(&self) -> Box<dyn TransactionHandle + '_>;
}

/// A connection pool as seen by the manager.
#[async_trait]
pub trait PoolHandle: RequestFactory + TransactionFactory + Send + Sync {
    fn is_connected(&self) -> bool;

    /// # Errors
    /// Returns an error if no connection can be established.
    async fn connect(&self) -> Result<()>;

    /// # Errors
    /// Returns an error if the driver refuses to close the pool.
    async fn close(&self) -> Result<()>;
}

/// Builds an unconnected pool from options.
pub trait PoolFactory: Send + Sync {
    type Pool: PoolHandle;

    /// # Errors
    /// Returns `ConfigError` if the options cannot be turned into a pool.
    fn create_pool(&self, options: &MssqlOptions) -> Result<Self::Pool>;
}
