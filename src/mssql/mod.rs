// MSSQL module - the production driver over tiberius and deadpool-tiberius
//
// - config: Connection options and pool setup
// - params: Named parameter bindings and batch rendering
// - query: Batch execution and result extraction
// - pool: Pool, driver factory and request scopes
// - transaction: Transactions pinned to one pooled connection

pub mod config;
pub mod params;
pub mod pool;
pub mod query;
pub mod transaction;

use tokio::net::TcpStream;
use tokio_util::compat::Compat;

/// Type alias for SQL Server client
pub type MssqlClient = tiberius::Client<Compat<TcpStream>>;

pub use config::{MssqlOptions, MssqlOptionsBuilder, PoolOptions};
pub use params::Bindings;
pub use pool::{PooledClient, TiberiusDriver, TiberiusPool, TiberiusRequest};
pub use transaction::TiberiusTransaction;
