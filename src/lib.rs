//! SQL Server connector for plugin hosts.
//!
//! A [`ConnectionManager`] owns one connection pool, connects it lazily on
//! first use, runs parameterized queries on fresh request scopes and groups
//! queries into scoped transactions. The database driver sits behind the
//! traits in [`driver`]; [`mssql`] provides the tiberius implementation.

pub mod driver;
pub mod error;
pub mod host;
pub mod manager;
pub mod mssql;
pub mod prelude;
pub mod results;
pub mod types;

pub use error::{MssqlConnectorError, Result};
pub use host::{HostContext, HostLogger, Plugin};
pub use manager::{ConnectionManager, PoolState, TransactionQuery};
pub use results::{ColumnDescriptor, QueryResult, Row};
pub use types::{QueryParam, RowValues, SqlType};
