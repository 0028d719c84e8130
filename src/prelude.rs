//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::driver::{
    PoolFactory, PoolHandle, RequestFactory, RequestHandle, TransactionFactory, TransactionHandle,
};
pub use crate::error::MssqlConnectorError;
pub use crate::host::{HostContext, HostLogger, Plugin, TracingLogger};
pub use crate::manager::{ConnectionManager, PoolState, TransactionQuery};
pub use crate::mssql::{MssqlOptions, MssqlOptionsBuilder, PoolOptions, TiberiusDriver};
pub use crate::results::{ColumnDescriptor, QueryResult, RawResult, Row};
pub use crate::types::{QueryParam, RowValues, SqlType};
