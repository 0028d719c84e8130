use async_trait::async_trait;
use deadpool::managed::Object;
use tiberius::Query;

use super::params::Bindings;
use super::pool::{PooledClient, RequestTarget, TiberiusPool, TiberiusRequest};
use crate::driver::{RequestHandle, TransactionHandle};
use crate::error::{MssqlConnectorError, Result};

/// Transaction pinned to one pooled connection.
///
/// The connection is checked out on `begin` and returned to the pool after
/// `commit` or `rollback`. Dropping a transaction that is still open detaches
/// its connection from the pool instead, so the server rolls it back when the
/// connection closes.
pub struct TiberiusTransaction<'a> {
    pool: &'a TiberiusPool,
    conn: Option<PooledClient>,
    open: bool,
}

impl<'a> TiberiusTransaction<'a> {
    pub(crate) fn new(pool: &'a TiberiusPool) -> Self {
        Self {
            pool,
            conn: None,
            open: false,
        }
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(|| {
            MssqlConnectorError::TransactionError("Transaction has not begun".to_string())
        })?;
        if !self.open {
            return Err(MssqlConnectorError::TransactionError(
                "Transaction has already finished".to_string(),
            ));
        }
        Query::new(statement).execute(&mut **conn).await.map_err(|e| {
            MssqlConnectorError::TransactionError(format!("MSSQL {statement} error: {e}"))
        })?;
        self.open = false;
        self.conn = None;
        Ok(())
    }
}

#[async_trait]
impl TransactionHandle for TiberiusTransaction<'_> {
    async fn begin(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Err(MssqlConnectorError::TransactionError(
                "Transaction has already begun".to_string(),
            ));
        }
        let mut conn = self.pool.checkout().await?;
        Query::new("BEGIN TRANSACTION")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                MssqlConnectorError::TransactionError(format!("MSSQL begin transaction error: {e}"))
            })?;
        self.conn = Some(conn);
        self.open = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.finish("COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.finish("ROLLBACK TRANSACTION").await
    }

    fn request(&mut self) -> Box<dyn RequestHandle + '_> {
        let target = match self.conn.as_mut() {
            Some(conn) if self.open => RequestTarget::Pinned(&mut **conn),
            _ => RequestTarget::Unavailable,
        };
        Box::new(TiberiusRequest {
            target,
            bindings: Bindings::default(),
        })
    }
}

impl Drop for TiberiusTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Some(conn) = self.conn.take() {
                tracing::debug!("dropping open transaction; detaching its connection");
                drop(Object::take(conn));
            }
        }
    }
}
