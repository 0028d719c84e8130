#![allow(dead_code)]

//! In-memory driver for exercising the connection manager without a server.
//!
//! Understands a handful of statements against one integer table `t`:
//! `SELECT 1 AS x`, `SELECT @p AS a, @q AS b`, `INSERT INTO t VALUES (1)` /
//! `INSERT INTO t VALUES (@v)`, `SELECT v FROM t`, `SELECT COUNT(*) AS n FROM t`
//! and `DELETE FROM t`. Anything else fails like a syntax error.

use std::fmt::Display;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mssql_connector::driver::{
    PoolFactory, PoolHandle, RequestFactory, RequestHandle, TransactionFactory, TransactionHandle,
};
use mssql_connector::mssql::MssqlOptions;
use mssql_connector::prelude::*;

#[derive(Debug, Default)]
pub struct DbState {
    pub connects: usize,
    pub closes: usize,
    pub connected: bool,
    pub closed: bool,
    pub fail_connect: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub table: Vec<i64>,
    pub next_tx: usize,
    /// `begin#1`, `commit#1`, `rollback#1`, `query#1:<sql>`, `query:<sql>`.
    pub events: Vec<String>,
    /// Parameter names bound for each executed statement.
    pub bound: Vec<Vec<String>>,
}

/// Shared handle to the fake server state.
#[derive(Debug, Default, Clone)]
pub struct FakeDb {
    state: Arc<Mutex<DbState>>,
}

impl FakeDb {
    pub fn with<R>(&self, f: impl FnOnce(&mut DbState) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn events(&self) -> Vec<String> {
        self.with(|s| s.events.clone())
    }

    pub fn table(&self) -> Vec<i64> {
        self.with(|s| s.table.clone())
    }
}

#[derive(Debug, Default, Clone)]
pub struct FakeDriver {
    pub db: FakeDb,
    /// Hand out one shared binding scope for every plain request, the way a
    /// reused request object behaves.
    pub reuse_request: bool,
}

impl FakeDriver {
    pub fn reusing_requests() -> Self {
        Self {
            reuse_request: true,
            ..Self::default()
        }
    }
}

impl PoolFactory for FakeDriver {
    type Pool = FakePool;

    fn create_pool(&self, options: &MssqlOptions) -> Result<FakePool, MssqlConnectorError> {
        options.validate()?;
        Ok(FakePool {
            db: self.db.clone(),
            shared_bindings: self
                .reuse_request
                .then(|| Arc::new(Mutex::new(Vec::new()))),
        })
    }
}

pub struct FakePool {
    pub db: FakeDb,
    shared_bindings: Option<Arc<Mutex<Vec<QueryParam>>>>,
}

#[async_trait]
impl PoolHandle for FakePool {
    fn is_connected(&self) -> bool {
        self.db.with(|s| s.connected)
    }

    async fn connect(&self) -> Result<(), MssqlConnectorError> {
        // give other tasks a chance to race the check-and-connect
        tokio::task::yield_now().await;
        self.db.with(|s| {
            if s.closed {
                return Err(MssqlConnectorError::ConnectionError(
                    "Connection is closed.".to_string(),
                ));
            }
            if s.fail_connect {
                return Err(MssqlConnectorError::ConnectionError(
                    "Login failed for user 'u'.".to_string(),
                ));
            }
            s.connects += 1;
            s.connected = true;
            Ok(())
        })
    }

    async fn close(&self) -> Result<(), MssqlConnectorError> {
        self.db.with(|s| {
            s.closes += 1;
            s.connected = false;
            s.closed = true;
        });
        Ok(())
    }
}

impl RequestFactory for FakePool {
    fn request(&self) -> Box<dyn RequestHandle + '_> {
        let bindings = self
            .shared_bindings
            .clone()
            .unwrap_or_else(|| Arc::new(Mutex::new(Vec::new())));
        Box::new(FakeRequest {
            db: &self.db,
            tx: None,
            bindings,
        })
    }
}

impl TransactionFactory for FakePool {
    fn transaction(&self) -> Box<dyn TransactionHandle + '_> {
        Box::new(FakeTransaction {
            db: &self.db,
            id: None,
            pending: Vec::new(),
            open: false,
        })
    }
}

pub struct FakeTransaction<'a> {
    db: &'a FakeDb,
    id: Option<usize>,
    pending: Vec<i64>,
    open: bool,
}

impl FakeTransaction<'_> {
    fn id(&self) -> Result<usize, MssqlConnectorError> {
        self.id.filter(|_| self.open).ok_or_else(|| {
            MssqlConnectorError::TransactionError("Transaction has not begun".to_string())
        })
    }
}

#[async_trait]
impl TransactionHandle for FakeTransaction<'_> {
    async fn begin(&mut self) -> Result<(), MssqlConnectorError> {
        let id = self.db.with(|s| {
            if !s.connected {
                return Err(MssqlConnectorError::ConnectionError(
                    "Connection is closed.".to_string(),
                ));
            }
            s.next_tx += 1;
            s.events.push(format!("begin#{}", s.next_tx));
            Ok(s.next_tx)
        })?;
        self.id = Some(id);
        self.open = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), MssqlConnectorError> {
        let id = self.id()?;
        let pending = std::mem::take(&mut self.pending);
        self.db.with(|s| {
            if s.fail_commit {
                return Err(MssqlConnectorError::TransactionError(
                    "commit refused".to_string(),
                ));
            }
            s.events.push(format!("commit#{id}"));
            s.table.extend(pending);
            Ok(())
        })?;
        self.open = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), MssqlConnectorError> {
        let id = self.id()?;
        self.db.with(|s| {
            if s.fail_rollback {
                return Err(MssqlConnectorError::TransactionError(
                    "rollback refused".to_string(),
                ));
            }
            s.events.push(format!("rollback#{id}"));
            Ok(())
        })?;
        self.pending.clear();
        self.open = false;
        Ok(())
    }

    fn request(&mut self) -> Box<dyn RequestHandle + '_> {
        let tx = self.id.filter(|_| self.open).map(|id| (id, &mut self.pending));
        Box::new(FakeRequest {
            db: self.db,
            tx,
            bindings: Arc::new(Mutex::new(Vec::new())),
        })
    }
}

pub struct FakeRequest<'a> {
    db: &'a FakeDb,
    tx: Option<(usize, &'a mut Vec<i64>)>,
    bindings: Arc<Mutex<Vec<QueryParam>>>,
}

#[async_trait]
impl RequestHandle for FakeRequest<'_> {
    fn input(&mut self, param: QueryParam) -> Result<(), MssqlConnectorError> {
        let mut bindings = self.bindings.lock().unwrap();
        if bindings.iter().any(|p| p.name() == param.name()) {
            return Err(MssqlConnectorError::ParameterError(format!(
                "The parameter name {} has already been declared. Parameter names must be unique",
                param.name()
            )));
        }
        bindings.push(param);
        Ok(())
    }

    fn clear_parameters(&mut self) {
        self.bindings.lock().unwrap().clear();
    }

    async fn query(&mut self, sql: &str) -> Result<RawResult, MssqlConnectorError> {
        let params = self.bindings.lock().unwrap().clone();
        let tx_id = self.tx.as_ref().map(|(id, _)| *id);
        let db = self.db;
        let mut committed = db.with(|s| {
            if !s.connected {
                return Err(MssqlConnectorError::ConnectionError(
                    "Connection is closed.".to_string(),
                ));
            }
            s.events.push(match tx_id {
                Some(id) => format!("query#{id}:{sql}"),
                None => format!("query:{sql}"),
            });
            s.bound
                .push(params.iter().map(|p| p.name().to_string()).collect());
            Ok(s.table.clone())
        })?;

        let pending = self.tx.as_mut().map(|(_, pending)| &mut **pending);
        let outcome = execute(sql, &params, &mut committed, pending)?;
        if tx_id.is_none() {
            db.with(|s| s.table = committed);
        }
        Ok(outcome)
    }
}

fn lookup(params: &[QueryParam], name: &str) -> Result<RowValues, MssqlConnectorError> {
    params
        .iter()
        .find(|p| p.name() == name)
        .map(|p| p.value().clone())
        .ok_or_else(|| {
            MssqlConnectorError::ExecutionError(format!(
                "Must declare the scalar variable \"@{name}\"."
            ))
        })
}

fn recordset(columns: &[&str], rows: Vec<Vec<RowValues>>) -> RawResult {
    let names = Arc::new(columns.iter().map(|c| (*c).to_string()).collect::<Vec<_>>());
    let count = rows.len() as u64;
    RawResult {
        columns: Some(
            columns
                .iter()
                .enumerate()
                .map(|(i, c)| ColumnDescriptor::new(i, *c, "Int8"))
                .collect(),
        ),
        recordset: Some(
            rows.into_iter()
                .map(|values| Row::new(names.clone(), values))
                .collect(),
        ),
        rows_affected: vec![count],
    }
}

fn syntax_error(sql: &str) -> MssqlConnectorError {
    MssqlConnectorError::ExecutionError(format!("Incorrect syntax near '{sql}'."))
}

fn execute(
    sql: &str,
    params: &[QueryParam],
    committed: &mut Vec<i64>,
    pending: Option<&mut Vec<i64>>,
) -> Result<RawResult, MssqlConnectorError> {
    let visible = || {
        let mut all = committed.clone();
        if let Some(p) = pending.as_deref() {
            all.extend(p.iter().copied());
        }
        all
    };

    if sql == "SELECT 1 AS x" {
        return Ok(recordset(&["x"], vec![vec![RowValues::Int(1)]]));
    }
    if sql == "SELECT COUNT(*) AS n FROM t" {
        let n = visible().len() as i64;
        return Ok(recordset(&["n"], vec![vec![RowValues::Int(n)]]));
    }
    if sql == "SELECT v FROM t" {
        let rows = visible().into_iter().map(|v| vec![RowValues::Int(v)]).collect();
        return Ok(recordset(&["v"], rows));
    }
    if sql == "DELETE FROM t" {
        let n = committed.len() as u64;
        committed.clear();
        return Ok(RawResult {
            columns: None,
            recordset: None,
            rows_affected: vec![n],
        });
    }
    if let Some(rest) = sql.strip_prefix("INSERT INTO t VALUES (") {
        let arg = rest.strip_suffix(')').ok_or_else(|| syntax_error(sql))?;
        let value = match arg.strip_prefix('@') {
            Some(name) => lookup(params, name)?
                .as_int()
                .copied()
                .ok_or_else(|| syntax_error(sql))?,
            None => arg.parse::<i64>().map_err(|_| syntax_error(sql))?,
        };
        match pending {
            Some(p) => p.push(value),
            None => committed.push(value),
        }
        return Ok(RawResult {
            columns: None,
            recordset: None,
            rows_affected: vec![1],
        });
    }
    if let Some(list) = sql.strip_prefix("SELECT @") {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for item in format!("@{list}").split(',') {
            let (name, alias) = item
                .trim()
                .strip_prefix('@')
                .and_then(|i| i.split_once(" AS "))
                .ok_or_else(|| syntax_error(sql))?;
            values.push(lookup(params, name.trim())?);
            columns.push(alias.trim().to_string());
        }
        let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
        return Ok(recordset(&cols, vec![values]));
    }
    Err(syntax_error(sql))
}

/// Host logger that keeps every entry.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

impl HostLogger for RecordingLogger {
    fn error(&self, entry: &dyn Display) {
        self.entries.lock().unwrap().push(entry.to_string());
    }
}

pub fn options() -> MssqlOptions {
    MssqlOptions::builder("h", "d", "u", "p").finish()
}

/// Manager over a fake driver plus the handles tests inspect.
pub fn manager_with(
    driver: FakeDriver,
) -> (ConnectionManager<FakeDriver>, FakeDb, Arc<RecordingLogger>) {
    let db = driver.db.clone();
    let logger = Arc::new(RecordingLogger::default());
    let host = HostContext::new(logger.clone());
    let manager = ConnectionManager::with_driver(driver, &host, Some(options()), Some("fake"))
        .expect("fake manager builds");
    (manager, db, logger)
}

pub fn manager() -> (ConnectionManager<FakeDriver>, FakeDb, Arc<RecordingLogger>) {
    manager_with(FakeDriver::default())
}
