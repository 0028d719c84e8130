use std::time::Duration;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{MssqlConnectorError, Result};

pub(crate) const DEFAULT_PORT: u16 = 1433;
pub(crate) const DEFAULT_MAX_SIZE: usize = 10;

/// Pool sizing options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolOptions {
    #[serde(alias = "max")]
    pub max_size: usize,
    /// Seconds to wait for a free connection before failing.
    pub acquire_timeout_secs: Option<f64>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            acquire_timeout_secs: None,
        }
    }
}

/// Options for configuring an MSSQL pool.
///
/// Deserializes from the host's JSON configuration:
/// `{"server": "h", "database": "d", "user": "u", "password": "p"}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MssqlOptions {
    pub server: String,
    pub database: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_trust")]
    pub trust_server_certificate: bool,
    #[serde(default)]
    pub pool: PoolOptions,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_trust() -> bool {
    true
}

impl MssqlOptions {
    #[must_use]
    pub fn new(server: String, database: String, user: String, password: String) -> Self {
        Self {
            server,
            database,
            user,
            password,
            port: DEFAULT_PORT,
            trust_server_certificate: true,
            pool: PoolOptions::default(),
        }
    }

    #[must_use]
    pub fn builder(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> MssqlOptionsBuilder {
        MssqlOptionsBuilder::new(server, database, user, password)
    }

    /// Parse the host's opaque configuration object.
    ///
    /// # Errors
    /// Returns `ConfigError` for `null` (no configuration) or for an object
    /// missing required fields.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        if value.is_null() {
            return Err(MssqlConnectorError::ConfigError(
                "Empty connection config".to_string(),
            ));
        }
        let opts: MssqlOptions = serde_json::from_value(value).map_err(|e| {
            MssqlConnectorError::ConfigError(format!("Invalid connection config: {e}"))
        })?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns `ConfigError` if the server name is blank or the pool size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(MssqlConnectorError::ConfigError(
                "server must not be empty".to_string(),
            ));
        }
        if self.pool.max_size == 0 {
            return Err(MssqlConnectorError::ConfigError(
                "pool max size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for MSSQL options.
#[derive(Debug, Clone)]
pub struct MssqlOptionsBuilder {
    opts: MssqlOptions,
}

impl MssqlOptionsBuilder {
    #[must_use]
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            opts: MssqlOptions::new(server.into(), database.into(), user.into(), password.into()),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.opts.trust_server_certificate = trust;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.opts.pool.max_size = max_size;
        self
    }

    #[must_use]
    pub fn acquire_timeout_secs(mut self, secs: f64) -> Self {
        self.opts.pool.acquire_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlOptions {
        self.opts
    }
}

fn acquire_timeout(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| {
        MssqlConnectorError::ConfigError(format!("Invalid pool acquire timeout {secs}: {e}"))
    })
}

/// Turn options into an unconnected deadpool-tiberius pool.
pub(crate) fn build_pool(opts: &MssqlOptions) -> Result<deadpool_tiberius::Pool> {
    let mut manager = deadpool_tiberius::Manager::new()
        .host(&opts.server)
        .port(opts.port)
        .basic_authentication(&opts.user, &opts.password)
        .database(&opts.database)
        .max_size(opts.pool.max_size);
    if opts.trust_server_certificate {
        manager = manager.trust_cert();
    }
    if let Some(secs) = opts.pool.acquire_timeout_secs {
        manager = manager.wait_timeout(acquire_timeout(secs)?);
    }
    manager.create_pool().map_err(|e| {
        MssqlConnectorError::ConfigError(format!("Failed to configure SQL Server pool: {e}"))
    })
}
