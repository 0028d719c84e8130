//! Narrow interface to the host application.
//!
//! The host hands the connector a logger at construction and calls
//! [`Plugin::on_stop`] at shutdown. Nothing else about the host is assumed.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;

/// Error sink provided by the host.
pub trait HostLogger: Send + Sync {
    fn error(&self, entry: &dyn Display);
}

/// Default logger: forwards entries to `tracing` at error level.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    target_id: Option<String>,
}

impl TracingLogger {
    #[must_use]
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: Some(target_id.into()),
        }
    }
}

impl HostLogger for TracingLogger {
    fn error(&self, entry: &dyn Display) {
        match &self.target_id {
            Some(id) => tracing::error!(connector = %id, "{entry}"),
            None => tracing::error!("{entry}"),
        }
    }
}

/// What the host injects at construction.
#[derive(Clone)]
pub struct HostContext {
    logger: Arc<dyn HostLogger>,
}

impl HostContext {
    #[must_use]
    pub fn new(logger: Arc<dyn HostLogger>) -> Self {
        Self { logger }
    }

    /// Host context that logs through `tracing`.
    #[must_use]
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingLogger::default()))
    }

    #[must_use]
    pub fn logger(&self) -> &Arc<dyn HostLogger> {
        &self.logger
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("logger", &"<HostLogger>")
            .finish()
    }
}

/// Lifecycle hooks the host invokes on a registered connector.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;

    /// Called once by the host at shutdown.
    async fn on_stop(&self);
}
