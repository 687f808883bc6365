//! Audit log port

use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult, RepositoryResult},
    models::audit::AuditEventType,
};

/// Append-only sink for state changes and security events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event_type: AuditEventType, message: String) -> RepositoryResult<()>;
}

/// Writes audit events to the `audit` tracing target
#[derive(Clone, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, event_type: AuditEventType, message: String) -> RepositoryResult<()> {
        tracing::info!(target: "audit", event_type = event_type.as_str(), "{}", message);
        Ok(())
    }
}

/// Service-side handle on the audit log.
///
/// Recording never fails from the caller's point of view: errors of the
/// underlying sink are logged and dropped.
#[derive(Clone)]
pub struct Auditor {
    log: Arc<dyn AuditLog>,
}

impl Auditor {
    pub fn new(log: Arc<dyn AuditLog>) -> Self {
        Self { log }
    }

    pub async fn record(&self, event_type: AuditEventType, message: impl Into<String>) {
        let message = message.into();
        if let Err(e) = self.log.record(event_type, message).await {
            tracing::warn!("Failed to record audit event {}: {}", event_type, e);
        }
    }

    /// Report an unexpected failure. The cause is kept out of the returned error.
    pub async fn operation_failed(&self, operation: &str, cause: impl Display) -> AppError {
        tracing::error!("{} failed: {}", operation, cause);
        self.record(
            AuditEventType::OperationFailed,
            format!("{} failed: {}", operation, cause),
        )
        .await;
        AppError::OperationFailed
    }

    /// Pass a storage result through, turning errors into `OperationFailed`
    pub async fn check<T, E: Display>(&self, operation: &str, result: Result<T, E>) -> AppResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.operation_failed(operation, e).await),
        }
    }
}
