//! Audit log stored in PostgreSQL

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::RepositoryResult,
    models::audit::AuditEventType,
    services::audit::AuditLog,
};

#[derive(Clone)]
pub struct PgAuditLog {
    pool: Pool<Postgres>,
}

impl PgAuditLog {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn record(&self, event_type: AuditEventType, message: String) -> RepositoryResult<()> {
        sqlx::query("INSERT INTO audit_log (event_type, message, created_at) VALUES ($1, $2, $3)")
            .bind(event_type.as_str())
            .bind(&message)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
