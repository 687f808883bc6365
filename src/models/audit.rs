//! Audit log model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of audited event; the string code is what gets stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    BookAdded,
    BookUpdated,
    BookDeleted,
    CopiesAdded,
    CopyCheckedOut,
    CopyReturned,
    UserCreated,
    UserUpdated,
    PasswordChanged,
    UserActivated,
    UserDeactivated,
    AuthenticationSucceeded,
    AuthenticationFailed,
    OperationFailed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::BookAdded => "BOOK_ADDED",
            AuditEventType::BookUpdated => "BOOK_UPDATED",
            AuditEventType::BookDeleted => "BOOK_DELETED",
            AuditEventType::CopiesAdded => "COPIES_ADDED",
            AuditEventType::CopyCheckedOut => "COPY_CHECKED_OUT",
            AuditEventType::CopyReturned => "COPY_RETURNED",
            AuditEventType::UserCreated => "USER_CREATED",
            AuditEventType::UserUpdated => "USER_UPDATED",
            AuditEventType::PasswordChanged => "PASSWORD_CHANGED",
            AuditEventType::UserActivated => "USER_ACTIVATED",
            AuditEventType::UserDeactivated => "USER_DEACTIVATED",
            AuditEventType::AuthenticationSucceeded => "AUTHENTICATION_SUCCEEDED",
            AuditEventType::AuthenticationFailed => "AUTHENTICATION_FAILED",
            AuditEventType::OperationFailed => "OPERATION_FAILED",
        }
    }
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored audit record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub event_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
