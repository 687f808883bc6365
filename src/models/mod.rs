//! Data models for Biblio

pub mod audit;
pub mod book;
pub mod user;

// Re-export commonly used types
pub use audit::{AuditEntry, AuditEventType};
pub use book::{Book, BookFilter, NewBook, UpdateBook};
pub use user::{CreateUser, Role, UpdateUser, User, UserCredentials};
