//! Biblio Library Catalog and Identity Services
//!
//! Book copy-count management and credential-based identity management for
//! a library, on top of pluggable repositories and an audit log.

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult, ErrorKind};
pub use services::{catalog::CatalogService, identity::IdentityService, Services};
