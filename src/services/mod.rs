//! Business logic services

pub mod audit;
pub mod catalog;
pub mod hashing;
pub mod identity;

use std::sync::Arc;

use crate::{config::HashingConfig, error::HashingError, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub identity: identity::IdentityService,
}

impl Services {
    /// Create all services on top of the PostgreSQL repositories
    pub fn new(repository: Repository, hashing: &HashingConfig) -> Result<Self, HashingError> {
        let audit: Arc<dyn audit::AuditLog> = Arc::new(repository.audit.clone());
        let hasher = Arc::new(hashing::Argon2Hasher::new(hashing)?);

        Ok(Self {
            catalog: catalog::CatalogService::new(Arc::new(repository.books.clone()), audit.clone()),
            identity: identity::IdentityService::new(Arc::new(repository.users), hasher, audit),
        })
    }
}
