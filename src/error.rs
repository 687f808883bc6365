//! Error types for the Biblio services

use thiserror::Error;

/// Input rejected before any state change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ISBN {0} is already registered")]
    DuplicateIsbn(String),

    #[error("A category must be assigned")]
    MissingCategory,

    #[error("Login {0} is already used")]
    DuplicateLogin(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid copy count: {0}")]
    InvalidCopyCount(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),
}

/// Operation refused because of the current state of the entity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Book has {on_loan} copie(s) on loan")]
    BookInUse { on_loan: i32 },

    #[error("Current password is incorrect")]
    InvalidCredentials,

    #[error("No copy available")]
    NoCopyAvailable,

    #[error("No copy on loan")]
    NoCopyOnLoan,
}

/// Main service error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Carries no detail on purpose: unknown login, inactive account and
    /// wrong password are indistinguishable to the caller.
    #[error("Invalid login or password")]
    Authentication,

    /// Storage or hashing failure. The cause goes to the audit log only.
    #[error("Operation failed")]
    OperationFailed,
}

/// Coarse classification of [`AppError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authentication,
    OperationFailed,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Authentication => ErrorKind::Authentication,
            AppError::OperationFailed => ErrorKind::OperationFailed,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));

        let message = fields
            .into_iter()
            .map(|(field, errs)| {
                let reasons = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", field, reasons)
            })
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation(ValidationError::InvalidField(message))
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;

/// Error raised by repository implementations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write (ISBN, login)
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            if db.is_unique_violation() {
                return RepositoryError::UniqueViolation {
                    constraint: db.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        RepositoryError::Database(e)
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Failure of the password hashing backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Password hashing failed: {0}")]
pub struct HashingError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(AppError::Authentication.kind(), ErrorKind::Authentication);
        assert_eq!(
            AppError::from(ValidationError::MissingCategory).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::from(ConflictError::BookInUse { on_loan: 2 }).kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_authentication_message_is_uniform() {
        assert_eq!(AppError::Authentication.to_string(), "Invalid login or password");
    }

    #[test]
    fn test_field_errors_sorted_by_field() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("title", validator::ValidationError::new("length"));
        errors.add("isbn", validator::ValidationError::new("length"));
        errors.add("author", validator::ValidationError::new("required"));

        assert_eq!(
            AppError::from(errors),
            AppError::Validation(ValidationError::InvalidField(
                "author: required; isbn: length; title: length".to_string()
            ))
        );
    }

    #[test]
    fn test_sqlx_error_maps_to_database() {
        let err = RepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Database(_)));
    }
}
