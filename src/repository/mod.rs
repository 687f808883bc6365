//! Repository layer: storage ports and their implementations

pub mod audit;
pub mod books;
pub mod memory;
pub mod users;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::RepositoryResult,
    models::{
        book::{Book, BookFilter, NewBook, UpdateBook},
        user::{NewUserRecord, UpdateUserRecord, User, UserCredentials},
    },
};

/// Storage port for books
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Check if an ISBN is already registered, optionally ignoring one book
    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> RepositoryResult<bool>;

    async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<Book>>;

    async fn find_by_isbn(&self, isbn: &str) -> RepositoryResult<Option<Book>>;

    /// All books ordered by title, then id
    async fn find_all(&self) -> RepositoryResult<Vec<Book>>;

    /// Ordered like [`BookRepository::find_all`]
    async fn find_by_filter(&self, filter: &BookFilter) -> RepositoryResult<Vec<Book>>;

    async fn create(&self, book: &NewBook) -> RepositoryResult<Book>;

    /// Overwrite all mutable fields. `None` if the book does not exist.
    async fn update(&self, id: i32, book: &UpdateBook) -> RepositoryResult<Option<Book>>;

    /// Returns false if nothing was deleted
    async fn delete(&self, id: i32) -> RepositoryResult<bool>;

    /// Atomically add `count` to both total and available copies.
    /// `None` if the book does not exist or the new total would overflow.
    async fn add_copies(&self, id: i32, count: i32) -> RepositoryResult<Option<Book>>;

    /// Atomically shift available copies by `delta`.
    /// `None` if the book does not exist or the result would leave `0..=total`.
    async fn adjust_available(&self, id: i32, delta: i32) -> RepositoryResult<Option<Book>>;
}

/// Storage port for user accounts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Case-insensitive login lookup, optionally ignoring one user
    async fn login_exists(&self, login: &str, exclude_id: Option<i32>) -> RepositoryResult<bool>;

    async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<User>>;

    async fn find_by_login(&self, login: &str) -> RepositoryResult<Option<User>>;

    async fn find_credentials_by_id(&self, id: i32) -> RepositoryResult<Option<UserCredentials>>;

    async fn find_credentials_by_login(&self, login: &str) -> RepositoryResult<Option<UserCredentials>>;

    async fn find_all(&self) -> RepositoryResult<Vec<User>>;

    async fn create(&self, user: &NewUserRecord) -> RepositoryResult<User>;

    async fn update(&self, id: i32, user: &UpdateUserRecord) -> RepositoryResult<Option<User>>;

    async fn set_active(&self, id: i32, active: bool) -> RepositoryResult<Option<User>>;

    /// Returns false if the user does not exist
    async fn set_password_hash(&self, id: i32, password_hash: &str) -> RepositoryResult<bool>;
}

/// PostgreSQL repositories sharing one connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::PgBookRepository,
    pub users: users::PgUserRepository,
    pub audit: audit::PgAuditLog,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: books::PgBookRepository::new(pool.clone()),
            users: users::PgUserRepository::new(pool.clone()),
            audit: audit::PgAuditLog::new(pool.clone()),
            pool,
        }
    }
}
