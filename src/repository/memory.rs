//! In-memory repositories and audit log.
//!
//! Same contracts as the PostgreSQL implementations, including uniqueness of
//! ISBN and login, so services can be exercised without a database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{BookRepository, UserRepository};
use crate::{
    error::{RepositoryError, RepositoryResult},
    models::{
        audit::{AuditEntry, AuditEventType},
        book::{Book, BookFilter, NewBook, UpdateBook},
        user::{NewUserRecord, UpdateUserRecord, User, UserCredentials},
    },
    services::audit::AuditLog,
};

struct Table<T> {
    next_id: i32,
    rows: BTreeMap<i32, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryBookRepository {
    table: Mutex<Table<Book>>,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> RepositoryResult<bool> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != exclude_id))
    }

    async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<Book>> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str) -> RepositoryResult<Option<Book>> {
        let table = self.table.lock().await;
        Ok(table.rows.values().find(|b| b.isbn == isbn).cloned())
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Book>> {
        self.find_by_filter(&BookFilter::default()).await
    }

    async fn find_by_filter(&self, filter: &BookFilter) -> RepositoryResult<Vec<Book>> {
        let table = self.table.lock().await;
        let mut books: Vec<Book> = table
            .rows
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        // Same order as `ORDER BY title, id`
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn create(&self, book: &NewBook) -> RepositoryResult<Book> {
        let mut table = self.table.lock().await;
        if table.rows.values().any(|b| b.isbn == book.isbn) {
            return Err(RepositoryError::UniqueViolation {
                constraint: "books_isbn_key".to_string(),
            });
        }

        let now = Utc::now();
        let id = table.allocate_id();
        let created = Book {
            id,
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            publisher: book.publisher.clone(),
            publication_year: book.publication_year,
            category_id: book.category_id,
            copies_total: book.copies_total,
            copies_available: book.copies_available,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, book: &UpdateBook) -> RepositoryResult<Option<Book>> {
        let mut table = self.table.lock().await;
        if table.rows.values().any(|b| b.isbn == book.isbn && b.id != id) {
            return Err(RepositoryError::UniqueViolation {
                constraint: "books_isbn_key".to_string(),
            });
        }

        let Some(existing) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        existing.isbn = book.isbn.clone();
        existing.title = book.title.clone();
        existing.author = book.author.clone();
        existing.publisher = book.publisher.clone();
        existing.publication_year = book.publication_year;
        existing.category_id = book.category_id;
        existing.copies_total = book.copies_total;
        existing.copies_available = book.copies_available;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: i32) -> RepositoryResult<bool> {
        Ok(self.table.lock().await.rows.remove(&id).is_some())
    }

    async fn add_copies(&self, id: i32, count: i32) -> RepositoryResult<Option<Book>> {
        let mut table = self.table.lock().await;
        let Some(book) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        let (Some(total), Some(available)) = (
            book.copies_total.checked_add(count),
            book.copies_available.checked_add(count),
        ) else {
            return Ok(None);
        };
        book.copies_total = total;
        book.copies_available = available;
        book.updated_at = Utc::now();
        Ok(Some(book.clone()))
    }

    async fn adjust_available(&self, id: i32, delta: i32) -> RepositoryResult<Option<Book>> {
        let mut table = self.table.lock().await;
        let Some(book) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        let available = book.copies_available + delta;
        if available < 0 || available > book.copies_total {
            return Ok(None);
        }
        book.copies_available = available;
        book.updated_at = Utc::now();
        Ok(Some(book.clone()))
    }
}

#[derive(Default)]
pub struct MemoryUserRepository {
    table: Mutex<Table<UserCredentials>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same_login(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn login_exists(&self, login: &str, exclude_id: Option<i32>) -> RepositoryResult<bool> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .any(|c| same_login(&c.user.login, login) && Some(c.user.id) != exclude_id))
    }

    async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<User>> {
        Ok(self.table.lock().await.rows.get(&id).map(|c| c.user.clone()))
    }

    async fn find_by_login(&self, login: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .find_credentials_by_login(login)
            .await?
            .map(|c| c.user))
    }

    async fn find_credentials_by_id(&self, id: i32) -> RepositoryResult<Option<UserCredentials>> {
        Ok(self.table.lock().await.rows.get(&id).cloned())
    }

    async fn find_credentials_by_login(&self, login: &str) -> RepositoryResult<Option<UserCredentials>> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .find(|c| same_login(&c.user.login, login))
            .cloned())
    }

    async fn find_all(&self) -> RepositoryResult<Vec<User>> {
        let table = self.table.lock().await;
        let mut users: Vec<User> = table.rows.values().map(|c| c.user.clone()).collect();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(users)
    }

    async fn create(&self, user: &NewUserRecord) -> RepositoryResult<User> {
        let mut table = self.table.lock().await;
        if table.rows.values().any(|c| same_login(&c.user.login, &user.login)) {
            return Err(RepositoryError::UniqueViolation {
                constraint: "users_login_key".to_string(),
            });
        }

        let now = Utc::now();
        let id = table.allocate_id();
        let created = User {
            id,
            login: user.login.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            role: user.role,
            active: user.active,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(
            id,
            UserCredentials {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );
        Ok(created)
    }

    async fn update(&self, id: i32, user: &UpdateUserRecord) -> RepositoryResult<Option<User>> {
        let mut table = self.table.lock().await;
        if table
            .rows
            .values()
            .any(|c| same_login(&c.user.login, &user.login) && c.user.id != id)
        {
            return Err(RepositoryError::UniqueViolation {
                constraint: "users_login_key".to_string(),
            });
        }

        Ok(table.rows.get_mut(&id).map(|c| {
            c.user.login = user.login.clone();
            c.user.firstname = user.firstname.clone();
            c.user.lastname = user.lastname.clone();
            c.user.email = user.email.clone();
            c.user.role = user.role;
            c.user.updated_at = Utc::now();
            c.user.clone()
        }))
    }

    async fn set_active(&self, id: i32, active: bool) -> RepositoryResult<Option<User>> {
        let mut table = self.table.lock().await;
        Ok(table.rows.get_mut(&id).map(|c| {
            c.user.active = active;
            c.user.updated_at = Utc::now();
            c.user.clone()
        }))
    }

    async fn set_password_hash(&self, id: i32, password_hash: &str) -> RepositoryResult<bool> {
        let mut table = self.table.lock().await;
        Ok(match table.rows.get_mut(&id) {
            Some(c) => {
                c.password_hash = password_hash.to_string();
                c.user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }
}

/// Audit log kept in memory, inspectable by tests
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }

    /// Messages recorded under one event type, oldest first
    pub async fn messages(&self, event_type: AuditEventType) -> Vec<String> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.event_type == event_type.as_str())
            .map(|e| e.message.clone())
            .collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, event_type: AuditEventType, message: String) -> RepositoryResult<()> {
        let mut entries = self.entries.lock().await;
        let id = entries.len() as i64 + 1;
        entries.push(AuditEntry {
            id,
            event_type: event_type.as_str().to_string(),
            message,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn new_book(isbn: &str, total: i32, available: i32) -> NewBook {
        NewBook {
            isbn: isbn.to_string(),
            title: "Les Misérables".to_string(),
            author: Some("Victor Hugo".to_string()),
            publisher: None,
            publication_year: None,
            category_id: Some(1),
            copies_total: total,
            copies_available: available,
        }
    }

    #[tokio::test]
    async fn test_book_isbn_unique() {
        let repo = MemoryBookRepository::new();
        repo.create(&new_book("111", 1, 1)).await.unwrap();
        let err = repo.create(&new_book("111", 1, 1)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_adjust_available_bounds() {
        let repo = MemoryBookRepository::new();
        let book = repo.create(&new_book("111", 2, 1)).await.unwrap();

        let book = repo.adjust_available(book.id, 1).await.unwrap().unwrap();
        assert_eq!(book.copies_available, 2);
        assert!(repo.adjust_available(book.id, 1).await.unwrap().is_none());

        repo.adjust_available(book.id, -2).await.unwrap().unwrap();
        assert!(repo.adjust_available(book.id, -1).await.unwrap().is_none());
        assert!(repo.adjust_available(999, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_copies_overflow_leaves_counts() {
        let repo = MemoryBookRepository::new();
        let book = repo.create(&new_book("111", 5, 5)).await.unwrap();

        assert!(repo.add_copies(book.id, i32::MAX).await.unwrap().is_none());
        let book = repo.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!((book.copies_total, book.copies_available), (5, 5));
    }

    #[tokio::test]
    async fn test_books_ordered_by_title() {
        let repo = MemoryBookRepository::new();
        let mut second = new_book("222", 1, 1);
        second.title = "Germinal".to_string();
        repo.create(&new_book("111", 1, 1)).await.unwrap();
        repo.create(&second).await.unwrap();

        let titles: Vec<String> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["Germinal", "Les Misérables"]);
    }

    #[tokio::test]
    async fn test_login_case_insensitive() {
        let repo = MemoryUserRepository::new();
        let record = NewUserRecord {
            login: "Alice".to_string(),
            firstname: None,
            lastname: None,
            email: None,
            role: Role::User,
            active: true,
            password_hash: "hash".to_string(),
        };
        let user = repo.create(&record).await.unwrap();

        assert!(repo.login_exists("alice", None).await.unwrap());
        assert!(!repo.login_exists("alice", Some(user.id)).await.unwrap());
        assert_eq!(repo.find_by_login("ALICE").await.unwrap().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_audit_messages_by_type() {
        let log = MemoryAuditLog::new();
        log.record(AuditEventType::BookAdded, "a".to_string()).await.unwrap();
        log.record(AuditEventType::BookDeleted, "b".to_string()).await.unwrap();
        log.record(AuditEventType::BookAdded, "c".to_string()).await.unwrap();

        assert_eq!(log.messages(AuditEventType::BookAdded).await, vec!["a", "c"]);
        assert_eq!(log.entries().await.len(), 3);
    }
}
