//! Catalog management service

use std::sync::Arc;

use validator::Validate;

use super::audit::{AuditLog, Auditor};
use crate::{
    error::{AppError, AppResult, ConflictError, RepositoryError, ValidationError},
    models::{
        audit::AuditEventType,
        book::{check_copy_counts, Book, BookFilter, NewBook, UpdateBook},
    },
    repository::BookRepository,
};

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BookRepository>,
    audit: Auditor,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BookRepository>, audit: Arc<dyn AuditLog>) -> Self {
        Self {
            books,
            audit: Auditor::new(audit),
        }
    }

    /// Register a new title
    pub async fn add_book(&self, book: NewBook) -> AppResult<Book> {
        book.validate()?;

        let exists = self
            .audit
            .check("add_book", self.books.isbn_exists(&book.isbn, None).await)
            .await?;
        if exists {
            return Err(ValidationError::DuplicateIsbn(book.isbn).into());
        }

        if book.category_id.is_none() {
            return Err(ValidationError::MissingCategory.into());
        }

        check_copy_counts(book.copies_total, book.copies_available)
            .map_err(ValidationError::InvalidCopyCount)?;

        let created = match self.books.create(&book).await {
            Ok(created) => created,
            // Lost the race against a concurrent insert of the same ISBN
            Err(RepositoryError::UniqueViolation { .. }) => {
                return Err(ValidationError::DuplicateIsbn(book.isbn).into())
            }
            Err(e) => return Err(self.audit.operation_failed("add_book", e).await),
        };

        tracing::info!("Catalog: added book id={} isbn={}", created.id, created.isbn);
        self.audit
            .record(
                AuditEventType::BookAdded,
                format!("Book added: {} (ISBN: {})", created.title, created.isbn),
            )
            .await;

        Ok(created)
    }

    /// Overwrite all mutable fields of an existing title
    pub async fn update_book(&self, id: i32, book: UpdateBook) -> AppResult<Book> {
        book.validate()?;

        self.get_book(id).await?;

        let taken = self
            .audit
            .check("update_book", self.books.isbn_exists(&book.isbn, Some(id)).await)
            .await?;
        if taken {
            return Err(ValidationError::DuplicateIsbn(book.isbn).into());
        }

        if book.category_id.is_none() {
            return Err(ValidationError::MissingCategory.into());
        }

        check_copy_counts(book.copies_total, book.copies_available)
            .map_err(ValidationError::InvalidCopyCount)?;

        let updated = match self.books.update(id, &book).await {
            Ok(Some(updated)) => updated,
            Ok(None) => return Err(not_found(id)),
            Err(RepositoryError::UniqueViolation { .. }) => {
                return Err(ValidationError::DuplicateIsbn(book.isbn).into())
            }
            Err(e) => return Err(self.audit.operation_failed("update_book", e).await),
        };

        self.audit
            .record(
                AuditEventType::BookUpdated,
                format!("Book updated: {}", updated.title),
            )
            .await;

        Ok(updated)
    }

    /// Remove a title; refused while any copy is on loan
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let book = self.get_book(id).await?;

        let on_loan = book.copies_on_loan();
        if on_loan > 0 {
            return Err(ConflictError::BookInUse { on_loan }.into());
        }

        let deleted = self
            .audit
            .check("delete_book", self.books.delete(id).await)
            .await?;
        if !deleted {
            return Err(not_found(id));
        }

        self.audit
            .record(
                AuditEventType::BookDeleted,
                format!("Book deleted: {} (ISBN: {})", book.title, book.isbn),
            )
            .await;

        Ok(())
    }

    /// Add `count` new copies, all immediately available
    pub async fn add_copies(&self, id: i32, count: i32) -> AppResult<Book> {
        if count <= 0 {
            return Err(ValidationError::InvalidCopyCount(format!(
                "number of copies to add must be positive ({})",
                count
            ))
            .into());
        }

        let added = self
            .audit
            .check("add_copies", self.books.add_copies(id, count).await)
            .await?;
        let book = match added {
            Some(book) => book,
            None => {
                let current = self.get_book(id).await?;
                return Err(too_many_copies(&current, count));
            }
        };

        self.audit
            .record(
                AuditEventType::CopiesAdded,
                format!("{} copie(s) added: {}", count, book.title),
            )
            .await;

        Ok(book)
    }

    /// Take one available copy out, e.g. when a loan starts
    pub async fn checkout_copy(&self, id: i32) -> AppResult<Book> {
        let book = self
            .adjust_available("checkout_copy", id, -1, ConflictError::NoCopyAvailable)
            .await?;

        self.audit
            .record(
                AuditEventType::CopyCheckedOut,
                format!(
                    "Copy checked out: {} ({} left)",
                    book.title, book.copies_available
                ),
            )
            .await;

        Ok(book)
    }

    /// Put one copy back on the shelf, e.g. when a loan ends
    pub async fn return_copy(&self, id: i32) -> AppResult<Book> {
        let book = self
            .adjust_available("return_copy", id, 1, ConflictError::NoCopyOnLoan)
            .await?;

        self.audit
            .record(
                AuditEventType::CopyReturned,
                format!(
                    "Copy returned: {} ({} available)",
                    book.title, book.copies_available
                ),
            )
            .await;

        Ok(book)
    }

    /// Shift available copies; on refusal, tell a missing book from an
    /// exhausted one by reading it back after the update.
    async fn adjust_available(
        &self,
        operation: &str,
        id: i32,
        delta: i32,
        refused: ConflictError,
    ) -> AppResult<Book> {
        let adjusted = self
            .audit
            .check(operation, self.books.adjust_available(id, delta).await)
            .await?;
        match adjusted {
            Some(book) => Ok(book),
            None => {
                self.get_book(id).await?;
                Err(refused.into())
            }
        }
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.audit
            .check("get_book", self.books.find_by_id(id).await)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn find_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        self.audit
            .check("find_by_isbn", self.books.find_by_isbn(isbn).await)
            .await
    }

    pub async fn all_books(&self) -> AppResult<Vec<Book>> {
        self.audit
            .check("all_books", self.books.find_all().await)
            .await
    }

    pub async fn search(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        self.audit
            .check("search_books", self.books.find_by_filter(filter).await)
            .await
    }

    pub async fn search_by_title(&self, title: &str) -> AppResult<Vec<Book>> {
        self.search(&BookFilter::title(title)).await
    }

    pub async fn search_by_author(&self, author: &str) -> AppResult<Vec<Book>> {
        self.search(&BookFilter::author(author)).await
    }

    pub async fn books_in_category(&self, category_id: i32) -> AppResult<Vec<Book>> {
        self.search(&BookFilter::category(category_id)).await
    }

    /// Titles with at least one copy on the shelf
    pub async fn available_books(&self) -> AppResult<Vec<Book>> {
        self.search(&BookFilter::available()).await
    }

    /// True iff the book exists and has an available copy
    pub async fn is_available(&self, id: i32) -> AppResult<bool> {
        let book = self
            .audit
            .check("is_available", self.books.find_by_id(id).await)
            .await?;
        Ok(book.map(|b| b.is_available()).unwrap_or(false))
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn too_many_copies(book: &Book, count: i32) -> AppError {
    ValidationError::InvalidCopyCount(format!(
        "adding {} copies to {} would exceed {}",
        count,
        book.copies_total,
        i32::MAX
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        repository::{
            memory::{MemoryAuditLog, MemoryBookRepository},
            MockBookRepository,
        },
        services::audit::MockAuditLog,
    };
    use chrono::Utc;

    fn new_book(isbn: &str, total: i32, available: i32) -> NewBook {
        NewBook {
            isbn: isbn.to_string(),
            title: "Vingt mille lieues sous les mers".to_string(),
            author: Some("Jules Verne".to_string()),
            publisher: Some("Hetzel".to_string()),
            publication_year: Some(1870),
            category_id: Some(1),
            copies_total: total,
            copies_available: available,
        }
    }

    fn service() -> (CatalogService, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let service = CatalogService::new(Arc::new(MemoryBookRepository::new()), audit.clone());
        (service, audit)
    }

    fn stored_book(id: i32) -> Book {
        let now = Utc::now();
        Book {
            id,
            isbn: "123".to_string(),
            title: "X".to_string(),
            author: None,
            publisher: None,
            publication_year: None,
            category_id: Some(1),
            copies_total: 1,
            copies_available: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_add_book_rejects_bad_counts() {
        let (service, audit) = service();

        let err = service.add_book(new_book("1", 1, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidCopyCount(_))
        ));
        let err = service.add_book(new_book("1", -1, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(audit.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_book_requires_isbn_and_title() {
        let (service, _) = service();

        let err = service.add_book(new_book("", 0, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ValidationError::InvalidField(_))));

        let mut book = new_book("42", 0, 0);
        book.title = String::new();
        assert!(service.add_book(book).await.is_err());
    }

    #[tokio::test]
    async fn test_add_copies_rejects_non_positive() {
        let (service, _) = service();
        let book = service.add_book(new_book("1", 2, 1)).await.unwrap();

        for count in [0, -3] {
            let err = service.add_copies(book.id, count).await.unwrap_err();
            assert!(matches!(
                err,
                AppError::Validation(ValidationError::InvalidCopyCount(_))
            ));
        }

        let book = service.get_book(book.id).await.unwrap();
        assert_eq!((book.copies_total, book.copies_available), (2, 1));
    }

    #[tokio::test]
    async fn test_add_copies_overflow_is_rejected() {
        let (service, audit) = service();
        let book = service.add_book(new_book("1", 5, 5)).await.unwrap();

        let err = service.add_copies(book.id, i32::MAX).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidCopyCount(_))
        ));

        let book = service.get_book(book.id).await.unwrap();
        assert_eq!((book.copies_total, book.copies_available), (5, 5));
        assert!(audit.messages(AuditEventType::CopiesAdded).await.is_empty());
        assert!(audit.messages(AuditEventType::OperationFailed).await.is_empty());
    }

    #[tokio::test]
    async fn test_adjust_on_vanished_book_is_not_found() {
        // Deleted between the caller's read and the update
        let mut books = MockBookRepository::new();
        books.expect_adjust_available().returning(|_, _| Ok(None));
        books.expect_find_by_id().returning(|_| Ok(None));

        let service = CatalogService::new(Arc::new(books), Arc::new(MemoryAuditLog::new()));
        assert_eq!(
            service.checkout_copy(3).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            service.return_copy(3).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_update_book_requires_category() {
        let (service, audit) = service();
        let book = service.add_book(new_book("1", 1, 1)).await.unwrap();

        let mut update = UpdateBook::from(&book);
        update.category_id = None;
        let err = service.update_book(book.id, update).await.unwrap_err();
        assert_eq!(err, AppError::Validation(ValidationError::MissingCategory));

        assert_eq!(service.get_book(book.id).await.unwrap().category_id, Some(1));
        assert!(audit.messages(AuditEventType::BookUpdated).await.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_and_return_stay_in_bounds() {
        let (service, audit) = service();
        let book = service.add_book(new_book("1", 1, 1)).await.unwrap();

        let book = service.checkout_copy(book.id).await.unwrap();
        assert_eq!(book.copies_available, 0);
        assert!(!service.is_available(book.id).await.unwrap());

        let err = service.checkout_copy(book.id).await.unwrap_err();
        assert_eq!(err, AppError::Conflict(ConflictError::NoCopyAvailable));

        let book = service.return_copy(book.id).await.unwrap();
        assert_eq!(book.copies_available, 1);

        let err = service.return_copy(book.id).await.unwrap_err();
        assert_eq!(err, AppError::Conflict(ConflictError::NoCopyOnLoan));

        assert_eq!(audit.messages(AuditEventType::CopyCheckedOut).await.len(), 1);
        assert_eq!(audit.messages(AuditEventType::CopyReturned).await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_book_rejects_taken_isbn() {
        let (service, _) = service();
        service.add_book(new_book("1", 0, 0)).await.unwrap();
        let second = service.add_book(new_book("2", 0, 0)).await.unwrap();

        let mut update = UpdateBook::from(&second);
        update.isbn = "1".to_string();
        let err = service.update_book(second.id, update).await.unwrap_err();
        assert_eq!(
            err,
            AppError::Validation(ValidationError::DuplicateIsbn("1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_update_book_rechecks_invariant() {
        let (service, _) = service();
        let book = service.add_book(new_book("1", 2, 2)).await.unwrap();

        let mut update = UpdateBook::from(&book);
        update.copies_available = 3;
        assert!(service.update_book(book.id, update).await.is_err());

        let mut update = UpdateBook::from(&book);
        update.title = "Le Tour du monde en quatre-vingts jours".to_string();
        let updated = service.update_book(book.id, update).await.unwrap();
        assert_eq!(updated.title, "Le Tour du monde en quatre-vingts jours");
    }

    #[tokio::test]
    async fn test_storage_failure_is_opaque_and_audited() {
        let mut books = MockBookRepository::new();
        books
            .expect_isbn_exists()
            .returning(|_, _| Err(RepositoryError::Database(sqlx::Error::PoolTimedOut)));

        let audit = Arc::new(MemoryAuditLog::new());
        let service = CatalogService::new(Arc::new(books), audit.clone());

        let err = service.add_book(new_book("1", 0, 0)).await.unwrap_err();
        assert_eq!(err, AppError::OperationFailed);

        let failures = audit.messages(AuditEventType::OperationFailed).await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("add_book failed"));
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_duplicate_isbn() {
        let mut books = MockBookRepository::new();
        books.expect_isbn_exists().returning(|_, _| Ok(false));
        books.expect_create().returning(|_| {
            Err(RepositoryError::UniqueViolation {
                constraint: "books_isbn_key".to_string(),
            })
        });

        let service = CatalogService::new(Arc::new(books), Arc::new(MemoryAuditLog::new()));
        let err = service.add_book(new_book("123", 0, 0)).await.unwrap_err();
        assert_eq!(
            err,
            AppError::Validation(ValidationError::DuplicateIsbn("123".to_string()))
        );
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_operation() {
        let mut audit = MockAuditLog::new();
        audit
            .expect_record()
            .returning(|_, _| Err(RepositoryError::Database(sqlx::Error::PoolClosed)));

        let service = CatalogService::new(Arc::new(MemoryBookRepository::new()), Arc::new(audit));
        let book = service.add_book(new_book("1", 1, 1)).await.unwrap();
        service.add_copies(book.id, 2).await.unwrap();
        service.checkout_copy(book.id).await.unwrap();
        service.return_copy(book.id).await.unwrap();
        service.delete_book(book.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_is_available_unknown_book() {
        let mut books = MockBookRepository::new();
        books.expect_find_by_id().returning(|id| {
            Ok(if id == 7 { Some(stored_book(7)) } else { None })
        });

        let service = CatalogService::new(Arc::new(books), Arc::new(MemoryAuditLog::new()));
        assert!(service.is_available(7).await.unwrap());
        assert!(!service.is_available(8).await.unwrap());
    }
}
