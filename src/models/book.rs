//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Catalog entry for one title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i16>,
    /// Weak reference to the category, never owned
    pub category_id: Option<i32>,
    pub copies_total: i32,
    pub copies_available: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Copies currently lent out
    pub fn copies_on_loan(&self) -> i32 {
        self.copies_total - self.copies_available
    }

    pub fn is_available(&self) -> bool {
        self.copies_available > 0
    }
}

/// Checks `0 <= available <= total`
pub fn check_copy_counts(total: i32, available: i32) -> Result<(), String> {
    if total < 0 {
        return Err(format!("total copies cannot be negative ({})", total));
    }
    if available < 0 {
        return Err(format!("available copies cannot be negative ({})", available));
    }
    if available > total {
        return Err(format!(
            "available copies ({}) exceed total copies ({})",
            available, total
        ));
    }
    Ok(())
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewBook {
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i16>,
    pub category_id: Option<i32>,
    #[serde(default)]
    pub copies_total: i32,
    #[serde(default)]
    pub copies_available: i32,
}

/// Update book request. Every mutable field is overwritten.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_year: Option<i16>,
    pub category_id: Option<i32>,
    pub copies_total: i32,
    pub copies_available: i32,
}

impl From<&Book> for UpdateBook {
    fn from(book: &Book) -> Self {
        Self {
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            publisher: book.publisher.clone(),
            publication_year: book.publication_year,
            category_id: book.category_id,
            copies_total: book.copies_total,
            copies_available: book.copies_available,
        }
    }
}

/// Book search criteria; all set fields must match
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    pub category_id: Option<i32>,
    #[serde(default)]
    pub available_only: bool,
}

impl BookFilter {
    pub fn title(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    pub fn author(author: &str) -> Self {
        Self {
            author: Some(author.to_string()),
            ..Default::default()
        }
    }

    pub fn category(category_id: i32) -> Self {
        Self {
            category_id: Some(category_id),
            ..Default::default()
        }
    }

    pub fn available() -> Self {
        Self {
            available_only: true,
            ..Default::default()
        }
    }

    /// In-process evaluation, mirrors the SQL built by the Postgres repository
    pub fn matches(&self, book: &Book) -> bool {
        fn contains(haystack: Option<&str>, needle: &str) -> bool {
            haystack
                .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false)
        }

        if let Some(ref title) = self.title {
            if !contains(Some(book.title.as_str()), title) {
                return false;
            }
        }
        if let Some(ref author) = self.author {
            if !contains(book.author.as_deref(), author) {
                return false;
            }
        }
        if let Some(category_id) = self.category_id {
            if book.category_id != Some(category_id) {
                return false;
            }
        }
        !self.available_only || book.is_available()
    }
}
