//! Books repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::BookRepository;
use crate::{
    error::RepositoryResult,
    models::book::{Book, BookFilter, NewBook, UpdateBook},
};

#[derive(Clone)]
pub struct PgBookRepository {
    pool: Pool<Postgres>,
}

impl PgBookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> RepositoryResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND id != $2)")
                .bind(isbn)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
                .bind(isbn)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn find_by_isbn(&self, isbn: &str) -> RepositoryResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE isbn = $1")
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn find_all(&self) -> RepositoryResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY title, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn find_by_filter(&self, filter: &BookFilter) -> RepositoryResult<Vec<Book>> {
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref title) = filter.title {
            params.push(contains_pattern(title));
            conditions.push(format!("LOWER(title) LIKE ${} ESCAPE '\\'", params.len()));
        }

        if let Some(ref author) = filter.author {
            params.push(contains_pattern(author));
            conditions.push(format!("LOWER(author) LIKE ${} ESCAPE '\\'", params.len()));
        }

        // Integer placeholder comes after the text ones
        if filter.category_id.is_some() {
            conditions.push(format!("category_id = ${}", params.len() + 1));
        }

        if filter.available_only {
            conditions.push("copies_available > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!("SELECT * FROM books {} ORDER BY title, id", where_clause);

        let mut builder = sqlx::query_as::<_, Book>(&query);
        for param in &params {
            builder = builder.bind(param);
        }
        if let Some(category_id) = filter.category_id {
            builder = builder.bind(category_id);
        }

        let books = builder.fetch_all(&self.pool).await?;
        Ok(books)
    }

    async fn create(&self, book: &NewBook) -> RepositoryResult<Book> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                isbn, title, author, publisher, publication_year, category_id,
                copies_total, copies_available, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.publication_year)
        .bind(book.category_id)
        .bind(book.copies_total)
        .bind(book.copies_available)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, id: i32, book: &UpdateBook) -> RepositoryResult<Option<Book>> {
        let now = Utc::now();

        let updated = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                isbn = $2, title = $3, author = $4, publisher = $5,
                publication_year = $6, category_id = $7,
                copies_total = $8, copies_available = $9, updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.publisher)
        .bind(book.publication_year)
        .bind(book.category_id)
        .bind(book.copies_total)
        .bind(book.copies_available)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete(&self, id: i32) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_copies(&self, id: i32, count: i32) -> RepositoryResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                copies_total = copies_total + $2,
                copies_available = copies_available + $2,
                updated_at = $3
            WHERE id = $1
              AND copies_total::bigint + $2 <= 2147483647
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(count)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }

    async fn adjust_available(&self, id: i32, delta: i32) -> RepositoryResult<Option<Book>> {
        // Single conditional statement: concurrent adjustments serialize on the row lock
        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                copies_available = copies_available + $2,
                updated_at = $3
            WHERE id = $1
              AND copies_available + $2 >= 0
              AND copies_available + $2 <= copies_total
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(book)
    }
}

/// Case-insensitive substring pattern with `LIKE` wildcards taken literally
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
