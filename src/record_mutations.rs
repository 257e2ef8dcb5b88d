use rusqlite::params;
use serde::Deserialize;

use crate::catalog_db::{BookCatalog, BookRecord, CatalogError};

const UPSERT_BOOK_SQL: &str = r#"
INSERT INTO books(
    id, title, subtitle, authors, publisher, published_date, category, distribution_expense
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(id) DO UPDATE SET
    title=excluded.title,
    subtitle=excluded.subtitle,
    authors=excluded.authors,
    publisher=excluded.publisher,
    published_date=excluded.published_date,
    category=excluded.category,
    distribution_expense=excluded.distribution_expense
"#;

/// Raw form input for the interactive write path. Unlike the bulk loader this
/// path is strict: id and title are required, the expense must parse as a
/// number.
#[derive(Debug, Default, Deserialize)]
pub struct BookUpsertRequest {
    pub id: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub published_date: Option<String>,
    pub category: Option<String>,
    pub distribution_expense: Option<String>,
}

pub fn validated_book(req: BookUpsertRequest) -> Result<BookRecord, CatalogError> {
    let id = req.id.unwrap_or_default().trim().to_string();
    if id.is_empty() {
        return Err(CatalogError::Validation("id is required".to_string()));
    }
    let title = req.title.unwrap_or_default().trim().to_string();
    if title.is_empty() {
        return Err(CatalogError::Validation("title is required".to_string()));
    }
    let expense_text = req
        .distribution_expense
        .unwrap_or_default()
        .trim()
        .to_string();
    let distribution_expense = expense_text.parse::<f64>().map_err(|_| {
        CatalogError::Validation("distribution_expense must be a number".to_string())
    })?;

    Ok(BookRecord {
        id,
        title,
        subtitle: req.subtitle.unwrap_or_default().trim().to_string(),
        authors: req.authors.unwrap_or_default().trim().to_string(),
        publisher: req.publisher.unwrap_or_default().trim().to_string(),
        published_date: req.published_date.unwrap_or_default().trim().to_string(),
        category: req.category.unwrap_or_default().trim().to_string(),
        distribution_expense,
    })
}

impl BookCatalog {
    /// Inserts the record or fully replaces the one sharing its id. No field
    /// merge: every non-key column takes the incoming value.
    pub fn upsert_book(&self, book: &BookRecord) -> Result<(), CatalogError> {
        let conn = self.open_connection()?;
        conn.execute(
            UPSERT_BOOK_SQL,
            params![
                book.id,
                book.title,
                book.subtitle,
                book.authors,
                book.publisher,
                book.published_date,
                book.category,
                book.distribution_expense
            ],
        )?;
        Ok(())
    }

    /// Removes one record by id. Deleting an absent id is a no-op, not an
    /// error; the return value says whether a row was removed.
    pub fn delete_book(&self, book_id: &str) -> Result<bool, CatalogError> {
        let conn = self.open_connection()?;
        let removed = conn.execute("DELETE FROM books WHERE id = ?1", [book_id])?;
        Ok(removed > 0)
    }

    /// Empties the table. Irreversible.
    pub fn delete_all_books(&self) -> Result<usize, CatalogError> {
        let conn = self.open_connection()?;
        let removed = conn.execute("DELETE FROM books", [])?;
        tracing::info!(removed, "cleared book catalog");
        Ok(removed)
    }
}
