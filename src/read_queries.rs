use rusqlite::{params_from_iter, types::Value as SqlValue};
use serde::Deserialize;

use crate::catalog_db::{book_from_row, BookCatalog, BookRecord, CatalogError};

/// Sentinel category value meaning "do not filter on category". Presentation
/// layers prepend it to the category picker.
pub const ALL_CATEGORIES: &str = "All";

const SELECT_BOOK_COLUMNS: &str = "SELECT id, title, subtitle, authors, publisher, \
     published_date, category, distribution_expense FROM books";

/// Zero or more optional criteria, combined with logical AND. An absent or
/// blank criterion matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub publisher: Option<String>,
}

fn parse_optional_text(raw: Option<&str>) -> String {
    raw.unwrap_or_default().trim().to_string()
}

impl BookCatalog {
    /// Every record, most recent published_date first. The sort compares the
    /// stored date strings, it is not calendar-aware.
    pub fn fetch_all_books(&self) -> Result<Vec<BookRecord>, CatalogError> {
        let conn = self.open_connection()?;
        let sql = format!("{SELECT_BOOK_COLUMNS} ORDER BY published_date DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], book_from_row)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    /// Records matching the conjunction of the supplied criteria. The keyword
    /// matches as a substring of title, subtitle or authors (SQLite LIKE,
    /// case-insensitive for ASCII); category requires exact equality unless it
    /// is the [`ALL_CATEGORIES`] sentinel; publisher matches as a substring.
    ///
    /// Unlike [`fetch_all_books`](Self::fetch_all_books) no ORDER clause is
    /// applied; rows come back in storage order.
    pub fn fetch_filtered_books(&self, filter: &BookFilter) -> Result<Vec<BookRecord>, CatalogError> {
        let keyword = parse_optional_text(filter.keyword.as_deref());
        let category = parse_optional_text(filter.category.as_deref());
        let publisher = parse_optional_text(filter.publisher.as_deref());

        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        if !keyword.is_empty() {
            conditions.push("(title LIKE ? OR subtitle LIKE ? OR authors LIKE ?)");
            let kw = format!("%{keyword}%");
            params.push(SqlValue::Text(kw.clone()));
            params.push(SqlValue::Text(kw.clone()));
            params.push(SqlValue::Text(kw));
        }
        if !category.is_empty() && category != ALL_CATEGORIES {
            conditions.push("category = ?");
            params.push(SqlValue::Text(category));
        }
        if !publisher.is_empty() {
            conditions.push("publisher LIKE ?");
            params.push(SqlValue::Text(format!("%{publisher}%")));
        }
        let where_sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let conn = self.open_connection()?;
        let sql = format!("{SELECT_BOOK_COLUMNS}{where_sql}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), book_from_row)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    /// Sorted, deduplicated category values, skipping empty ones. The sort is
    /// SQLite's BINARY collation, so it is case-sensitive.
    pub fn distinct_categories(&self) -> Result<Vec<String>, CatalogError> {
        let conn = self.open_connection()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM books \
             WHERE category IS NOT NULL AND category <> '' ORDER BY category",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }
}
