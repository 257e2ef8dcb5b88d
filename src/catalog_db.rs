use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CATALOG_DB_RELATIVE_PATH: &str = "bookledger/catalog.db";

/// Persisted column names, in schema order. Also the required header of a
/// bulk import source and the header row of a CSV export.
pub const BOOK_COLUMNS: &[&str] = &[
    "id",
    "title",
    "subtitle",
    "authors",
    "publisher",
    "published_date",
    "category",
    "distribution_expense",
];

const CREATE_BOOKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    title TEXT,
    subtitle TEXT,
    authors TEXT,
    publisher TEXT,
    published_date TEXT,
    category TEXT,
    distribution_expense REAL
);
"#;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Interactive write-path rejection. Never touches stored state.
    #[error("{0}")]
    Validation(String),
    /// Bulk import source lacks required header columns; carries every
    /// missing name, not just the first.
    #[error("import source missing columns: {}", .0.join(", "))]
    Schema(Vec<String>),
    /// Failure from the persistence engine. Not retried.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
    /// Import source or export destination file problem.
    #[error("{0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub published_date: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub distribution_expense: f64,
}

#[derive(Debug, Serialize)]
pub struct CatalogInitResult {
    pub db_path: String,
    pub created: bool,
}

/// Handle to one on-disk catalog. Constructed once with an injected database
/// location and passed to every consumer; each operation opens its own
/// short-lived connection and releases it on return.
#[derive(Debug, Clone)]
pub struct BookCatalog {
    db_path: PathBuf,
}

impl BookCatalog {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn open_connection(&self) -> Result<Connection, CatalogError> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Idempotently ensures the books table exists. Safe to call repeatedly;
    /// never drops or rewrites existing rows.
    pub fn init(&self) -> Result<CatalogInitResult, CatalogError> {
        let created = !self.db_path.exists();
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CatalogError::Io(format!("failed to create catalog directory: {e}"))
                })?;
            }
        }
        let conn = self.open_connection()?;
        conn.execute_batch(CREATE_BOOKS_TABLE)?;
        tracing::debug!(db_path = %self.db_path.display(), created, "ensured books table");
        Ok(CatalogInitResult {
            db_path: self.db_path.to_string_lossy().to_string(),
            created,
        })
    }
}

pub fn default_catalog_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_CATALOG_DB_RELATIVE_PATH)
}

// The store only ever writes REAL expense values, but a catalog touched by
// other tools must not make reads fail: TEXT parses leniently, NULL and
// anything else collapses to 0.0.
pub(crate) fn expense_from_sql(value: SqlValue) -> f64 {
    match value {
        SqlValue::Real(v) => v,
        SqlValue::Integer(v) => v as f64,
        SqlValue::Text(raw) => raw.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

pub(crate) fn book_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookRecord> {
    let text = |idx: usize| -> rusqlite::Result<String> {
        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    Ok(BookRecord {
        id: text(0)?,
        title: text(1)?,
        subtitle: text(2)?,
        authors: text(3)?,
        publisher: text(4)?,
        published_date: text(5)?,
        category: text(6)?,
        distribution_expense: expense_from_sql(row.get::<_, SqlValue>(7)?),
    })
}
