//! Record store and query layer for a local catalog of book distribution
//! expenses, persisted in a single SQLite file.

mod books_export;
mod books_import;
mod catalog_db;
mod read_queries;
mod record_mutations;
mod reporting;

pub use books_export::{export_books_csv, ExportReport};
pub use books_import::BulkLoadReport;
pub use catalog_db::{
    default_catalog_db_path, BookCatalog, BookRecord, CatalogError, CatalogInitResult,
    BOOK_COLUMNS,
};
pub use read_queries::{BookFilter, ALL_CATEGORIES};
pub use record_mutations::{validated_book, BookUpsertRequest};
pub use reporting::{
    aggregate_expense_by_category, describe_book, total_expense, UNCATEGORIZED_LABEL,
};
