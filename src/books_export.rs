use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;

use crate::catalog_db::{BookRecord, CatalogError, BOOK_COLUMNS};

#[derive(Debug, Serialize)]
pub struct ExportReport {
    pub dest_path: String,
    pub exported_count: usize,
}

/// Serializes a fetched record set to CSV: the canonical eight-column header
/// first, then one row per record in the given order.
pub fn export_books_csv(books: &[BookRecord], dest: &Path) -> Result<ExportReport, CatalogError> {
    let mut writer = WriterBuilder::new()
        .from_path(dest)
        .map_err(|e| CatalogError::Io(format!("failed to create export file: {e}")))?;
    writer
        .write_record(BOOK_COLUMNS)
        .map_err(|e| CatalogError::Io(format!("failed to write export header: {e}")))?;

    for book in books {
        let expense_text = book.distribution_expense.to_string();
        writer
            .write_record([
                book.id.as_str(),
                book.title.as_str(),
                book.subtitle.as_str(),
                book.authors.as_str(),
                book.publisher.as_str(),
                book.published_date.as_str(),
                book.category.as_str(),
                expense_text.as_str(),
            ])
            .map_err(|e| CatalogError::Io(format!("failed to write export row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| CatalogError::Io(format!("failed to flush export file: {e}")))?;

    tracing::info!(dest = %dest.display(), exported = books.len(), "exported book records");
    Ok(ExportReport {
        dest_path: dest.to_string_lossy().to_string(),
        exported_count: books.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_db::BookCatalog;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn create_temp_path(prefix: &str, ext: &str) -> PathBuf {
        let unique = format!("{prefix}_{}_{}.{}", std::process::id(), Uuid::new_v4(), ext);
        std::env::temp_dir().join(unique)
    }

    fn sample_books() -> Vec<BookRecord> {
        vec![
            BookRecord {
                id: "isbn-1".to_string(),
                title: "Go Programming".to_string(),
                subtitle: String::new(),
                authors: "A. Author".to_string(),
                publisher: "Acme Press".to_string(),
                published_date: "2024-05-01".to_string(),
                category: "Tech".to_string(),
                distribution_expense: 120.5,
            },
            BookRecord {
                id: "isbn-2".to_string(),
                title: "Gardening".to_string(),
                subtitle: "A Field Guide".to_string(),
                authors: "B. Author".to_string(),
                publisher: "Leafline".to_string(),
                published_date: "2021-06-15".to_string(),
                category: "Hobby".to_string(),
                distribution_expense: 0.0,
            },
        ]
    }

    #[test]
    fn export_writes_header_and_rows() {
        let dest = create_temp_path("bookledger_export_test", "csv");
        let books = sample_books();

        let report = export_books_csv(&books, &dest).expect("export csv");
        assert_eq!(report.exported_count, 2);

        let content = fs::read_to_string(&dest).expect("read export");
        let mut lines = content.lines();
        assert_eq!(
            lines.next(),
            Some("id,title,subtitle,authors,publisher,published_date,category,distribution_expense")
        );
        assert_eq!(
            lines.next(),
            Some("isbn-1,Go Programming,,A. Author,Acme Press,2024-05-01,Tech,120.5")
        );
        assert_eq!(lines.clone().count(), 1, "one line per remaining record");

        let _ = fs::remove_file(&dest);
    }

    #[test]
    fn export_round_trips_through_the_loader() {
        let dest = create_temp_path("bookledger_export_roundtrip", "csv");
        let db_path = create_temp_path("bookledger_export_roundtrip_db", "db");
        let books = sample_books();

        export_books_csv(&books, &dest).expect("export csv");
        let catalog = BookCatalog::new(&db_path);
        catalog
            .load_books_from_path(&dest, None)
            .expect("reload exported csv");

        let mut rows = catalog.fetch_all_books().expect("fetch");
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(rows, books);

        let _ = fs::remove_file(&dest);
        let _ = fs::remove_file(&db_path);
    }
}
