use calamine::{open_workbook_auto, Reader};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::catalog_db::{BookCatalog, BookRecord, CatalogError, BOOK_COLUMNS};

// What a genuinely absent id/title cell coerces to. The loader does not
// validate these fields; only the interactive write path does.
const NULL_CELL_PLACEHOLDER: &str = "None";

#[derive(Debug, Serialize)]
pub struct BulkLoadReport {
    pub source_path: String,
    pub rows_read: usize,
    pub limited_to: Option<usize>,
    pub imported_count: usize,
}

fn trim_cell(raw: &str) -> String {
    raw.trim().to_string()
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| CatalogError::Io(format!("failed to read csv: {e}")))?;

    let mut rows = Vec::new();
    for rec in reader.records() {
        let rec = rec.map_err(|e| CatalogError::Io(format!("failed to read csv row: {e}")))?;
        rows.push(rec.iter().map(trim_cell).collect());
    }
    Ok(rows)
}

fn read_xlsx_rows(path: &Path) -> Result<Vec<Vec<String>>, CatalogError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| CatalogError::Io(format!("failed to open xlsx: {e}")))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let first_sheet = sheet_names
        .first()
        .cloned()
        .ok_or_else(|| CatalogError::Io("no worksheet found in xlsx".to_string()))?;

    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| CatalogError::Io(format!("failed to read xlsx worksheet: {e}")))?;

    let rows = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| trim_cell(&cell.to_string()))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    Ok(rows)
}

fn read_tabular_rows(path: &Path) -> Result<Vec<Vec<String>>, CatalogError> {
    if !path.exists() {
        return Err(CatalogError::Io(format!(
            "import file not found: {}",
            path.to_string_lossy()
        )));
    }
    if !path.is_file() {
        return Err(CatalogError::Io(format!(
            "import path is not a file: {}",
            path.to_string_lossy()
        )));
    }

    let suffix = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match suffix.as_str() {
        "csv" => read_csv_rows(path),
        "xlsx" => read_xlsx_rows(path),
        _ => Err(CatalogError::Io(format!(
            "unsupported file format: .{suffix} (only .csv/.xlsx)"
        ))),
    }
}

// Exact, case-sensitive header match; the first occurrence of a duplicated
// column name wins. Extra columns are ignored.
fn resolve_required_columns(
    header: &[String],
) -> Result<HashMap<&'static str, usize>, CatalogError> {
    let mut positions = HashMap::new();
    for (pos, name) in header.iter().enumerate() {
        if let Some(column) = BOOK_COLUMNS.iter().find(|c| **c == name.as_str()) {
            positions.entry(*column).or_insert(pos);
        }
    }
    let missing = BOOK_COLUMNS
        .iter()
        .filter(|c| !positions.contains_key(**c))
        .map(|c| (*c).to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(CatalogError::Schema(missing));
    }
    Ok(positions)
}

fn coerce_row(row: &[String], columns: &HashMap<&'static str, usize>) -> BookRecord {
    let text = |name: &str| -> String {
        columns
            .get(name)
            .and_then(|pos| row.get(*pos))
            .cloned()
            .unwrap_or_default()
    };
    let required = |name: &str| -> String {
        let value = text(name);
        if value.is_empty() {
            NULL_CELL_PLACEHOLDER.to_string()
        } else {
            value
        }
    };

    BookRecord {
        id: required("id"),
        title: required("title"),
        subtitle: text("subtitle"),
        authors: text("authors"),
        publisher: text("publisher"),
        published_date: text("published_date"),
        category: text("category"),
        // A bad or absent expense never fails the row.
        distribution_expense: text("distribution_expense").parse::<f64>().unwrap_or(0.0),
    }
}

impl BookCatalog {
    /// Reconciles a tabular source (.csv or .xlsx, header row first) into the
    /// catalog. The header must contain all eight book columns by exact name
    /// or the whole load fails before any row is touched. Rows are coerced
    /// leniently and upserted one by one in source order; a storage failure
    /// aborts the remainder but keeps rows already applied.
    pub fn load_books_from_path(
        &self,
        source: &Path,
        limit: Option<usize>,
    ) -> Result<BulkLoadReport, CatalogError> {
        self.init()?;
        tracing::info!(source = %source.display(), "reading book import file");
        let mut rows = read_tabular_rows(source)?;
        if rows.is_empty() {
            return Err(CatalogError::Schema(
                BOOK_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            ));
        }
        let header = rows.remove(0);
        let columns = resolve_required_columns(&header)?;

        let rows_read = rows.len();
        tracing::info!(rows_read, "rows read");
        if let Some(limit) = limit {
            if limit < rows.len() {
                rows.truncate(limit);
                tracing::info!(limit, "limiting to first rows");
            }
        }

        let mut imported_count = 0usize;
        for row in &rows {
            let book = coerce_row(row, &columns);
            self.upsert_book(&book)?;
            imported_count += 1;
        }
        tracing::info!(imported_count, "inserted or updated book records");

        Ok(BulkLoadReport {
            source_path: source.to_string_lossy().to_string(),
            rows_read,
            limited_to: limit,
            imported_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn create_temp_path(prefix: &str, ext: &str) -> PathBuf {
        let unique = format!("{prefix}_{}_{}.{}", std::process::id(), Uuid::new_v4(), ext);
        std::env::temp_dir().join(unique)
    }

    fn write_sample_books_csv(path: &Path) {
        let csv = "\
id,title,subtitle,authors,publisher,published_date,category,distribution_expense\n\
isbn-1,Go Programming,,A. Author,Acme Press,2024-05-01,Tech,120.5\n\
isbn-2,Gardening,A Field Guide,B. Author,Leafline,2021-06-15,Hobby,\n";
        fs::write(path, csv).expect("write temp books csv");
    }

    #[test]
    fn load_upserts_rows_and_defaults_bad_expense() {
        let db_path = create_temp_path("bookledger_import_test", "db");
        let csv_path = create_temp_path("bookledger_import_fixture", "csv");
        write_sample_books_csv(&csv_path);
        let catalog = BookCatalog::new(&db_path);

        let report = catalog
            .load_books_from_path(&csv_path, None)
            .expect("load sample csv");
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.imported_count, 2);

        let rows = catalog.fetch_all_books().expect("fetch loaded rows");
        assert_eq!(rows.len(), 2);
        let first = rows
            .iter()
            .find(|r| r.id == "isbn-1")
            .expect("isbn-1 loaded");
        assert_eq!(first.title, "Go Programming");
        assert_eq!(first.subtitle, "", "empty optional cell becomes empty string");
        assert_eq!(first.distribution_expense, 120.5);
        let second = rows
            .iter()
            .find(|r| r.id == "isbn-2")
            .expect("isbn-2 loaded");
        assert_eq!(
            second.distribution_expense, 0.0,
            "empty expense defaults to 0.0 instead of failing the row"
        );

        let _ = fs::remove_file(&csv_path);
        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn load_is_idempotent_for_the_same_file() {
        let db_path = create_temp_path("bookledger_import_idem_test", "db");
        let csv_path = create_temp_path("bookledger_import_idem_fixture", "csv");
        write_sample_books_csv(&csv_path);
        let catalog = BookCatalog::new(&db_path);

        catalog
            .load_books_from_path(&csv_path, None)
            .expect("first load");
        catalog
            .load_books_from_path(&csv_path, None)
            .expect("second load");

        let rows = catalog.fetch_all_books().expect("fetch");
        assert_eq!(rows.len(), 2, "re-import must upsert, not duplicate");

        let _ = fs::remove_file(&csv_path);
        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn missing_columns_fail_before_any_row() {
        let db_path = create_temp_path("bookledger_import_schema_test", "db");
        let csv_path = create_temp_path("bookledger_import_schema_fixture", "csv");
        let csv = "\
id,title,subtitle,publisher,published_date,distribution_expense\n\
isbn-1,Go Programming,,Acme Press,2024-05-01,120.5\n";
        fs::write(&csv_path, csv).expect("write temp csv");
        let catalog = BookCatalog::new(&db_path);

        let err = catalog
            .load_books_from_path(&csv_path, None)
            .expect_err("schema check must fail");
        match err {
            CatalogError::Schema(missing) => {
                assert_eq!(missing, vec!["authors".to_string(), "category".to_string()]);
            }
            other => panic!("expected Schema error, got {other:?}"),
        }
        let rows = catalog.fetch_all_books().expect("fetch");
        assert!(rows.is_empty(), "no row may be upserted on schema failure");

        let _ = fs::remove_file(&csv_path);
        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn limit_processes_only_first_rows() {
        let db_path = create_temp_path("bookledger_import_limit_test", "db");
        let csv_path = create_temp_path("bookledger_import_limit_fixture", "csv");
        write_sample_books_csv(&csv_path);
        let catalog = BookCatalog::new(&db_path);

        let report = catalog
            .load_books_from_path(&csv_path, Some(1))
            .expect("limited load");
        assert_eq!(report.rows_read, 2);
        assert_eq!(report.imported_count, 1);

        let rows = catalog.fetch_all_books().expect("fetch");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "isbn-1", "limit keeps source order");

        let _ = fs::remove_file(&csv_path);
        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn absent_id_and_title_cells_coerce_to_placeholder() {
        let db_path = create_temp_path("bookledger_import_null_test", "db");
        let csv_path = create_temp_path("bookledger_import_null_fixture", "csv");
        let csv = "\
id,title,subtitle,authors,publisher,published_date,category,distribution_expense\n\
,,,,,,,\n";
        fs::write(&csv_path, csv).expect("write temp csv");
        let catalog = BookCatalog::new(&db_path);

        let report = catalog
            .load_books_from_path(&csv_path, None)
            .expect("load row with empty cells");
        assert_eq!(report.imported_count, 1);

        let rows = catalog.fetch_all_books().expect("fetch");
        assert_eq!(rows[0].id, "None");
        assert_eq!(rows[0].title, "None");
        assert_eq!(rows[0].category, "");
        assert_eq!(rows[0].distribution_expense, 0.0);

        let _ = fs::remove_file(&csv_path);
        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let db_path = create_temp_path("bookledger_import_ext_test", "db");
        let source_path = create_temp_path("bookledger_import_ext_fixture", "txt");
        fs::write(&source_path, "id,title\n").expect("write temp file");
        let catalog = BookCatalog::new(&db_path);

        let err = catalog
            .load_books_from_path(&source_path, None)
            .expect_err("txt must be rejected");
        assert!(matches!(err, CatalogError::Io(ref m) if m.contains("unsupported")));

        let _ = fs::remove_file(&source_path);
        let _ = fs::remove_file(&db_path);
    }

    #[test]
    fn extra_columns_are_ignored() {
        let db_path = create_temp_path("bookledger_import_extra_test", "db");
        let csv_path = create_temp_path("bookledger_import_extra_fixture", "csv");
        let csv = "\
language,id,title,subtitle,authors,publisher,published_date,category,distribution_expense\n\
en,isbn-7,Extra Columns,,,,2023-01-01,Tech,10\n";
        fs::write(&csv_path, csv).expect("write temp csv");
        let catalog = BookCatalog::new(&db_path);

        catalog
            .load_books_from_path(&csv_path, None)
            .expect("load with extra column");
        let rows = catalog.fetch_all_books().expect("fetch");
        assert_eq!(rows[0].id, "isbn-7");
        assert_eq!(rows[0].distribution_expense, 10.0);

        let _ = fs::remove_file(&csv_path);
        let _ = fs::remove_file(&db_path);
    }
}
