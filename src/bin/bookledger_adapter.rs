use bookledger::{
    aggregate_expense_by_category, default_catalog_db_path, describe_book, export_books_csv,
    total_expense, validated_book, BookCatalog, BookFilter, BookRecord, BookUpsertRequest,
    CatalogError,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct AdapterRequest {
    schema_version: u64,
    endpoint: AdapterEndpoint,
    #[serde(default)]
    query: Value,
    #[serde(default)]
    dataset: AdapterDataset,
}

#[derive(Debug, Deserialize)]
struct AdapterEndpoint {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AdapterDataset {
    db_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BooksQueryRequest {
    keyword: Option<String>,
    category: Option<String>,
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookDeleteRequest {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BooksImportRequest {
    source_path: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct BooksExportRequest {
    dest_path: Option<String>,
    keyword: Option<String>,
    category: Option<String>,
    publisher: Option<String>,
}

#[derive(Debug, Serialize)]
struct AdapterErrorBody {
    category: String,
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum AdapterResponse {
    #[serde(rename = "success")]
    Success { payload: Value },
    #[serde(rename = "error")]
    Error { error: AdapterErrorBody },
}

enum AdapterFailure {
    Protocol(String),
    Catalog(CatalogError),
}

impl From<CatalogError> for AdapterFailure {
    fn from(err: CatalogError) -> Self {
        AdapterFailure::Catalog(err)
    }
}

fn failure_category(failure: &AdapterFailure) -> &'static str {
    match failure {
        AdapterFailure::Protocol(msg) if msg.starts_with("unsupported endpoint path:") => {
            "UNSUPPORTED_ENDPOINT"
        }
        AdapterFailure::Protocol(_) => "ADAPTER_PROTOCOL_ERROR",
        AdapterFailure::Catalog(CatalogError::Validation(_)) => "VALIDATION_ERROR",
        AdapterFailure::Catalog(CatalogError::Schema(_)) => "SCHEMA_ERROR",
        AdapterFailure::Catalog(CatalogError::Storage(_)) => "STORAGE_ERROR",
        AdapterFailure::Catalog(CatalogError::Io(_)) => "IO_ERROR",
    }
}

fn failure_message(failure: &AdapterFailure) -> String {
    match failure {
        AdapterFailure::Protocol(msg) => msg.clone(),
        AdapterFailure::Catalog(err) => err.to_string(),
    }
}

fn error_response(failure: &AdapterFailure) -> AdapterResponse {
    AdapterResponse::Error {
        error: AdapterErrorBody {
            category: failure_category(failure).to_string(),
            message: failure_message(failure),
            error_type: "AdapterError".to_string(),
        },
    }
}

fn parse_bool_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

fn read_stdin_json() -> Result<Value, AdapterFailure> {
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .map_err(|e| AdapterFailure::Protocol(format!("failed to read stdin: {e}")))?;
    if raw.trim().is_empty() {
        return Err(AdapterFailure::Protocol("empty stdin request".to_string()));
    }
    serde_json::from_str::<Value>(&raw)
        .map_err(|e| AdapterFailure::Protocol(format!("invalid JSON request: {e}")))
}

fn parse_query<T: serde::de::DeserializeOwned>(
    query: Value,
    endpoint: &str,
) -> Result<T, AdapterFailure> {
    // An omitted query object means "no parameters".
    let query = if query.is_null() {
        Value::Object(Default::default())
    } else {
        query
    };
    serde_json::from_value(query)
        .map_err(|e| AdapterFailure::Protocol(format!("request.query invalid for {endpoint}: {e}")))
}

fn filter_from(
    keyword: Option<String>,
    category: Option<String>,
    publisher: Option<String>,
) -> BookFilter {
    BookFilter {
        keyword,
        category,
        publisher,
    }
}

fn books_payload(books: &[BookRecord]) -> Value {
    json!({
        "summary": {
            "count": books.len(),
            "total_expense": total_expense(books),
        },
        "rows": books,
    })
}

fn resolve_catalog(dataset: &AdapterDataset) -> BookCatalog {
    let db_path = dataset
        .db_path
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_catalog_db_path);
    tracing::debug!(db_path = %db_path.display(), "resolved catalog database");
    BookCatalog::new(db_path)
}

fn dispatch(req: AdapterRequest) -> Result<Value, AdapterFailure> {
    if req.schema_version != 1 {
        return Err(AdapterFailure::Protocol(format!(
            "unsupported schema_version: {}",
            req.schema_version
        )));
    }

    let path = req
        .endpoint
        .path
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterFailure::Protocol("request.endpoint.path missing".to_string()))?;
    let catalog = resolve_catalog(&req.dataset);
    catalog.init()?;

    match path {
        "/api/books/fetch-all" => {
            let books = catalog.fetch_all_books()?;
            Ok(books_payload(&books))
        }
        "/api/books/query" => {
            let query: BooksQueryRequest = parse_query(req.query, "query")?;
            let filter = filter_from(query.keyword, query.category, query.publisher);
            let books = catalog.fetch_filtered_books(&filter)?;
            Ok(books_payload(&books))
        }
        "/api/books/categories" => {
            let categories = catalog.distinct_categories()?;
            Ok(json!({ "categories": categories }))
        }
        "/api/books/upsert" => {
            let mut query: BookUpsertRequest = parse_query(req.query, "upsert")?;
            // Mirror the entry form: an omitted publish date defaults to today.
            let published_date = query
                .published_date
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();
            if published_date.is_empty() {
                query.published_date = Some(Local::now().format("%Y-%m-%d").to_string());
            }
            let book = validated_book(query)?;
            catalog.upsert_book(&book)?;
            let sentence = describe_book(&book);
            Ok(json!({
                "id": book.id.clone(),
                "sentence": sentence,
                "row": book,
            }))
        }
        "/api/books/delete" => {
            let query: BookDeleteRequest = parse_query(req.query, "delete")?;
            let book_id = query.id.unwrap_or_default().trim().to_string();
            if book_id.is_empty() {
                return Err(CatalogError::Validation("id is required".to_string()).into());
            }
            let removed = catalog.delete_book(&book_id)?;
            Ok(json!({ "id": book_id, "removed": removed }))
        }
        "/api/books/delete-all" => {
            let removed = catalog.delete_all_books()?;
            Ok(json!({ "removed": removed }))
        }
        "/api/books/import" => {
            let query: BooksImportRequest = parse_query(req.query, "import")?;
            let source_path = query.source_path.unwrap_or_default().trim().to_string();
            if source_path.is_empty() {
                return Err(CatalogError::Validation("source_path is required".to_string()).into());
            }
            let report = catalog.load_books_from_path(Path::new(&source_path), query.limit)?;
            serde_json::to_value(&report)
                .map_err(|e| AdapterFailure::Protocol(format!("serialize report failed: {e}")))
        }
        "/api/books/export" => {
            let query: BooksExportRequest = parse_query(req.query, "export")?;
            let dest_path = query.dest_path.unwrap_or_default().trim().to_string();
            if dest_path.is_empty() {
                return Err(CatalogError::Validation("dest_path is required".to_string()).into());
            }
            let filter = filter_from(query.keyword, query.category, query.publisher);
            let books = catalog.fetch_filtered_books(&filter)?;
            let report = export_books_csv(&books, Path::new(&dest_path))?;
            serde_json::to_value(&report)
                .map_err(|e| AdapterFailure::Protocol(format!("serialize report failed: {e}")))
        }
        "/api/books/aggregate" => {
            let query: BooksQueryRequest = parse_query(req.query, "aggregate")?;
            let filter = filter_from(query.keyword, query.category, query.publisher);
            let books = catalog.fetch_filtered_books(&filter)?;
            let totals = aggregate_expense_by_category(&books);
            let mut buckets = totals.into_iter().collect::<Vec<_>>();
            buckets.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(json!({
                "buckets": buckets
                    .iter()
                    .map(|(category, total)| json!({
                        "category": category,
                        "total_expense": total,
                    }))
                    .collect::<Vec<_>>(),
            }))
        }
        _ => Err(AdapterFailure::Protocol(format!(
            "unsupported endpoint path: {path}"
        ))),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let pretty = parse_bool_flag(&args, "--pretty");
    let verbose = parse_bool_flag(&args, "--verbose");
    init_tracing(verbose);

    let resp = match read_stdin_json()
        .and_then(|v| {
            serde_json::from_value::<AdapterRequest>(v)
                .map_err(|e| AdapterFailure::Protocol(format!("request root invalid: {e}")))
        })
        .and_then(|req| {
            if let Some(path) = req.endpoint.path.as_deref() {
                tracing::debug!(endpoint = path, "dispatching request");
            }
            dispatch(req)
        }) {
        Ok(payload) => AdapterResponse::Success { payload },
        Err(failure) => error_response(&failure),
    };

    let out = if pretty {
        serde_json::to_string_pretty(&resp)
    } else {
        serde_json::to_string(&resp)
    }
    .unwrap_or_else(|e| {
        json!({
            "status": "error",
            "error": {
                "category": "ADAPTER_PROTOCOL_ERROR",
                "message": format!("serialize response failed: {e}"),
                "type": "SerializeError",
            }
        })
        .to_string()
    });

    print!("{out}");
}
