use std::collections::HashMap;

use crate::catalog_db::BookRecord;

/// Bucket label for records without a category.
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// Sums distribution expense per category over an already-fetched record set.
/// Records with an empty category land in the [`UNCATEGORIZED_LABEL`] bucket.
/// Iteration order of the result is unspecified; sort on the consumer side.
pub fn aggregate_expense_by_category(books: &[BookRecord]) -> HashMap<String, f64> {
    let mut totals = HashMap::new();
    for book in books {
        let label = if book.category.is_empty() {
            UNCATEGORIZED_LABEL
        } else {
            book.category.as_str()
        };
        *totals.entry(label.to_string()).or_insert(0.0) += book.distribution_expense;
    }
    totals
}

pub fn total_expense(books: &[BookRecord]) -> f64 {
    books.iter().map(|b| b.distribution_expense).sum()
}

/// Renders one record as a friendly sentence, skipping empty parts.
pub fn describe_book(book: &BookRecord) -> String {
    let mut parts = vec![format!("Book '{}'", book.title)];
    if !book.subtitle.is_empty() {
        parts.push(format!("({})", book.subtitle));
    }
    if !book.authors.is_empty() {
        parts.push(format!("by {}", book.authors));
    }
    if !book.publisher.is_empty() {
        parts.push(format!("published by {}", book.publisher));
    }
    if !book.published_date.is_empty() {
        parts.push(format!("on {}", book.published_date));
    }
    if !book.category.is_empty() {
        parts.push(format!("in {}", book.category));
    }
    parts.push(format!(
        "had distribution expense ₹{}",
        book.distribution_expense
    ));
    parts.join(" ")
}
