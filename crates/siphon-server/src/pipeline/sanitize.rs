//! Destination identifier sanitization
//!
//! Warehouse identifiers allow ASCII alphanumerics and underscores only.
//! Everything else maps to an underscore and the result is lowercased; names
//! that sanitize away entirely fall back to a fixed identifier, and names
//! that would start with a digit get a short prefix.

/// Table used when routing produces no usable identifier
pub const FALLBACK_TABLE: &str = "default_table";

/// Column used when a field name sanitizes away entirely
pub const FALLBACK_COLUMN: &str = "field";

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn is_degenerate(cleaned: &str) -> bool {
    cleaned.chars().all(|c| c == '_')
}

/// Sanitize a routing value into a table identifier
pub fn sanitize_table_name(raw: &str) -> String {
    let cleaned = sanitize(raw);
    if is_degenerate(&cleaned) {
        return FALLBACK_TABLE.to_string();
    }
    if cleaned.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return format!("t_{cleaned}");
    }
    cleaned
}

/// Sanitize a flattened field name into a column identifier
pub fn sanitize_column_name(raw: &str) -> String {
    let cleaned = sanitize(raw);
    if is_degenerate(&cleaned) {
        return FALLBACK_COLUMN.to_string();
    }
    if cleaned.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return format!("c_{cleaned}");
    }
    cleaned
}
