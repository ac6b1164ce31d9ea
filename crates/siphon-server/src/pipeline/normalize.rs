//! Message normalization and table routing
//!
//! A payload must be a JSON object. One level of object nesting is flattened
//! as `{parent}_{child}`; anything deeper, and arrays at any depth, is kept
//! as its compact JSON text. Routing fields decide the destination table and
//! never become columns.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use super::record::{Record, ScalarValue, TableName};
use super::sanitize::{sanitize_column_name, sanitize_table_name, FALLBACK_TABLE};

/// Routing fields, checked in priority order and matched case-sensitively
pub const ROUTING_FIELDS: [&str; 3] = ["EntityType", "Table", "TableName"];

/// Column carrying the normalization wall-clock time
pub const PROCESSING_TIMESTAMP_COLUMN: &str = "processing_timestamp";

/// Normalization failures
#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// One normalized message: flattened record plus its destination table
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: TableName,
    pub record: Record,
}

/// Flatten a raw payload into a record and resolve its destination table.
///
/// Pure apart from `observed_at`, which the caller supplies so the
/// `processing_timestamp` column is testable.
pub fn normalize(
    payload: &[u8],
    observed_at: DateTime<Utc>,
) -> Result<Normalized, NormalizationError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| NormalizationError::MalformedPayload(e.to_string()))?;

    let Value::Object(message) = value else {
        return Err(NormalizationError::MalformedPayload(
            "payload top level is not a JSON object".to_string(),
        ));
    };

    let table = resolve_table(&message);

    let mut record = Record::new();
    for (key, value) in &message {
        if ROUTING_FIELDS.contains(&key.as_str()) {
            continue;
        }
        match value {
            Value::Object(nested) => {
                for (nested_key, nested_value) in nested {
                    let column = sanitize_column_name(&format!("{key}_{nested_key}"));
                    record.insert(column, scalar_or_json_text(nested_value));
                }
            },
            other => {
                record.insert(sanitize_column_name(key), scalar_or_json_text(other));
            },
        }
    }

    record.insert(
        PROCESSING_TIMESTAMP_COLUMN,
        ScalarValue::Text(observed_at.to_rfc3339()),
    );

    Ok(Normalized { table, record })
}

/// Scalars pass through; arrays and objects become their compact JSON text
fn scalar_or_json_text(value: &Value) -> ScalarValue {
    ScalarValue::from_json(value).unwrap_or_else(|| ScalarValue::Text(value.to_string()))
}

/// First routing field holding a non-empty string wins; present fields of
/// any other shape are skipped.
fn resolve_table(message: &serde_json::Map<String, Value>) -> TableName {
    for field in ROUTING_FIELDS {
        if let Some(Value::String(name)) = message.get(field) {
            if !name.is_empty() {
                return TableName::new(sanitize_table_name(name));
            }
        }
    }
    TableName::new(FALLBACK_TABLE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize_value(value: serde_json::Value) -> Normalized {
        normalize(value.to_string().as_bytes(), Utc::now()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_json() {
        let result = normalize(b"not json", Utc::now());
        assert!(matches!(
            result,
            Err(NormalizationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_rejects_non_object_top_level() {
        let result = normalize(b"[1, 2, 3]", Utc::now());
        assert!(matches!(
            result,
            Err(NormalizationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_routing_priority_order() {
        let normalized = normalize_value(json!({
            "EntityType": "orders",
            "Table": "ignored",
            "TableName": "also_ignored",
        }));
        assert_eq!(normalized.table.as_str(), "orders");

        let normalized = normalize_value(json!({"Table": "shipments"}));
        assert_eq!(normalized.table.as_str(), "shipments");

        let normalized = normalize_value(json!({"TableName": "refunds"}));
        assert_eq!(normalized.table.as_str(), "refunds");
    }

    #[test]
    fn test_unusable_routing_values_fall_through() {
        let normalized = normalize_value(json!({
            "EntityType": "",
            "Table": 42,
            "TableName": "refunds",
        }));
        assert_eq!(normalized.table.as_str(), "refunds");

        let normalized = normalize_value(json!({"id": 1}));
        assert_eq!(normalized.table.as_str(), FALLBACK_TABLE);
    }

    #[test]
    fn test_routing_fields_never_become_columns() {
        let normalized = normalize_value(json!({
            "EntityType": "orders",
            "Table": "ignored",
            "id": 7,
        }));
        assert!(normalized.record.contains("id"));
        assert!(!normalized.record.contains("entitytype"));
        assert!(!normalized.record.contains("table"));
        assert!(!normalized.record.contains("tablename"));
    }

    #[test]
    fn test_routing_value_is_sanitized() {
        let normalized = normalize_value(json!({"EntityType": "Order-Events"}));
        assert_eq!(normalized.table.as_str(), "order_events");
    }

    #[test]
    fn test_flattens_one_object_level() {
        let normalized = normalize_value(json!({
            "id": 1,
            "customer": {"name": "ada", "age": 36},
        }));
        assert_eq!(
            normalized.record.get("customer_name"),
            Some(&ScalarValue::Text("ada".to_string()))
        );
        assert_eq!(
            normalized.record.get("customer_age"),
            Some(&ScalarValue::Integer(36))
        );
        assert!(!normalized.record.contains("customer"));
    }

    #[test]
    fn test_deeper_nesting_becomes_json_text() {
        let normalized = normalize_value(json!({
            "meta": {"flags": {"express": true}},
        }));
        assert_eq!(
            normalized.record.get("meta_flags"),
            Some(&ScalarValue::Text("{\"express\":true}".to_string()))
        );
    }

    #[test]
    fn test_arrays_become_json_text() {
        let normalized = normalize_value(json!({
            "items": [1, 2, 3],
            "customer": {"tags": ["vip"]},
        }));
        assert_eq!(
            normalized.record.get("items"),
            Some(&ScalarValue::Text("[1,2,3]".to_string()))
        );
        assert_eq!(
            normalized.record.get("customer_tags"),
            Some(&ScalarValue::Text("[\"vip\"]".to_string()))
        );
    }

    #[test]
    fn test_null_passes_through_as_null() {
        let normalized = normalize_value(json!({"note": null}));
        assert_eq!(normalized.record.get("note"), Some(&ScalarValue::Null));
    }

    #[test]
    fn test_column_names_are_sanitized() {
        let normalized = normalize_value(json!({
            "Order ID": 5,
            "shipping": {"Street Name": "x"},
        }));
        assert!(normalized.record.contains("order_id"));
        assert!(normalized.record.contains("shipping_street_name"));
    }

    #[test]
    fn test_processing_timestamp_is_added() {
        let observed_at = Utc::now();
        let normalized =
            normalize(json!({"id": 1}).to_string().as_bytes(), observed_at).unwrap();
        assert_eq!(
            normalized.record.get(PROCESSING_TIMESTAMP_COLUMN),
            Some(&ScalarValue::Text(observed_at.to_rfc3339()))
        );
    }

    #[test]
    fn test_empty_object_still_normalizes() {
        let normalized = normalize_value(json!({}));
        assert_eq!(normalized.table.as_str(), FALLBACK_TABLE);
        // Only the timestamp column.
        assert_eq!(normalized.record.len(), 1);
    }
}
