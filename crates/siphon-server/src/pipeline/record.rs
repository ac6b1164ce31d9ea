//! Typed data model for normalized messages
//!
//! A queue message becomes a [`Record`]: a flat mapping from column name to
//! a tagged scalar. Scalars carry the only five shapes the warehouse can
//! store (null, boolean, integer, float, text); everything richer is
//! serialized to text before it gets here.

use std::collections::BTreeMap;

/// Warehouse column type, inferred from observed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Text => "string",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single typed scalar value in a record
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Convert a scalar JSON value. Returns `None` for objects and arrays,
    /// which the normalizer serializes to text instead.
    pub fn from_json(value: &serde_json::Value) -> Option<ScalarValue> {
        match value {
            serde_json::Value::Null => Some(ScalarValue::Null),
            serde_json::Value::Bool(b) => Some(ScalarValue::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ScalarValue::Integer(i))
                } else {
                    // u64 beyond i64::MAX and all non-integral numbers
                    n.as_f64().map(ScalarValue::Float)
                }
            },
            serde_json::Value::String(s) => Some(ScalarValue::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Column type this value implies. Null carries no type signal.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            ScalarValue::Null => None,
            ScalarValue::Boolean(_) => Some(ColumnType::Boolean),
            ScalarValue::Integer(_) => Some(ColumnType::Integer),
            ScalarValue::Float(_) => Some(ColumnType::Float),
            ScalarValue::Text(_) => Some(ColumnType::Text),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

/// A flattened message ready for insertion, keyed by sanitized column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, ScalarValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any previous value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: ScalarValue) -> Option<ScalarValue> {
        self.fields.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in deterministic (sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn into_fields(self) -> BTreeMap<String, ScalarValue> {
        self.fields
    }
}

impl FromIterator<(String, ScalarValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, ScalarValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// The warehouse table a record is routed to
///
/// Always holds a sanitized identifier; construction goes through the
/// normalizer's routing resolution or the reconciler's sanitizers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column set of one warehouse table, as the reconciler sees it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    columns: BTreeMap<String, ColumnType>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, ty: ColumnType) {
        self.columns.insert(column.into(), ty);
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in deterministic (sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Absorb additional columns, keeping existing types untouched
    pub fn extend(&mut self, other: &TableSchema) {
        for (column, ty) in other.iter() {
            self.columns.entry(column.to_string()).or_insert(ty);
        }
    }
}

impl FromIterator<(String, ColumnType)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (String, ColumnType)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_from_json_covers_all_scalars() {
        assert_eq!(
            ScalarValue::from_json(&json!(null)),
            Some(ScalarValue::Null)
        );
        assert_eq!(
            ScalarValue::from_json(&json!(true)),
            Some(ScalarValue::Boolean(true))
        );
        assert_eq!(
            ScalarValue::from_json(&json!(42)),
            Some(ScalarValue::Integer(42))
        );
        assert_eq!(
            ScalarValue::from_json(&json!(42.5)),
            Some(ScalarValue::Float(42.5))
        );
        assert_eq!(
            ScalarValue::from_json(&json!("x")),
            Some(ScalarValue::Text("x".to_string()))
        );
    }

    #[test]
    fn test_scalar_from_json_rejects_containers() {
        assert_eq!(ScalarValue::from_json(&json!([1, 2])), None);
        assert_eq!(ScalarValue::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn test_huge_unsigned_becomes_float() {
        let value = serde_json::Value::Number(serde_json::Number::from(u64::MAX));
        match ScalarValue::from_json(&value) {
            Some(ScalarValue::Float(f)) => assert!(f > i64::MAX as f64),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_column_type_inference() {
        assert_eq!(ScalarValue::Null.column_type(), None);
        assert_eq!(
            ScalarValue::Boolean(true).column_type(),
            Some(ColumnType::Boolean)
        );
        assert_eq!(
            ScalarValue::Integer(1).column_type(),
            Some(ColumnType::Integer)
        );
        assert_eq!(
            ScalarValue::Float(1.5).column_type(),
            Some(ColumnType::Float)
        );
        assert_eq!(
            ScalarValue::Text("t".into()).column_type(),
            Some(ColumnType::Text)
        );
    }

    #[test]
    fn test_record_insert_replaces_duplicates() {
        let mut record = Record::new();
        assert!(record.insert("id", ScalarValue::Integer(1)).is_none());
        let previous = record.insert("id", ScalarValue::Integer(2));
        assert_eq!(previous, Some(ScalarValue::Integer(1)));
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("id"), Some(&ScalarValue::Integer(2)));
    }

    #[test]
    fn test_schema_extend_keeps_existing_types() {
        let mut schema: TableSchema = [("id".to_string(), ColumnType::Integer)]
            .into_iter()
            .collect();
        let incoming: TableSchema = [
            ("id".to_string(), ColumnType::Text),
            ("name".to_string(), ColumnType::Text),
        ]
        .into_iter()
        .collect();

        schema.extend(&incoming);
        assert_eq!(schema.get("id"), Some(ColumnType::Integer));
        assert_eq!(schema.get("name"), Some(ColumnType::Text));
    }
}
