//! In-memory warehouse for tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{RowOutcome, Warehouse, WarehouseError};
use crate::pipeline::record::{ColumnType, Record, TableName, TableSchema};

/// In-memory [`Warehouse`] with call journals and scriptable failures.
///
/// Inserts enforce what Postgres would: a row referencing a column the table
/// does not have, or carrying a value its column type cannot take, is
/// rejected. Script helpers add failures on top for the unhappy paths.
#[derive(Default)]
pub struct MemoryWarehouse {
    state: Mutex<WarehouseState>,
}

#[derive(Default)]
struct WarehouseState {
    tables: BTreeMap<String, TableState>,
    fetch_calls: Vec<String>,
    create_calls: Vec<String>,
    alter_calls: Vec<(String, Vec<String>)>,
    insert_calls: Vec<(String, usize)>,
    fail_create: HashSet<String>,
    fail_alter: HashSet<String>,
    fail_insert: HashSet<String>,
    reject_rows: HashMap<String, HashSet<usize>>,
}

#[derive(Default)]
struct TableState {
    schema: TableSchema,
    rows: Vec<Record>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, WarehouseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-create a table, as if it survived from an earlier run
    pub fn seed_table(&self, name: &str, schema: TableSchema) {
        self.state().tables.insert(
            name.to_string(),
            TableState {
                schema,
                rows: Vec::new(),
            },
        );
    }

    /// Reject the next and every create for this table
    pub fn fail_create(&self, name: &str) {
        self.state().fail_create.insert(name.to_string());
    }

    /// Reject the next and every alter for this table
    pub fn fail_alter(&self, name: &str) {
        self.state().fail_alter.insert(name.to_string());
    }

    /// Fail whole insert calls for this table, standing in for transport loss
    pub fn fail_insert(&self, name: &str) {
        self.state().fail_insert.insert(name.to_string());
    }

    /// Clear every scripted failure for this table, as if it recovered
    pub fn recover(&self, name: &str) {
        let mut state = self.state();
        state.fail_create.remove(name);
        state.fail_alter.remove(name);
        state.fail_insert.remove(name);
        state.reject_rows.remove(name);
    }

    /// Reject these row indexes on every insert call for this table
    pub fn reject_rows(&self, name: &str, indexes: &[usize]) {
        self.state()
            .reject_rows
            .entry(name.to_string())
            .or_default()
            .extend(indexes.iter().copied());
    }

    /// Tables whose schema was fetched, in call order
    pub fn fetch_calls(&self) -> Vec<String> {
        self.state().fetch_calls.clone()
    }

    /// Tables created, in call order
    pub fn create_calls(&self) -> Vec<String> {
        self.state().create_calls.clone()
    }

    /// Alter calls as (table, sorted column names)
    pub fn alter_calls(&self) -> Vec<(String, Vec<String>)> {
        self.state().alter_calls.clone()
    }

    /// Insert calls as (table, row count)
    pub fn insert_calls(&self) -> Vec<(String, usize)> {
        self.state().insert_calls.clone()
    }

    pub fn schema_of(&self, name: &str) -> Option<TableSchema> {
        self.state().tables.get(name).map(|t| t.schema.clone())
    }

    /// Rows accepted into a table so far
    pub fn rows_of(&self, name: &str) -> Vec<Record> {
        self.state()
            .tables
            .get(name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn value_fits(value_type: ColumnType, column_type: ColumnType) -> bool {
        value_type == column_type
            || (value_type == ColumnType::Integer && column_type == ColumnType::Float)
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn table_exists(&self, table: &TableName) -> Result<bool, WarehouseError> {
        Ok(self.state().tables.contains_key(table.as_str()))
    }

    async fn fetch_schema(&self, table: &TableName) -> Result<TableSchema, WarehouseError> {
        let mut state = self.state();
        state.fetch_calls.push(table.as_str().to_string());
        state
            .tables
            .get(table.as_str())
            .map(|t| t.schema.clone())
            .ok_or_else(|| WarehouseError::Rejected(format!("table {table} does not exist")))
    }

    async fn create_table(
        &self,
        table: &TableName,
        columns: &TableSchema,
    ) -> Result<(), WarehouseError> {
        let mut state = self.state();
        state.create_calls.push(table.as_str().to_string());

        if state.fail_create.contains(table.as_str()) {
            return Err(WarehouseError::Rejected(format!(
                "create rejected for table {table}"
            )));
        }
        if state.tables.contains_key(table.as_str()) {
            return Err(WarehouseError::Rejected(format!(
                "table {table} already exists"
            )));
        }

        state.tables.insert(
            table.as_str().to_string(),
            TableState {
                schema: columns.clone(),
                rows: Vec::new(),
            },
        );

        Ok(())
    }

    async fn alter_table_add_columns(
        &self,
        table: &TableName,
        columns: &TableSchema,
    ) -> Result<(), WarehouseError> {
        let mut state = self.state();
        state.alter_calls.push((
            table.as_str().to_string(),
            columns.iter().map(|(name, _)| name.to_string()).collect(),
        ));

        if state.fail_alter.contains(table.as_str()) {
            return Err(WarehouseError::Rejected(format!(
                "alter rejected for table {table}"
            )));
        }

        let Some(table_state) = state.tables.get_mut(table.as_str()) else {
            return Err(WarehouseError::Rejected(format!(
                "table {table} does not exist"
            )));
        };
        table_state.schema.extend(columns);

        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &TableName,
        rows: &[Record],
    ) -> Result<Vec<RowOutcome>, WarehouseError> {
        let mut state = self.state();
        state
            .insert_calls
            .push((table.as_str().to_string(), rows.len()));

        if state.fail_insert.contains(table.as_str()) {
            return Err(WarehouseError::Unavailable(format!(
                "insert transport failed for table {table}"
            )));
        }

        let scripted = state
            .reject_rows
            .get(table.as_str())
            .cloned()
            .unwrap_or_default();

        let mut outcomes = Vec::with_capacity(rows.len());
        let mut accepted = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if scripted.contains(&index) {
                outcomes.push(RowOutcome::Rejected(format!(
                    "row {index} rejected for table {table}"
                )));
                continue;
            }

            let outcome = match state.tables.get(table.as_str()) {
                None => RowOutcome::Rejected(format!("table {table} does not exist")),
                Some(table_state) => {
                    let mut rejection = None;
                    for (name, value) in row.iter() {
                        let Some(value_type) = value.column_type() else {
                            continue;
                        };
                        match table_state.schema.get(name) {
                            None => {
                                rejection = Some(format!("unknown column {name}"));
                                break;
                            },
                            Some(column_type) if !Self::value_fits(value_type, column_type) => {
                                rejection = Some(format!(
                                    "column {name} is {column_type} but value is {value_type}"
                                ));
                                break;
                            },
                            Some(_) => {},
                        }
                    }
                    match rejection {
                        Some(reason) => RowOutcome::Rejected(reason),
                        None => RowOutcome::Accepted,
                    }
                },
            };

            if outcome.is_accepted() {
                accepted.push(row.clone());
            }
            outcomes.push(outcome);
        }

        if let Some(table_state) = state.tables.get_mut(table.as_str()) {
            table_state.rows.extend(accepted);
        }

        Ok(outcomes)
    }
}
