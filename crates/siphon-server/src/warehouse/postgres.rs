//! Postgres-backed warehouse

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row};

use super::{RowOutcome, Warehouse, WarehouseError};
use crate::pipeline::record::{ColumnType, Record, ScalarValue, TableName, TableSchema};

/// Analytical store over one Postgres schema (the dataset).
///
/// Table and column identifiers arrive sanitized (lowercase alphanumerics and
/// underscores); they are still double-quoted when interpolated into DDL and
/// inserts.
#[derive(Clone)]
pub struct PgWarehouse {
    pool: PgPool,
    schema: String,
}

impl PgWarehouse {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Create the dataset schema if it is missing. Called once at startup.
    pub async fn ensure_dataset(&self) -> Result<(), WarehouseError> {
        sqlx::query(&format!(r#"CREATE SCHEMA IF NOT EXISTS "{}""#, self.schema))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn sql_type(ty: ColumnType) -> &'static str {
        match ty {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
        }
    }

    fn column_type_from_pg(data_type: &str) -> ColumnType {
        match data_type {
            "boolean" => ColumnType::Boolean,
            "bigint" | "integer" | "smallint" => ColumnType::Integer,
            "double precision" | "real" | "numeric" => ColumnType::Float,
            _ => ColumnType::Text,
        }
    }

    /// Build the insert statement for one row, skipping null fields; omitted
    /// columns land as SQL NULL.
    fn row_insert_sql<'r>(
        &self,
        table: &TableName,
        row: &'r Record,
    ) -> (String, Vec<&'r ScalarValue>) {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for (name, value) in row.iter() {
            if value.is_null() {
                continue;
            }
            columns.push(format!(r#""{name}""#));
            values.push(value);
        }

        if columns.is_empty() {
            let sql = format!(r#"INSERT INTO "{}"."{}" DEFAULT VALUES"#, self.schema, table);
            return (sql, values);
        }

        let placeholders = (1..=columns.len())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"INSERT INTO "{}"."{}" ({}) VALUES ({})"#,
            self.schema,
            table,
            columns.join(", "),
            placeholders
        );

        (sql, values)
    }
}

fn bind_scalar<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    value: &'q ScalarValue,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    match value {
        ScalarValue::Null => query.bind(Option::<String>::None),
        ScalarValue::Boolean(b) => query.bind(*b),
        ScalarValue::Integer(i) => query.bind(*i),
        ScalarValue::Float(f) => query.bind(*f),
        ScalarValue::Text(s) => query.bind(s.as_str()),
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn table_exists(&self, table: &TableName) -> Result<bool, WarehouseError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(&self.schema)
        .bind(table.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn fetch_schema(&self, table: &TableName) -> Result<TableSchema, WarehouseError> {
        let rows = sqlx::query(
            r#"
            SELECT column_name, data_type
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut schema = TableSchema::new();
        for row in rows {
            let name: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            schema.insert(name, Self::column_type_from_pg(&data_type));
        }

        Ok(schema)
    }

    async fn create_table(
        &self,
        table: &TableName,
        columns: &TableSchema,
    ) -> Result<(), WarehouseError> {
        let column_defs = columns
            .iter()
            .map(|(name, ty)| format!(r#""{}" {}"#, name, Self::sql_type(ty)))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            r#"CREATE TABLE "{}"."{}" ({})"#,
            self.schema, table, column_defs
        );

        sqlx::query(&sql).execute(&self.pool).await?;

        tracing::info!(table = %table, columns = columns.len(), "Created warehouse table");

        Ok(())
    }

    async fn alter_table_add_columns(
        &self,
        table: &TableName,
        columns: &TableSchema,
    ) -> Result<(), WarehouseError> {
        if columns.is_empty() {
            return Ok(());
        }

        let add_clauses = columns
            .iter()
            .map(|(name, ty)| format!(r#"ADD COLUMN IF NOT EXISTS "{}" {}"#, name, Self::sql_type(ty)))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(r#"ALTER TABLE "{}"."{}" {}"#, self.schema, table, add_clauses);

        sqlx::query(&sql).execute(&self.pool).await?;

        tracing::info!(table = %table, columns = columns.len(), "Extended warehouse table");

        Ok(())
    }

    async fn insert_rows(
        &self,
        table: &TableName,
        rows: &[Record],
    ) -> Result<Vec<RowOutcome>, WarehouseError> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(rows.len());

        for row in rows {
            // A savepoint per row so one rejected row does not poison the
            // rows already accepted in this transaction.
            sqlx::query("SAVEPOINT row_guard").execute(&mut *tx).await?;

            let (sql, values) = self.row_insert_sql(table, row);
            let mut query = sqlx::query(&sql);
            for value in &values {
                query = bind_scalar(query, value);
            }

            match query.execute(&mut *tx).await {
                Ok(_) => {
                    sqlx::query("RELEASE SAVEPOINT row_guard")
                        .execute(&mut *tx)
                        .await?;
                    outcomes.push(RowOutcome::Accepted);
                },
                Err(e) => {
                    sqlx::query("ROLLBACK TO SAVEPOINT row_guard")
                        .execute(&mut *tx)
                        .await?;
                    tracing::debug!(table = %table, error = %e, "Row rejected by warehouse");
                    outcomes.push(RowOutcome::Rejected(e.to_string()));
                },
            }
        }

        tx.commit().await?;

        Ok(outcomes)
    }
}
