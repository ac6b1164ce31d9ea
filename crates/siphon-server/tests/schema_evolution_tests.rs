//! Schema evolution tests across consecutive runs
//!
//! Each run starts with a fresh reconciler cache, so these tests verify
//! that:
//! 1. A later run adopts tables created earlier instead of recreating them
//! 2. New fields widen an existing table with a single alter
//! 3. Requeued messages load cleanly once the warehouse recovers

use anyhow::Result;
use serde_json::json;
use tracing::info;

use siphon_server::config::PipelineConfig;
use siphon_server::pipeline::record::ColumnType;
use siphon_server::pipeline::RunCoordinator;
use siphon_server::queue::MemoryQueue;
use siphon_server::warehouse::MemoryWarehouse;

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,siphon_server=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn pipeline() -> PipelineConfig {
    PipelineConfig {
        batch_size: 10,
        max_messages: 100,
        run_timeout_secs: 30,
    }
}

#[tokio::test]
async fn test_second_run_widens_table_for_new_fields() -> Result<()> {
    init_tracing();
    info!("🧪 Testing cross-run widening of an existing table");

    let queue = MemoryQueue::new();
    let warehouse = MemoryWarehouse::new();

    queue.push(json!({"Table": "orders", "id": 1}).to_string());
    let first = RunCoordinator::new(&queue, &warehouse, pipeline())
        .run(None)
        .await;
    assert_eq!(first.messages_processed, 1);
    assert_eq!(warehouse.create_calls(), vec!["orders".to_string()]);

    // The next run sees a new field and widens the table it adopted.
    queue.push(json!({"Table": "orders", "id": 2, "note": "gift"}).to_string());
    let second = RunCoordinator::new(&queue, &warehouse, pipeline())
        .run(None)
        .await;

    assert_eq!(second.messages_processed, 1);
    assert!(second.errors.is_empty());
    assert_eq!(warehouse.create_calls(), vec!["orders".to_string()]);
    assert_eq!(warehouse.fetch_calls(), vec!["orders".to_string()]);
    assert_eq!(
        warehouse.alter_calls(),
        vec![("orders".to_string(), vec!["note".to_string()])]
    );

    let schema = warehouse.schema_of("orders").expect("table exists");
    assert_eq!(schema.get("note"), Some(ColumnType::Text));
    assert_eq!(warehouse.rows_of("orders").len(), 2);

    info!("✅ One create, one fetch, one alter across two runs");
    Ok(())
}

#[tokio::test]
async fn test_requeued_messages_load_after_recovery() -> Result<()> {
    init_tracing();
    info!("🧪 Testing redelivery after a warehouse outage");

    let queue = MemoryQueue::new();
    for i in 0..3 {
        queue.push(json!({"Table": "orders", "seq": i}).to_string());
    }
    let warehouse = MemoryWarehouse::new();
    warehouse.fail_insert("orders");

    let first = RunCoordinator::new(&queue, &warehouse, pipeline())
        .run(None)
        .await;
    assert_eq!(first.messages_processed, 0);
    assert_eq!(first.errors.len(), 1);
    assert_eq!(queue.parked_len(), 3);

    // The warehouse comes back and the leases lapse.
    warehouse.recover("orders");
    queue.release_parked();

    let second = RunCoordinator::new(&queue, &warehouse, pipeline())
        .run(None)
        .await;

    assert_eq!(second.messages_processed, 3);
    assert!(second.is_clean());
    assert_eq!(warehouse.rows_of("orders").len(), 3);
    assert_eq!(queue.ready_len(), 0);
    assert_eq!(queue.parked_len(), 0);

    info!("✅ All requeued messages loaded on redelivery");
    Ok(())
}

#[tokio::test]
async fn test_adopted_table_accepts_field_subsets() -> Result<()> {
    init_tracing();
    info!("🧪 Testing subset records against a wider adopted schema");

    let queue = MemoryQueue::new();
    queue.push(json!({"Table": "catalog", "id": 1}).to_string());
    queue.push(json!({"Table": "catalog", "id": 2, "name": "bolt"}).to_string());
    let warehouse = MemoryWarehouse::new();
    warehouse.seed_table(
        "catalog",
        [
            ("id".to_string(), ColumnType::Integer),
            ("name".to_string(), ColumnType::Text),
            ("price".to_string(), ColumnType::Float),
            ("processing_timestamp".to_string(), ColumnType::Text),
        ]
        .into_iter()
        .collect(),
    );

    let report = RunCoordinator::new(&queue, &warehouse, pipeline())
        .run(None)
        .await;

    assert_eq!(report.messages_processed, 2);
    assert!(report.errors.is_empty());
    assert!(warehouse.create_calls().is_empty());
    assert!(warehouse.alter_calls().is_empty(), "subset fields never alter");
    assert_eq!(warehouse.rows_of("catalog").len(), 2);

    Ok(())
}
