//! `siphon seed` command implementation
//!
//! Enqueues synthetic messages directly into the relay queue table so a
//! deployment can be smoke-tested without a real producer.

use colored::Colorize;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::error::{CliError, Result};

/// Tables the generator cycles through when none is given
const SAMPLE_TABLES: [&str; 3] = ["orders", "users", "events"];

/// Enqueue `count` synthetic messages
pub async fn run(count: u32, table: Option<String>) -> Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").map_err(|_| {
        CliError::Config("DATABASE_URL must be set to seed the queue".to_string())
    })?;
    let queue_name = std::env::var("QUEUE_NAME").unwrap_or_else(|_| "ingest".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    // The server creates the relay table at startup; without it there is
    // nothing to seed into.
    let exists: Option<String> = sqlx::query_scalar("SELECT to_regclass('relay_queue')::text")
        .fetch_one(&pool)
        .await?;
    if exists.is_none() {
        return Err(CliError::Config(
            "relay queue table not found; start siphon-server once to create it".to_string(),
        ));
    }

    for i in 0..count {
        let target = match &table {
            Some(name) => name.clone(),
            None => SAMPLE_TABLES[i as usize % SAMPLE_TABLES.len()].to_string(),
        };
        let payload = serde_json::json!({
            "EntityType": target,
            "seq": i,
            "amount": f64::from(i) * 1.5,
            "flagged": i % 2 == 0,
            "source": "siphon-seed",
        })
        .to_string();

        sqlx::query("INSERT INTO relay_queue (id, queue_name, payload) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(&queue_name)
            .bind(payload.as_bytes())
            .execute(&pool)
            .await?;
    }

    println!(
        "{} {} message(s) onto queue '{}'",
        "Seeded".green().bold(),
        count,
        queue_name
    );
    println!("Run 'siphon run' to relay them.");

    Ok(())
}
