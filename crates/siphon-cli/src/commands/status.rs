//! `siphon status` command implementation
//!
//! Shows server health and queue depth.

use colored::Colorize;

use crate::api::ApiClient;
use crate::error::Result;

/// Fetch and print server health
pub async fn run(server_url: String) -> Result<()> {
    let client = ApiClient::new(server_url)?;
    let health = client.health().await?;

    println!("{}", "Server status".cyan().bold());
    println!();
    let status = if health.status == "healthy" {
        health.status.green()
    } else {
        health.status.yellow()
    };
    println!("  Status:      {}", status);
    println!("  Database:    {}", health.database);
    match health.queue_depth {
        Some(depth) => println!("  Queue depth: {}", depth),
        None => println!("  Queue depth: unknown"),
    }

    Ok(())
}
