//! `siphon run` command implementation
//!
//! Triggers one relay run and prints its report.

use colored::Colorize;

use crate::api::ApiClient;
use crate::error::Result;

/// Trigger one relay run against the server and print the report
pub async fn run(server_url: String, max_messages: Option<i64>) -> Result<()> {
    let client = ApiClient::new(server_url)?;
    let report = client.trigger_run(max_messages).await?;

    println!("{}", "Relay run complete".cyan().bold());
    println!();
    println!("  Messages processed: {}", report.messages_processed);
    println!("  Duration:           {:.1}s", report.duration_seconds);
    println!("  Throughput:         {:.1} msg/s", report.messages_per_second);

    if report.tables_updated.is_empty() {
        println!("  Tables updated:     none");
    } else {
        println!("  Tables updated:");
        for table in &report.tables_updated {
            println!("    - {}", table.green());
        }
    }

    println!();
    if report.is_clean() {
        println!("{}", "No errors.".green());
    } else {
        println!(
            "{}",
            format!("{} error(s):", report.errors.len()).red().bold()
        );
        for error in &report.errors {
            println!("  - {}", error);
        }
    }

    Ok(())
}
