//! Siphon CLI - Main entry point

use clap::Parser;
use siphon_cli::{Cli, Commands};
use siphon_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbose flag and environment
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("siphon-cli".to_string())
            .build()
    } else {
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .log_file_prefix("siphon-cli".to_string())
            .build()
    };

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    // Initialize logging (ignore errors as the CLI should work without logging)
    let _ = init_logging(&log_config);

    // Execute command
    let result = execute_command(cli).await;

    // Handle result
    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: Cli) -> siphon_cli::Result<()> {
    match cli.command {
        Commands::Run { max_messages } => {
            siphon_cli::commands::run::run(cli.server_url, max_messages).await
        },

        Commands::Status => siphon_cli::commands::status::run(cli.server_url).await,

        Commands::Seed { count, table } => siphon_cli::commands::seed::run(count, table).await,
    }
}
