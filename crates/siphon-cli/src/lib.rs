//! Siphon CLI Library
//!
//! Command-line interface for operating a siphon relay deployment.
//!
//! # Overview
//!
//! The CLI talks to a running relay server over its HTTP API:
//!
//! - **Run Trigger**: execute one relay run and print its report (`siphon run`)
//! - **Status Checking**: server health and queue depth (`siphon status`)
//! - **Queue Seeding**: enqueue synthetic messages for smoke tests (`siphon seed`)

pub mod api;
pub mod commands;
pub mod error;

// Re-export commonly used types
pub use api::ApiClient;
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};

/// Siphon - queue-to-warehouse relay operator CLI
#[derive(Parser, Debug)]
#[command(name = "siphon")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Server URL
    #[arg(
        long,
        env = "SIPHON_SERVER_URL",
        default_value = "http://localhost:8000",
        global = true
    )]
    pub server_url: String,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trigger one relay run and print its report
    Run {
        /// Cap on messages drained this run (server default when omitted)
        #[arg(long)]
        max_messages: Option<i64>,
    },

    /// Show server health and queue depth
    Status,

    /// Enqueue synthetic messages for smoke-testing a deployment
    Seed {
        /// How many messages to enqueue
        #[arg(long, default_value_t = 10)]
        count: u32,

        /// Route every message to this table instead of cycling samples
        #[arg(long)]
        table: Option<String>,
    },
}
