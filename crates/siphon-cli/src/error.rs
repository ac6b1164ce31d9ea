//! Error types for the siphon CLI
//!
//! All errors are user-facing, with messages that say what went wrong and
//! what to try next.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// API server returned an error response
    #[error("Server error: {0}. Ensure the siphon server is running (check with 'siphon status') and accessible.")]
    Api(String),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check your server URL and internet connection.")]
    Http(#[from] reqwest::Error),

    /// Database operation failed
    #[error("Database error: {0}. Check your DATABASE_URL and that Postgres is reachable.")]
    Database(#[from] sqlx::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables.")]
    Config(String),
}

impl CliError {
    /// Create an API error with a custom message
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(message.into())
    }
}
