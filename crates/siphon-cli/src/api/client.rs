//! HTTP API client for the relay server

use reqwest::Client;
use std::time::Duration;

use siphon_common::{HealthStatus, RunReport, RunRequest};

use crate::api::endpoints;
use crate::error::{CliError, Result};

// ============================================================================
// API Client Constants
// ============================================================================

/// Default timeout for API requests in seconds.
/// Can be overridden via SIPHON_API_TIMEOUT_SECS environment variable.
/// Generous because a run executes synchronously inside the request.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 600;

/// Default server URL when not specified via flag or environment variable.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// API client for the relay server
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: String) -> Result<Self> {
        let timeout_secs = std::env::var("SIPHON_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("SIPHON_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());

        Self::new(base_url)
    }

    /// Fetch server health
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = endpoints::health_url(&self.base_url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Trigger one relay run and return its report
    pub async fn trigger_run(&self, max_messages: Option<i64>) -> Result<RunReport> {
        let url = endpoints::runs_url(&self.base_url);
        let request = RunRequest { max_messages };

        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn an error response into a [`CliError`], preferring the server's
    /// own error message when the body carries one
    async fn api_error(response: reqwest::Response) -> CliError {
        let status = response.status();
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| format!("server returned {}", status));

        CliError::api(message)
    }
}
