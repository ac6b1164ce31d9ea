//! API endpoint URL builders
//!
//! Helper functions to construct server endpoint URLs.

/// Build health check URL
pub fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url)
}

/// Build run trigger URL
pub fn runs_url(base_url: &str) -> String {
    format!("{}/api/v1/runs", base_url)
}
