//! Types exchanged between the relay server and its clients

use serde::{Deserialize, Serialize};

/// Request body for triggering a relay run.
///
/// `max_messages` caps how many messages the run may drain. Absent or
/// non-positive values fall back to the server's configured default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunRequest {
    pub max_messages: Option<i64>,
}

/// Outcome report for one relay run.
///
/// `tables_updated` is a set, serialized as a sorted list. `errors`
/// preserves append order. `messages_per_second` is 0.0 when the run
/// duration rounds to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub messages_processed: u64,
    pub tables_updated: Vec<String>,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
    pub messages_per_second: f64,
}

impl RunReport {
    /// True when every drained message was loaded without errors
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Health payload returned by `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    /// Messages currently available for dequeue, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_depth: Option<i64>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_run_report_round_trips_through_json() {
        let report = RunReport {
            messages_processed: 42,
            tables_updated: vec!["orders".to_string(), "users".to_string()],
            errors: vec!["insert rejected for table orders: row 3".to_string()],
            duration_seconds: 1.5,
            messages_per_second: 28.0,
        };

        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert!(!parsed.is_clean());
    }

    #[test]
    fn test_run_request_defaults_to_no_cap() {
        let req: RunRequest = serde_json::from_str("{}").unwrap();
        assert!(req.max_messages.is_none());

        let req: RunRequest = serde_json::from_str(r#"{"max_messages": 250}"#).unwrap();
        assert_eq!(req.max_messages, Some(250));
    }
}
