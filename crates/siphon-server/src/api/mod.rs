//! HTTP surface for the relay server
//!
//! Two routes do the work: `GET /health` reports liveness with a database
//! ping and the queue depth, `POST /api/v1/runs` executes one relay run and
//! returns its report. Runs are synchronous; the response is the report.

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use siphon_common::{HealthStatus, RunReport, RunRequest};

use crate::config::PipelineConfig;
use crate::error::ApiResult;
use crate::pipeline::RunCoordinator;
use crate::queue::MessageQueue;
use crate::warehouse::Warehouse;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<dyn MessageQueue>,
    pub warehouse: Arc<dyn Warehouse>,
    pub pipeline: PipelineConfig,
}

/// Create the application router with all routes and middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/runs", post(trigger_run))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Siphon Relay",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check handler: always answers, degrading status rather than
/// failing when a collaborator is unreachable
async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        Ok(_) => "connected",
        Err(e) => {
            error!(error = %e, "Database health check failed");
            "unreachable"
        },
    };

    let queue_depth = match state.queue.depth().await {
        Ok(depth) => Some(depth),
        Err(e) => {
            warn!(error = %e, "Queue depth check failed");
            None
        },
    };

    let status = if database == "connected" && queue_depth.is_some() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        database: database.to_string(),
        queue_depth,
    })
}

/// Execute one relay run and return its report.
///
/// The body is optional; an absent or empty body runs with the configured
/// defaults. Per-message failures land in the report's error list with a
/// 200; only an unreachable queue turns into an error response.
async fn trigger_run(
    State(state): State<AppState>,
    body: Option<Json<RunRequest>>,
) -> ApiResult<Json<RunReport>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();

    // Preflight: an unreachable queue fails the request instead of
    // producing an empty report.
    state.queue.depth().await?;

    info!(max_messages = ?request.max_messages, "Run triggered over HTTP");
    let coordinator = RunCoordinator::new(
        state.queue.as_ref(),
        state.warehouse.as_ref(),
        state.pipeline.clone(),
    );
    let report = coordinator.run(request.max_messages).await;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::queue::MemoryQueue;
    use crate::warehouse::MemoryWarehouse;

    /// State over in-memory collaborators and a lazy pool that never connects
    fn test_state(queue: MemoryQueue, warehouse: MemoryWarehouse) -> AppState {
        AppState {
            db: PgPool::connect_lazy("postgresql://localhost/unreachable").unwrap(),
            queue: Arc::new(queue),
            warehouse: Arc::new(warehouse),
            pipeline: PipelineConfig {
                batch_size: 10,
                max_messages: 100,
                run_timeout_secs: 30,
            },
        }
    }

    #[tokio::test]
    async fn test_root_reports_service_name() {
        let app = router(test_state(MemoryQueue::new(), MemoryWarehouse::new()));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "Siphon Relay");
    }

    #[tokio::test]
    async fn test_health_degrades_without_database() {
        let app = router(test_state(MemoryQueue::new(), MemoryWarehouse::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // The lazy pool has nothing to connect to, so the ping fails but
        // the endpoint still answers with a degraded status.
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthStatus = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "degraded");
        assert_eq!(health.database, "unreachable");
        assert_eq!(health.queue_depth, Some(0));
    }

    #[tokio::test]
    async fn test_trigger_run_without_body_returns_report() {
        let queue = MemoryQueue::new();
        queue.push(br#"{"Table": "orders", "total": 5}"#.to_vec());
        queue.push(br#"{"Table": "orders", "total": 7}"#.to_vec());
        let app = router(test_state(queue, MemoryWarehouse::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/runs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report: RunReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.messages_processed, 2);
        assert_eq!(report.tables_updated, vec!["orders".to_string()]);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_trigger_run_honors_request_cap() {
        let queue = MemoryQueue::new();
        for i in 0..5 {
            queue.push(format!(r#"{{"Table": "events", "seq": {i}}}"#).into_bytes());
        }
        let app = router(test_state(queue, MemoryWarehouse::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/runs")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"max_messages": 3}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let report: RunReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.messages_processed, 3);
    }
}
