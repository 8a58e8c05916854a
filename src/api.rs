//! REST API server for the workflow orchestrator
//!
//! Exposes directive processing over HTTP for the dashboard frontend.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::driver::WorkflowDriver;
use crate::models::RunOutcome;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResearchRequest {
    pub directive: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub driver: Arc<WorkflowDriver>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Research Endpoint
/// =============================

async fn run_research(
    State(state): State<ApiState>,
    Json(req): Json<ResearchRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let directive = req.directive.trim().to_string();

    if directive.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Directive must not be empty".into())),
        );
    }

    info!("Received research request: {}", directive);

    let report = state.driver.run(&directive).await;

    let status = match report.outcome {
        RunOutcome::Completed | RunOutcome::Partial => StatusCode::OK,
        // The caller gets the partial results, but the plan was inconsistent.
        RunOutcome::Deadlocked => StatusCode::UNPROCESSABLE_ENTITY,
    };

    (status, Json(ApiResponse::success(report)))
}

/// =============================
/// Router
/// =============================

pub fn create_router(driver: Arc<WorkflowDriver>) -> Router {
    let state = ApiState { driver };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/research", post(run_research))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    driver: Arc<WorkflowDriver>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(driver);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
