//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

use crate::connections::ConnectionSnapshot;
use crate::AppState;

/// Retained records for one topic
#[derive(Debug, Serialize)]
struct TopicHealth {
    topic: String,
    records: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    /// Live sessions, absent when the hub does not answer
    sessions: Option<usize>,
    topics: Vec<TopicHealth>,
    connections: ConnectionSnapshot,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let sessions = match state.ws_state.hub.session_count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!("Health check could not reach the hub: {}", e);
            None
        }
    };

    let topics = state
        .topic_log
        .topics()
        .into_iter()
        .map(|topic| {
            let records = state.topic_log.len(&topic);
            TopicHealth { topic, records }
        })
        .collect();

    let (status, code) = if sessions.is_some() {
        ("healthy", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: status.to_string(),
        sessions,
        topics,
        connections: state.connections.snapshot(),
    };

    (code, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
