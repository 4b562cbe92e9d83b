//! Health check endpoint for load balancers and monitoring.
//!
//! Returns 200 OK if both the database and the ephemeral store answer,
//! 503 Service Unavailable otherwise.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_latency_ms: Option<u64>,
    ephemeral_store: bool,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let probe = tokio::time::timeout(state.config.durable_timeout(), state.repos.status.probe());
    let (probe, store_ok) = tokio::join!(probe, state.ephemeral.ping());

    let database_latency = match probe {
        Ok(Ok(latency)) => Some(latency),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "database health probe failed");
            None
        }
        Err(_) => {
            tracing::warn!("database health probe timed out");
            None
        }
    };
    let store_ok = store_ok.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ephemeral store health probe failed");
        false
    });

    let healthy = database_latency.is_some() && store_ok;

    let response = HealthResponse {
        status: if healthy { "ok" } else { "unhealthy" },
        database: database_latency.is_some(),
        database_latency_ms: database_latency.map(|d| d.as_millis() as u64),
        ephemeral_store: store_ok,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
