//! Post view counters.
//!
//! Counts are served as `posts.views + pending delta`. Recording a view only
//! touches the ephemeral store; the reconciler moves deltas into the database.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::EntityId, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/views", get(get_views).post(record_view))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewCountResponse {
    pub post_id: EntityId,
    pub views: u64,
}

/// `posts.views` for `id`. A lookup slower than the durable timeout is a 503.
async fn durable_baseline(state: &AppState, id: EntityId) -> Result<u64, AppError> {
    let timeout = state.config.durable_timeout();
    let lookup = tokio::time::timeout(timeout, state.repos.views.views(id))
        .await
        .map_err(|_| {
            AppError::Unavailable(anyhow::anyhow!(
                "view count lookup for post {} timed out after {:?}",
                id,
                timeout
            ))
        })?;

    lookup?.ok_or(AppError::External(StatusCode::NOT_FOUND, "Post not found"))
}

fn post_id(path: Result<Path<EntityId>, PathRejection>) -> Result<EntityId, AppError> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::Validation(format!("post id: {}", e.body_text())))
}

async fn get_views(
    State(state): State<AppState>,
    path: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = post_id(path)?;
    let baseline = durable_baseline(&state, id).await?;
    let views = state.stores.views.read_effective_count(id, baseline).await;

    Ok(Json(ViewCountResponse { post_id: id, views }))
}

async fn record_view(
    State(state): State<AppState>,
    path: Result<Path<EntityId>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = post_id(path)?;
    let baseline = durable_baseline(&state, id).await?;

    let views = match state.stores.views.try_record_view(id).await {
        Ok(pending) => baseline.saturating_add(pending),
        Err(e) => {
            tracing::warn!(entity_id = %id, error = %e, "view increment dropped");
            baseline
        }
    };

    Ok(Json(ViewCountResponse { post_id: id, views }))
}
