use axum::{Router, http};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{handlers, state::AppState};

/// The full application router with tracing and request-id layers.
pub fn app(state: AppState) -> Router {
    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    Router::new()
        .nest("/health", handlers::health::router())
        .nest("/posts", handlers::views::router())
        .nest("/status", handlers::status::router())
        .nest("/auth", handlers::auth::router())
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
}
