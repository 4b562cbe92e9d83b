use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::ephemeral::StoreError;

/// Seconds a client should wait before retrying a 503.
pub const RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug)]
pub enum AppError {
    /// Internal errors - logged but return generic 500 to user
    Internal(anyhow::Error),
    /// User-facing errors - message is safe to show
    External(StatusCode, &'static str),
    /// Validation errors - safe to show
    Validation(String),
    /// A backing store is unreachable - retryable 503
    Unavailable(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(err) => {
                tracing::error!("internal error: {:?}", err);
                sentry::capture_error(
                    err.as_ref() as &(dyn std::error::Error + Send + Sync + 'static)
                );

                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::External(status, msg) => (status, msg).into_response(),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Unavailable(err) => {
                tracing::warn!("store unavailable: {:#}", err);
                unavailable_response()
            }
        }
    }
}

fn unavailable_response() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
        "Service temporarily unavailable",
    )
        .into_response()
}

fn caused_by_unavailable_store(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<StoreError>().is_some_and(StoreError::is_unavailable))
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        if caused_by_unavailable_store(&err) {
            Self::Unavailable(err)
        } else {
            Self::Internal(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::EntityId, repos::DurableWriteFailed, services::SessionError};
    use http_body_util::BodyExt;

    async fn response_body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn failed_flush_surfaces_as_plain_500() {
        let err: AppError = DurableWriteFailed {
            entity_id: EntityId(42),
            reason: "deadlock detected".to_string(),
        }
        .into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response_body(response).await, "Internal server error");
    }

    #[tokio::test]
    async fn rejected_store_command_keeps_key_out_of_body() {
        let err: AppError = StoreError::Rejected {
            op: "get",
            reason: "WRONGTYPE at blacklist:9f86d081".to_string(),
        }
        .into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response_body(response).await;
        assert!(!body.contains("blacklist"));
        assert!(!body.contains("WRONGTYPE"));
    }

    #[tokio::test]
    async fn external_error_returns_specified_status_and_message() {
        let err = AppError::External(StatusCode::NOT_FOUND, "Post not found");
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_body(response).await, "Post not found");
    }

    #[tokio::test]
    async fn validation_error_returns_400_with_details() {
        let err = AppError::Validation("post id: invalid digit".into());
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_body(response).await, "post id: invalid digit");
    }

    #[tokio::test]
    async fn io_error_converts_to_internal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "db down");
        let err: AppError = io_err.into();

        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unavailable_store_converts_to_retryable_503() {
        let err: AppError = StoreError::unavailable("get", "connection refused").into();
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &RETRY_AFTER_SECS.to_string()
        );
    }

    #[tokio::test]
    async fn wrapped_unavailable_store_is_still_503() {
        let err: AppError =
            SessionError::Revocation(StoreError::unavailable("set", "timed out")).into();

        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn other_store_errors_are_internal() {
        let err: AppError = StoreError::InvalidTtl("token has no expiry".into()).into();

        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
