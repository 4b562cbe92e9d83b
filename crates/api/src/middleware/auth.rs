//! Bearer token authentication.
//!
//! Usage: Add `AuthUser` as an extractor parameter to require authentication,
//! or `AdminUser` to additionally require the `admin` claim.
//!
//! ```ignore
//! async fn my_handler(user: AuthUser, ...) -> ... {
//!     // user.email is available here
//! }
//! ```
//!
//! The denylist is consulted before the signature so a logged-out token is
//! rejected even while it is still cryptographically valid. When the store
//! cannot answer, the configured `RevocationPolicy` decides.

use axum::{
    Json, RequestPartsExt,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    error::RETRY_AFTER_SECS, models::TokenFingerprint, services::TokenError, state::AppState,
};

/// Identity extracted from a valid, non-revoked access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub admin: bool,
    /// The token's `exp` claim.
    pub expires_at: i64,
    pub fingerprint: TokenFingerprint,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingToken)?;

        let token = bearer.token();
        let fingerprint = TokenFingerprint::of(token);

        let revoked = state
            .stores
            .revocation
            .check(&fingerprint, state.config.revocation_policy)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "revocation check failed");
                AuthError::Unavailable
            })?;

        if revoked {
            return Err(AuthError::Revoked);
        }

        let claims = state.tokens.verify(token).map_err(|e| {
            if let TokenError::Invalid(reason) = &e {
                tracing::debug!(reason = %reason, "rejected token");
            }
            AuthError::InvalidToken
        })?;

        state.session.touch(&claims.sub).await;

        Ok(AuthUser {
            email: claims.sub,
            admin: claims.admin,
            expires_at: claims.exp,
            fingerprint,
        })
    }
}

/// An [`AuthUser`] carrying the `admin` claim.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if !user.admin {
            return Err(AuthError::Forbidden);
        }

        Ok(AdminUser(user))
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    Revoked,
    Forbidden,
    /// Revocation status unknown (store unreachable, fail-closed).
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::Revoked => (StatusCode::UNAUTHORIZED, "Token has been revoked"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Admin access required"),
            AuthError::Unavailable => {
                let body = serde_json::json!({ "error": "Authentication temporarily unavailable" });
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(header::RETRY_AFTER, RETRY_AFTER_SECS.to_string())],
                    Json(body),
                )
                    .into_response();
            }
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}
