//! Session endpoints.
//!
//! Tokens are issued by the login flow elsewhere; this service only ends
//! sessions. Logout revokes the presented token until its own expiry and
//! takes the identity off the online list.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::auth::AuthUser, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// When the revocation entry self-expires (the token's own expiry).
    pub revoked_until: DateTime<Utc>,
}

async fn logout(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state
        .session
        .logout(&user.fingerprint, &user.email, user.expires_at, Utc::now())
        .await?;

    Ok(Json(LogoutResponse {
        revoked_until: entry.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use super::*;
    use crate::ephemeral::{MockEphemeralStore, StoreError};
    use crate::test_utils::{TestStateBuilder, mock_auth_user};

    #[tokio::test]
    async fn logout_revokes_token_and_clears_presence() {
        let state = TestStateBuilder::new().build();
        let user = mock_auth_user("a@ongil.kr", false);
        state.session.login("a@ongil.kr").await;

        let response = logout(user.clone(), State(state.clone()))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.stores.revocation.is_revoked(&user.fingerprint).await.unwrap());
        assert_eq!(state.stores.presence.online_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn logout_fails_retryably_when_revocation_cannot_be_written() {
        let mut store = MockEphemeralStore::new();
        store
            .expect_set_with_ttl()
            .returning(|_, _, _| Err(StoreError::unavailable("set", "connection refused")));
        let state = TestStateBuilder::new().with_store(Arc::new(store)).build();

        let result = logout(mock_auth_user("a@ongil.kr", false), State(state)).await;

        let response = result.err().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
