//! Admin console: who is signed in.
//!
//! Presence is best-effort (no TTL), so these numbers can include sessions
//! that ended without a logout.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::auth::AdminUser, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/online", get(online_count))
        .route("/online/users", get(online_users))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OnlineCountResponse {
    pub online: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    pub users: Vec<String>,
}

async fn online_count(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let online = state.stores.presence.online_count().await?;
    Ok(Json(OnlineCountResponse { online }))
}

async fn online_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.stores.presence.online_members().await?;
    Ok(Json(OnlineUsersResponse { users }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    use super::*;
    use crate::ephemeral::{MockEphemeralStore, StoreError};
    use crate::test_utils::{TestStateBuilder, mock_auth_user};

    fn admin() -> AdminUser {
        AdminUser(mock_auth_user("admin@ongil.kr", true))
    }

    #[tokio::test]
    async fn online_count_reflects_presence() {
        let state = TestStateBuilder::new().build();
        state.session.login("a@ongil.kr").await;
        state.session.login("b@ongil.kr").await;

        let response = online_count(admin(), State(state))
            .await
            .unwrap()
            .into_response();

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: OnlineCountResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.online, 2);
    }

    #[tokio::test]
    async fn online_users_are_listed_sorted() {
        let state = TestStateBuilder::new().build();
        state.session.login("b@ongil.kr").await;
        state.session.login("a@ongil.kr").await;

        let response = online_users(admin(), State(state))
            .await
            .unwrap()
            .into_response();

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: OnlineUsersResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.users, vec!["a@ongil.kr", "b@ongil.kr"]);
    }

    #[tokio::test]
    async fn unreachable_store_is_503() {
        let mut store = MockEphemeralStore::new();
        store
            .expect_set_cardinality()
            .returning(|_| Err(StoreError::unavailable("scard", "timed out")));
        let state = TestStateBuilder::new().with_store(Arc::new(store)).build();

        let result = online_count(admin(), State(state)).await;

        let response = result.err().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
