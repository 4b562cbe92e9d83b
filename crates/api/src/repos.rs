//! Database repositories (PostgreSQL).
//!
//! The durable side of the view counter. Each repository sits behind a trait
//! so handlers and the reconciler can be tested without a database.
//!
//! ## Repositories
//!
//! - **views** - Committed `posts.views` counts, atomic increments
//! - **status** - Reachability probe for `/health`
//!
//! ## Usage in Handlers
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let baseline = state.repos.views.views(post_id).await?;
//! }
//! ```

mod status;
mod views;

pub use status::{PgStatusRepo, StatusRepo};
pub use views::{DurableWriteFailed, PgViewCountRepo, ViewCountRepo};

#[cfg(test)]
pub use status::MockStatusRepo;
#[cfg(test)]
pub use views::MockViewCountRepo;

use std::sync::Arc;

/// Collection of all database repositories.
#[derive(Clone)]
pub struct Repos {
    pub views: Arc<dyn ViewCountRepo>,
    pub status: Arc<dyn StatusRepo>,
}
