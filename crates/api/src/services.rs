//! Auth flow services.
//!
//! Each collaborator is abstracted behind a trait (or built on the store
//! components) so handlers can be tested without live dependencies.
//!
//! ## Services
//!
//! - **tokens** - Bearer token verification (HS256 JWT)
//! - **session** - Revocation and presence updates at login/logout
//!
//! ## Usage in Handlers
//!
//! ```ignore
//! async fn handler(user: AuthUser, State(state): State<AppState>) -> Result<..., AppError> {
//!     let now = Utc::now();
//!     state.session.logout(&user.fingerprint, &user.email, user.expires_at, now).await?;
//! }
//! ```

mod session;
mod tokens;

pub use session::{SessionError, SessionService};
pub use tokens::{JwtVerifier, TokenError, TokenVerifier};

#[cfg(test)]
pub use tokens::MockTokenVerifier;
