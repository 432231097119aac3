//! Route definitions for HR actions on a session, by token.

use axum::routing::post;
use axum::Router;

use crate::handlers::verification;
use crate::state::AppState;

/// Routes mounted at `/verifications`.
///
/// ```text
/// POST /{token}/score     -> record_score
/// POST /{token}/finalize  -> finalize
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{token}/score", post(verification::record_score))
        .route("/{token}/finalize", post(verification::finalize))
}
