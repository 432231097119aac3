//! Route definitions for the `/candidates` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::{candidate, verification};
use crate::state::AppState;

/// Routes mounted at `/candidates`.
///
/// ```text
/// GET    /                     -> list
/// POST   /                     -> create
/// GET    /{id}                 -> get_by_id
/// PATCH  /{id}                 -> update
/// GET    /{id}/verification    -> verification::get_for_candidate
/// POST   /{id}/verification    -> verification::create
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(candidate::list).post(candidate::create))
        .route("/{id}", get(candidate::get_by_id).patch(candidate::update))
        .route(
            "/{id}/verification",
            get(verification::get_for_candidate).post(verification::create),
        )
}
