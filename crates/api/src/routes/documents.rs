//! Route definitions for the `/documents` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use super::MULTIPART_OVERHEAD_BYTES;
use crate::handlers::document;
use crate::state::AppState;

/// Routes mounted at `/documents`.
///
/// `{id}` is the candidate id for `GET` and the document id for `DELETE`.
///
/// ```text
/// POST   /upload  -> upload (multipart)
/// GET    /{id}    -> list_for_candidate
/// DELETE /{id}    -> delete
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(document::upload)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD_BYTES)),
        )
        .route(
            "/{id}",
            get(document::list_for_candidate).delete(document::delete),
        )
}
