//! Route definitions for the public `/verify` surface.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use super::MULTIPART_OVERHEAD_BYTES;
use crate::handlers::verify;
use crate::state::AppState;

/// Routes mounted at `/verify`. No authentication.
///
/// ```text
/// GET  /{token}                       -> get_session
/// POST /{token}/submit                -> submit
/// POST /{token}/documents             -> upload_document (multipart)
/// POST /{token}/{step_type}/initiate  -> initiate
/// POST /{token}/{step_type}/complete  -> complete
/// POST /{token}/{step_type}/submit    -> submit_step
/// ```
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/{token}", get(verify::get_session))
        .route("/{token}/submit", post(verify::submit))
        .route(
            "/{token}/documents",
            post(verify::upload_document)
                .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD_BYTES)),
        )
        .route("/{token}/{step_type}/initiate", post(verify::initiate))
        .route("/{token}/{step_type}/complete", post(verify::complete))
        .route("/{token}/{step_type}/submit", post(verify::submit_step))
}
