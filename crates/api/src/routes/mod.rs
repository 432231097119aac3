pub mod auth;
pub mod candidates;
pub mod documents;
pub mod health;
pub mod verifications;
pub mod verify;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                                   register (public)
/// /auth/login                                      login (public)
/// /auth/me                                         current user (requires auth)
///
/// /candidates                                      list, create (HR)
/// /candidates/{id}                                 get, update (HR)
/// /candidates/{id}/verification                    get, create session (HR)
///
/// /verifications/{token}/score                     record trust score (HR)
/// /verifications/{token}/finalize                  finalize (HR)
///
/// /documents/upload                                upload (HR, multipart)
/// /documents/{id}                                  list by candidate (GET), delete (DELETE)
///
/// /verify/{token}                                  session (public)
/// /verify/{token}/submit                           final submission (public)
/// /verify/{token}/documents                        candidate upload (public, multipart)
/// /verify/{token}/{step_type}/initiate             start redirect step (public)
/// /verify/{token}/{step_type}/complete             finish redirect step (public)
/// /verify/{token}/{step_type}/submit               submit local step (public)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/candidates", candidates::router())
        .nest("/verifications", verifications::router())
        .nest("/documents", documents::router(config.upload.max_bytes))
        .nest("/verify", verify::router(config.upload.max_bytes))
}

/// Room for multipart boundaries and the small text fields next to the file.
pub(crate) const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
