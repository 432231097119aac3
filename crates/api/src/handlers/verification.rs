//! HR-side management of verification sessions.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use kovanent_core::error::CoreError;
use kovanent_core::tokens::log_prefix;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::types::DbId;
use kovanent_engine::{SessionRecord, SessionView};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::{candidate, optional_json};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireHr;
use crate::state::AppState;

/// Request body for `POST /candidates/{id}/verification`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateVerificationRequest {
    /// Ask for the UAN step (experienced candidates).
    #[serde(default)]
    pub include_uan: bool,
}

/// A session as HR sees it: the candidate view plus the link to send.
#[derive(Debug, Serialize)]
pub struct HrSessionResponse {
    pub id: DbId,
    pub token: String,
    /// Path of the candidate-facing page for this session.
    pub verify_path: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub session: SessionView,
}

impl From<SessionRecord> for HrSessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            verify_path: format!("/verify/{}", record.token),
            session: record.view(),
            created_at: record.created_at,
            token: record.token,
        }
    }
}

/// POST /api/v1/candidates/{id}/verification
pub async fn create(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(candidate_id): Path<DbId>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<HrSessionResponse>)> {
    let request: CreateVerificationRequest = optional_json(&body)?;
    candidate::find(&state, &user, candidate_id).await?;

    let record = state
        .engine
        .create_session(candidate_id, request.include_uan, Some(user.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /api/v1/candidates/{id}/verification
pub async fn get_for_candidate(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(candidate_id): Path<DbId>,
) -> AppResult<Json<HrSessionResponse>> {
    candidate::find(&state, &user, candidate_id).await?;
    let record = state
        .engine
        .session_for_candidate(candidate_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("VerificationSession", candidate_id)))?;
    Ok(Json(record.into()))
}

/// POST /api/v1/verifications/{token}/score
///
/// Report an externally computed Trust Score for a submitted session.
pub async fn record_score(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(score): Json<TrustScore>,
) -> AppResult<Json<HrSessionResponse>> {
    ensure_owned(&state, &user, &token).await?;
    let record = state.engine.record_score(&token, score).await?;
    Ok(Json(record.into()))
}

/// POST /api/v1/verifications/{token}/finalize
pub async fn finalize(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<HrSessionResponse>> {
    ensure_owned(&state, &user, &token).await?;
    let record = state.engine.finalize(&token).await?;
    Ok(Json(record.into()))
}

/// A session whose candidate belongs to another HR user is not found.
async fn ensure_owned(state: &AppState, user: &AuthUser, token: &str) -> AppResult<()> {
    let record = state.engine.session_by_token(token).await?;
    if !candidate::is_visible(state, user, record.candidate.id).await? {
        return Err(AppError::Core(CoreError::not_found(
            "VerificationSession",
            log_prefix(token),
        )));
    }
    Ok(())
}
