//! Handlers for the `/candidates` resource.
//!
//! An HR user only sees the candidates they created; another owner's
//! candidate is reported as not found. Admins see all of them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use kovanent_core::candidate::{
    normalize_national_id, validate_candidate_email, validate_candidate_name,
    validate_status_transition, CandidateStatus,
};
use kovanent_core::error::CoreError;
use kovanent_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use kovanent_core::types::DbId;
use kovanent_db::models::candidate::{
    Candidate, CandidateListParams, CreateCandidate, UpdateCandidate,
};
use kovanent_db::repositories::CandidateRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireHr;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/candidates
pub async fn create(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Json(mut input): Json<CreateCandidate>,
) -> AppResult<(StatusCode, Json<Candidate>)> {
    validate_candidate_name(&input.name)?;
    input.name = input.name.trim().to_string();
    if let Some(email) = input.email.as_deref() {
        validate_candidate_email(email)?;
    }
    input.national_id = input
        .national_id
        .as_deref()
        .map(normalize_national_id)
        .transpose()?;

    let candidate = CandidateRepo::create(&state.pool, &input, Some(user.user_id)).await?;
    tracing::info!(candidate_id = candidate.id, created_by = user.user_id, "Candidate created");
    Ok((StatusCode::CREATED, Json(candidate)))
}

/// GET /api/v1/candidates?status=&limit=&offset=
///
/// Most recent first.
pub async fn list(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Query(params): Query<CandidateListParams>,
) -> AppResult<Json<DataResponse<Vec<Candidate>>>> {
    let status = params
        .status
        .as_deref()
        .map(CandidateStatus::from_str_db)
        .transpose()?;
    let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
    let offset = clamp_offset(params.offset);

    let candidates = CandidateRepo::list(
        &state.pool,
        user.owner_scope(),
        status.map(CandidateStatus::as_str),
        limit,
        offset,
    )
    .await?;
    Ok(Json(DataResponse { data: candidates }))
}

/// GET /api/v1/candidates/{id}
pub async fn get_by_id(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<Candidate>> {
    let candidate = find(&state, &user, id).await?;
    Ok(Json(candidate))
}

/// PATCH /api/v1/candidates/{id}
///
/// Status may only move forward.
pub async fn update(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateCandidate>,
) -> AppResult<Json<Candidate>> {
    if let Some(name) = input.name.as_deref() {
        validate_candidate_name(name)?;
        input.name = Some(name.trim().to_string());
    }
    if let Some(email) = input.email.as_deref() {
        validate_candidate_email(email)?;
    }
    if let Some(status) = input.status.as_deref() {
        let to = CandidateStatus::from_str_db(status)?;
        let current = find(&state, &user, id).await?;
        validate_status_transition(CandidateStatus::from_str_db(&current.status)?, to)?;
    }

    let candidate = CandidateRepo::update(&state.pool, id, user.owner_scope(), &input)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Candidate", id)))?;
    Ok(Json(candidate))
}

/// Load a candidate visible to `user`.
pub(crate) async fn find(state: &AppState, user: &AuthUser, id: DbId) -> AppResult<Candidate> {
    CandidateRepo::find_for_owner(&state.pool, id, user.owner_scope())
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Candidate", id)))
}

pub(crate) async fn is_visible(state: &AppState, user: &AuthUser, id: DbId) -> AppResult<bool> {
    Ok(CandidateRepo::find_for_owner(&state.pool, id, user.owner_scope())
        .await?
        .is_some())
}
