//! Candidate-facing verification surface, addressed by session token.
//!
//! None of these routes need a login: possession of the token is the
//! credential.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use kovanent_core::error::CoreError;
use kovanent_core::verification::{StepType, VerificationStep};
use kovanent_db::models::document::Document;
use kovanent_engine::{InitiatedStep, LocalSubmission, SessionView};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::document::{persist_upload, UploadForm};
use crate::handlers::optional_json;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for `POST /verify/{token}/{step_type}/initiate`.
#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    /// Where the provider sends the browser back to.
    pub redirect_url: String,
}

/// Correlation id for a redirect completion, from the query string or body.
#[derive(Debug, Default, Deserialize)]
pub struct CompleteParams {
    pub client_id: Option<String>,
}

/// Body for `POST /verify/{token}/submit`. A missing body means no consent.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub consent: bool,
}

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub step: VerificationStep,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/verify/{token}
pub async fn get_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<SessionView>> {
    let record = state.engine.get_session(&token).await?;
    Ok(Json(record.view()))
}

/// POST /api/v1/verify/{token}/{step_type}/initiate
pub async fn initiate(
    State(state): State<AppState>,
    Path((token, step)): Path<(String, String)>,
    Json(input): Json<InitiateRequest>,
) -> AppResult<Json<InitiatedStep>> {
    let step_type = StepType::parse(&step)?;
    let initiated = state
        .engine
        .initiate_external_step(&token, step_type, &input.redirect_url)
        .await?;
    Ok(Json(initiated))
}

/// POST /api/v1/verify/{token}/{step_type}/complete?client_id=
///
/// The body may be empty. A `client_id` in the query wins over one in the
/// body; with neither, the id stored at initiation is used.
pub async fn complete(
    State(state): State<AppState>,
    Path((token, step)): Path<(String, String)>,
    Query(params): Query<CompleteParams>,
    body: Bytes,
) -> AppResult<Json<StepResponse>> {
    let step_type = StepType::parse(&step)?;
    let from_body: CompleteParams = optional_json(&body)?;
    let client_id = params.client_id.or(from_body.client_id);

    let step = state
        .engine
        .complete_external_step(&token, step_type, client_id.as_deref())
        .await?;
    Ok(Json(StepResponse { step }))
}

/// POST /api/v1/verify/{token}/{step_type}/submit
///
/// Submit a step that is checked synchronously. A rejected submission is a
/// 200 with the step `FAILED`.
pub async fn submit_step(
    State(state): State<AppState>,
    Path((token, step)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<StepResponse>> {
    let submission = decode_submission(StepType::parse(&step)?, body)?;
    let step = state.engine.submit_step(&token, submission).await?;
    Ok(Json(StepResponse { step }))
}

/// POST /api/v1/verify/{token}/submit
pub async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> AppResult<Json<SessionView>> {
    let input: SubmitRequest = optional_json(&body)?;
    let record = state.engine.submit(&token, input.consent).await?;
    Ok(Json(record.view()))
}

/// POST /api/v1/verify/{token}/documents
///
/// Candidate upload (e.g. the selfie for face liveness). Multipart fields:
/// `file`, `doc_type`.
pub async fn upload_document(
    State(state): State<AppState>,
    Path(token): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Document>)> {
    let record = state.engine.get_session(&token).await?;
    if record.status.is_done() {
        return Err(AppError::Core(CoreError::PreconditionFailed(
            "Verification has already been submitted".into(),
        )));
    }

    let form = UploadForm::read(multipart).await?;
    let upload = form.into_upload(record.candidate.id, state.config.upload.max_bytes)?;
    let doc = persist_upload(&state, upload, None).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// Decode a raw step body into the submission for `step_type`.
pub(crate) fn decode_submission(
    step_type: StepType,
    body: serde_json::Value,
) -> AppResult<LocalSubmission> {
    Ok(match step_type {
        StepType::PersonalInfo => LocalSubmission::PersonalInfo(decode(body)?),
        StepType::FaceLiveness => LocalSubmission::FaceLiveness(decode(body)?),
        StepType::Pan => LocalSubmission::Pan(decode(body)?),
        StepType::Uan => LocalSubmission::Uan(decode(body)?),
        StepType::Aadhaar => {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Step {step_type} is completed through the provider redirect"
            ))));
        }
    })
}

fn decode<T: DeserializeOwned>(body: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(format!("Invalid step body: {e}")))
}
