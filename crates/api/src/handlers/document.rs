//! Handlers for candidate documents (HR upload, list, delete).

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use kovanent_core::document::{sanitize_file_name, DocumentType};
use kovanent_core::error::CoreError;
use kovanent_core::types::DbId;
use kovanent_db::models::document::Document;
use kovanent_db::repositories::DocumentRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::candidate;
use crate::middleware::rbac::RequireHr;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::storage::{remove_stored, store_upload, ValidatedUpload};

/// Fields collected from a document upload form.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub candidate_id: Option<DbId>,
    pub doc_type: Option<DocumentType>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug)]
pub(crate) struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl UploadForm {
    /// Read `file`, `doc_type` and (optionally) `candidate_id` fields.
    /// Unknown fields are skipped.
    pub(crate) async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            match field.name().unwrap_or("") {
                "file" => {
                    let file_name = sanitize_file_name(field.file_name().unwrap_or("upload"));
                    let mime_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.file = Some(UploadedFile {
                        file_name,
                        mime_type,
                        data: data.to_vec(),
                    });
                }
                "doc_type" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.doc_type = Some(DocumentType::from_str_db(text.trim())?);
                }
                "candidate_id" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    let id = text.trim().parse::<DbId>().map_err(|_| {
                        AppError::BadRequest(format!("Invalid candidate_id: {text}"))
                    })?;
                    form.candidate_id = Some(id);
                }
                _ => {}
            }
        }
        Ok(form)
    }

    /// Validate the file for `candidate_id`. Missing fields are a 400.
    pub(crate) fn into_upload(self, candidate_id: DbId, max_bytes: usize) -> AppResult<ValidatedUpload> {
        let doc_type = self
            .doc_type
            .ok_or_else(|| AppError::BadRequest("Missing doc_type field".into()))?;
        let file = self
            .file
            .ok_or_else(|| AppError::BadRequest("Missing file field".into()))?;
        ValidatedUpload::new(
            candidate_id,
            doc_type,
            file.file_name,
            file.mime_type,
            file.data,
            max_bytes,
        )
    }
}

/// Write the file and insert its row. The file is removed again if the
/// insert fails.
pub(crate) async fn persist_upload(
    state: &AppState,
    upload: ValidatedUpload,
    uploaded_by: Option<DbId>,
) -> AppResult<Document> {
    let input = store_upload(&state.config.upload.dir, upload, uploaded_by).await?;
    match DocumentRepo::create(&state.pool, &input).await {
        Ok(doc) => {
            tracing::info!(
                document_id = doc.id,
                candidate_id = doc.candidate_id,
                doc_type = %doc.doc_type,
                size = doc.file_size,
                "Document uploaded",
            );
            Ok(doc)
        }
        Err(e) => {
            remove_stored(&input.file_path).await;
            Err(e.into())
        }
    }
}

/// POST /api/v1/documents/upload
///
/// Multipart fields: `file`, `candidate_id`, `doc_type`.
pub async fn upload(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Document>)> {
    let form = UploadForm::read(multipart).await?;
    let candidate_id = form
        .candidate_id
        .ok_or_else(|| AppError::BadRequest("Missing candidate_id field".into()))?;
    candidate::find(&state, &user, candidate_id).await?;

    let upload = form.into_upload(candidate_id, state.config.upload.max_bytes)?;
    let doc = persist_upload(&state, upload, Some(user.user_id)).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// GET /api/v1/documents/{candidate_id}
pub async fn list_for_candidate(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(candidate_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Vec<Document>>>> {
    candidate::find(&state, &user, candidate_id).await?;
    let docs = DocumentRepo::list_for_candidate(&state.pool, candidate_id).await?;
    Ok(Json(DataResponse { data: docs }))
}

/// DELETE /api/v1/documents/{id}
pub async fn delete(
    RequireHr(user): RequireHr,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let owned = match DocumentRepo::find_by_id(&state.pool, id).await? {
        Some(doc) => candidate::is_visible(&state, &user, doc.candidate_id).await?,
        None => false,
    };
    if !owned {
        return Err(AppError::Core(CoreError::not_found("Document", id)));
    }

    let doc = DocumentRepo::delete(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Document", id)))?;
    remove_stored(&doc.file_path).await;
    tracing::info!(document_id = id, deleted_by = user.user_id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}
