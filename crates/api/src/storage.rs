//! Local file storage for uploaded documents.

use std::path::{Path, PathBuf};

use kovanent_core::document::{extension_for_mime, validate_upload_size, DocumentType};
use kovanent_core::hashing::sha256_hex;
use kovanent_core::types::DbId;
use kovanent_db::models::document::CreateDocument;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// An upload that passed type and size checks, not yet written.
#[derive(Debug)]
pub struct ValidatedUpload {
    pub candidate_id: DbId,
    pub doc_type: DocumentType,
    pub file_name: String,
    pub mime_type: String,
    pub extension: &'static str,
    pub data: Vec<u8>,
}

impl ValidatedUpload {
    pub fn new(
        candidate_id: DbId,
        doc_type: DocumentType,
        file_name: String,
        mime_type: String,
        data: Vec<u8>,
        max_bytes: usize,
    ) -> AppResult<Self> {
        let extension = extension_for_mime(&mime_type)?;
        validate_upload_size(data.len(), max_bytes)?;
        Ok(Self {
            candidate_id,
            doc_type,
            file_name,
            mime_type,
            extension,
            data,
        })
    }
}

/// Write `upload` under `root/{candidate_id}/{uuid}.{ext}` and describe the
/// row to insert for it.
pub async fn store_upload(
    root: &Path,
    upload: ValidatedUpload,
    uploaded_by: Option<DbId>,
) -> AppResult<CreateDocument> {
    let dir = root.join(upload.candidate_id.to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload directory: {e}")))?;

    let path = dir.join(format!("{}.{}", Uuid::new_v4(), upload.extension));
    tokio::fs::write(&path, &upload.data)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to write upload: {e}")))?;

    Ok(CreateDocument {
        candidate_id: upload.candidate_id,
        doc_type: upload.doc_type.as_str().to_string(),
        file_name: upload.file_name,
        file_path: path.to_string_lossy().into_owned(),
        file_size: upload.data.len() as i64,
        mime_type: upload.mime_type,
        checksum_sha256: sha256_hex(&upload.data),
        uploaded_by,
    })
}

/// Remove a stored file. A file that is already gone is not an error.
pub async fn remove_stored(path: &str) {
    match tokio::fs::remove_file(PathBuf::from(path)).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path, error = %e, "Failed to remove stored document"),
    }
}
