//! Uploaded document model and DTOs.

use kovanent_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `documents` table. `file_path` is internal and not serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: DbId,
    pub candidate_id: DbId,
    pub doc_type: String,
    pub file_name: String,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub checksum_sha256: String,
    pub uploaded_by: Option<DbId>,
    pub uploaded_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording a stored upload.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub candidate_id: DbId,
    pub doc_type: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub checksum_sha256: String,
    pub uploaded_by: Option<DbId>,
}
