//! Repository for the `documents` table.

use kovanent_core::types::DbId;
use sqlx::PgPool;

use crate::models::document::{CreateDocument, Document};

const COLUMNS: &str = "id, candidate_id, doc_type, file_name, file_path, file_size, mime_type, \
                       checksum_sha256, uploaded_by, uploaded_at, created_at, updated_at";

/// Provides persistence for uploaded documents. Rows are immutable once
/// written; deletion is explicit.
pub struct DocumentRepo;

impl DocumentRepo {
    /// Record a stored upload.
    ///
    /// Fails with the `fk_documents_candidate` violation if the candidate
    /// does not exist.
    pub async fn create(pool: &PgPool, input: &CreateDocument) -> Result<Document, sqlx::Error> {
        let query = format!(
            "INSERT INTO documents
                (candidate_id, doc_type, file_name, file_path, file_size, mime_type,
                 checksum_sha256, uploaded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(input.candidate_id)
            .bind(&input.doc_type)
            .bind(&input.file_name)
            .bind(&input.file_path)
            .bind(input.file_size)
            .bind(&input.mime_type)
            .bind(&input.checksum_sha256)
            .bind(input.uploaded_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a document only if it belongs to `candidate_id`.
    pub async fn find_for_candidate(
        pool: &PgPool,
        candidate_id: DbId,
        id: DbId,
    ) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1 AND candidate_id = $2");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .bind(candidate_id)
            .fetch_optional(pool)
            .await
    }

    /// List a candidate's documents, most recent first.
    pub async fn list_for_candidate(
        pool: &PgPool,
        candidate_id: DbId,
    ) -> Result<Vec<Document>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM documents
             WHERE candidate_id = $1
             ORDER BY uploaded_at DESC, id DESC"
        );
        sqlx::query_as::<_, Document>(&query)
            .bind(candidate_id)
            .fetch_all(pool)
            .await
    }

    /// Delete a document row, returning it so the caller can remove the file.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<Option<Document>, sqlx::Error> {
        let query = format!("DELETE FROM documents WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Document>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
