//! Repository for the `candidates` table.

use kovanent_core::candidate::CandidateStatus;
use kovanent_core::types::DbId;
use sqlx::PgPool;

use crate::models::candidate::{Candidate, CreateCandidate, UpdateCandidate};

const COLUMNS: &str = "id, name, email, phone, national_id, dob, status, created_by, \
                       created_at, updated_at";

/// Provides CRUD operations for candidates. There is no delete.
pub struct CandidateRepo;

impl CandidateRepo {
    /// Insert a new candidate in `pending` status.
    ///
    /// `input.national_id` must already be normalized.
    pub async fn create(
        pool: &PgPool,
        input: &CreateCandidate,
        created_by: Option<DbId>,
    ) -> Result<Candidate, sqlx::Error> {
        let query = format!(
            "INSERT INTO candidates (name, email, phone, national_id, dob, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Candidate>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.national_id)
            .bind(input.dob)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Candidate>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM candidates WHERE id = $1");
        sqlx::query_as::<_, Candidate>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a candidate created by `owner`. With `owner` of `None` any
    /// candidate matches.
    pub async fn find_for_owner(
        pool: &PgPool,
        id: DbId,
        owner: Option<DbId>,
    ) -> Result<Option<Candidate>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM candidates
             WHERE id = $1 AND ($2::BIGINT IS NULL OR created_by = $2)"
        );
        sqlx::query_as::<_, Candidate>(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// List candidates, most recent first, optionally filtered by owner and
    /// status.
    pub async fn list(
        pool: &PgPool,
        owner: Option<DbId>,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Candidate>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM candidates
             WHERE ($1::BIGINT IS NULL OR created_by = $1)
               AND ($2::TEXT IS NULL OR status = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Candidate>(&query)
            .bind(owner)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Update a candidate. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists for `owner`.
    /// Status ordering is checked by the caller.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        owner: Option<DbId>,
        input: &UpdateCandidate,
    ) -> Result<Option<Candidate>, sqlx::Error> {
        let query = format!(
            "UPDATE candidates SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                status = COALESCE($5, status),
                updated_at = NOW()
             WHERE id = $1 AND ($6::BIGINT IS NULL OR created_by = $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Candidate>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(&input.status)
            .bind(owner)
            .fetch_optional(pool)
            .await
    }

    /// Move a candidate forward to `to` if it is currently behind it.
    ///
    /// Returns `true` if the row changed. A candidate already at or past
    /// `to` is left untouched.
    pub async fn advance_status(
        pool: &PgPool,
        id: DbId,
        to: CandidateStatus,
    ) -> Result<bool, sqlx::Error> {
        let behind: Vec<&str> = [
            CandidateStatus::Pending,
            CandidateStatus::InProgress,
            CandidateStatus::Completed,
        ]
        .into_iter()
        .filter(|s| *s < to)
        .map(CandidateStatus::as_str)
        .collect();

        let result = sqlx::query(
            "UPDATE candidates SET status = $2, updated_at = NOW()
             WHERE id = $1 AND status = ANY($3)",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(&behind)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
