//! Repository for the `verification_sessions` and `verification_steps` tables.

use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{SessionStatus, StepMetadata};
use sqlx::PgPool;

use crate::models::verification::{
    CreateVerificationSession, StepWrite, VerificationSession, VerificationStepRow,
};

const SESSION_COLUMNS: &str = "id, candidate_id, token, status, trust_score, score_breakdown, \
     consent_given_at, submitted_at, scored_at, completed_at, expires_at, created_by, \
     created_at, updated_at";

const STEP_COLUMNS: &str =
    "id, session_id, step_type, position, status, metadata, version, created_at, updated_at";

/// Provides persistence for verification sessions and their steps.
pub struct VerificationRepo;

impl VerificationRepo {
    /// Insert a session and its steps in one transaction.
    ///
    /// Steps are stored `PENDING` with empty metadata, positioned in the
    /// order given. A second session for the same candidate fails with the
    /// `uq_verification_sessions_candidate` unique violation.
    pub async fn create_session(
        pool: &PgPool,
        input: &CreateVerificationSession,
    ) -> Result<VerificationSession, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO verification_sessions (candidate_id, token, expires_at, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING {SESSION_COLUMNS}"
        );
        let session = sqlx::query_as::<_, VerificationSession>(&query)
            .bind(input.candidate_id)
            .bind(&input.token)
            .bind(input.expires_at)
            .bind(input.created_by)
            .fetch_one(&mut *tx)
            .await?;

        for (position, step_type) in input.steps.iter().enumerate() {
            let metadata = serde_json::to_value(StepMetadata::empty_for(*step_type))
                .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
            sqlx::query(
                "INSERT INTO verification_steps (session_id, step_type, position, metadata)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(session.id)
            .bind(step_type.as_str())
            .bind(position as i32)
            .bind(metadata)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(session)
    }

    pub async fn find_by_token(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<VerificationSession>, sqlx::Error> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM verification_sessions WHERE token = $1");
        sqlx::query_as::<_, VerificationSession>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_candidate(
        pool: &PgPool,
        candidate_id: DbId,
    ) -> Result<Option<VerificationSession>, sqlx::Error> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM verification_sessions WHERE candidate_id = $1"
        );
        sqlx::query_as::<_, VerificationSession>(&query)
            .bind(candidate_id)
            .fetch_optional(pool)
            .await
    }

    /// Steps of a session in their fixed order.
    pub async fn list_steps(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<VerificationStepRow>, sqlx::Error> {
        let query = format!(
            "SELECT {STEP_COLUMNS} FROM verification_steps
             WHERE session_id = $1
             ORDER BY position"
        );
        sqlx::query_as::<_, VerificationStepRow>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }

    /// Write a step's status and metadata together, conditional on the
    /// version the caller read.
    ///
    /// Returns `None` when the stored version moved on (a stale write).
    pub async fn update_step(
        pool: &PgPool,
        session_id: DbId,
        write: &StepWrite,
    ) -> Result<Option<VerificationStepRow>, sqlx::Error> {
        let query = format!(
            "UPDATE verification_steps SET
                status = $3,
                metadata = $4,
                version = version + 1,
                updated_at = $5
             WHERE session_id = $1 AND step_type = $2 AND version = $6
             RETURNING {STEP_COLUMNS}"
        );
        sqlx::query_as::<_, VerificationStepRow>(&query)
            .bind(session_id)
            .bind(write.step_type.as_str())
            .bind(write.status.as_str())
            .bind(&write.metadata)
            .bind(write.updated_at)
            .bind(write.expected_version)
            .fetch_optional(pool)
            .await
    }

    /// Move a session from `from` to `to`, stamping the matching timestamp
    /// column. Submission also stamps `consent_given_at`, since it is only
    /// accepted with consent.
    ///
    /// Returns `None` if the session was not in `from`.
    pub async fn transition_status(
        pool: &PgPool,
        session_id: DbId,
        from: SessionStatus,
        to: SessionStatus,
        at: Timestamp,
    ) -> Result<Option<VerificationSession>, sqlx::Error> {
        let query = format!(
            "UPDATE verification_sessions SET
                status = $3,
                consent_given_at = CASE WHEN $3 = 'SUBMITTED' THEN $4 ELSE consent_given_at END,
                submitted_at = CASE WHEN $3 = 'SUBMITTED' THEN $4 ELSE submitted_at END,
                scored_at = CASE WHEN $3 = 'SCORED' THEN $4 ELSE scored_at END,
                completed_at = CASE WHEN $3 = 'COMPLETED' THEN $4 ELSE completed_at END,
                updated_at = $4
             WHERE id = $1 AND status = $2
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, VerificationSession>(&query)
            .bind(session_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(at)
            .fetch_optional(pool)
            .await
    }

    /// Persist a Trust Score and move the session `SUBMITTED -> SCORED`.
    ///
    /// Returns `None` if the session was not `SUBMITTED`.
    pub async fn record_score(
        pool: &PgPool,
        session_id: DbId,
        score: i32,
        breakdown: &serde_json::Value,
        at: Timestamp,
    ) -> Result<Option<VerificationSession>, sqlx::Error> {
        let query = format!(
            "UPDATE verification_sessions SET
                status = 'SCORED',
                trust_score = $2,
                score_breakdown = $3,
                scored_at = $4,
                updated_at = $4
             WHERE id = $1 AND status = 'SUBMITTED'
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, VerificationSession>(&query)
            .bind(session_id)
            .bind(score)
            .bind(breakdown)
            .bind(at)
            .fetch_optional(pool)
            .await
    }
}
