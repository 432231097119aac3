//! Verification session and step rows, and their conversion into the
//! domain types the engine works with.

use kovanent_core::error::CoreError;
use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{
    SessionStatus, StepMetadata, StepStatus, StepType, VerificationStep,
};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `verification_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VerificationSession {
    pub id: DbId,
    pub candidate_id: DbId,
    pub token: String,
    pub status: String,
    pub trust_score: Option<i32>,
    pub score_breakdown: Option<serde_json::Value>,
    pub consent_given_at: Option<Timestamp>,
    pub submitted_at: Option<Timestamp>,
    pub scored_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub expires_at: Timestamp,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VerificationSession {
    pub fn session_status(&self) -> Result<SessionStatus, CoreError> {
        SessionStatus::from_str_db(&self.status)
    }
}

/// A row from the `verification_steps` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VerificationStepRow {
    pub id: DbId,
    pub session_id: DbId,
    pub step_type: String,
    pub position: i32,
    pub status: String,
    pub metadata: serde_json::Value,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VerificationStepRow {
    /// Decode the stored strings and JSON into a typed step.
    pub fn into_domain(self) -> Result<VerificationStep, CoreError> {
        let step_type = StepType::parse(&self.step_type)?;
        let status = StepStatus::from_str_db(&self.status)?;
        let metadata: StepMetadata = serde_json::from_value(self.metadata).map_err(|e| {
            CoreError::Internal(format!(
                "Corrupt metadata on step {} of session {}: {e}",
                self.step_type, self.session_id
            ))
        })?;
        if metadata.step_type() != step_type {
            return Err(CoreError::Internal(format!(
                "Step {} of session {} carries {} metadata",
                step_type,
                self.session_id,
                metadata.step_type()
            )));
        }
        Ok(VerificationStep {
            step_type,
            position: self.position,
            status,
            metadata,
            version: self.version,
            updated_at: self.updated_at,
        })
    }
}

/// DTO for creating a session together with its ordered steps.
#[derive(Debug, Clone)]
pub struct CreateVerificationSession {
    pub candidate_id: DbId,
    pub token: String,
    pub expires_at: Timestamp,
    pub created_by: Option<DbId>,
    pub steps: Vec<StepType>,
}

/// A versioned write of one step's status and metadata.
#[derive(Debug, Clone)]
pub struct StepWrite {
    pub step_type: StepType,
    pub status: StepStatus,
    pub metadata: serde_json::Value,
    /// Version the caller read; the write only lands if it is still current.
    pub expected_version: i64,
    pub updated_at: Timestamp,
}

impl StepWrite {
    /// Build the write that persists `next`, read at `expected_version`.
    pub fn from_step(next: &VerificationStep, expected_version: i64) -> Result<Self, CoreError> {
        let metadata = serde_json::to_value(&next.metadata)
            .map_err(|e| CoreError::Internal(format!("Cannot encode step metadata: {e}")))?;
        Ok(Self {
            step_type: next.step_type,
            status: next.status,
            metadata,
            expected_version,
            updated_at: next.updated_at,
        })
    }
}
