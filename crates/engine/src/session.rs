//! Session records as loaded from storage, and the views handed to callers.

use kovanent_core::candidate::CandidateStatus;
use kovanent_core::error::CoreError;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{
    current_step, session_phase, SessionPhase, SessionStatus, StepType, VerificationStep,
};
use serde::Serialize;

/// The candidate a session belongs to. Read-only within the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSummary {
    pub id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: CandidateStatus,
}

/// A session and its steps, in fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: DbId,
    pub token: String,
    pub candidate: CandidateSummary,
    pub status: SessionStatus,
    pub steps: Vec<VerificationStep>,
    pub expires_at: Timestamp,
    pub consent_given_at: Option<Timestamp>,
    pub submitted_at: Option<Timestamp>,
    pub trust_score: Option<TrustScore>,
    pub created_at: Timestamp,
}

impl SessionRecord {
    pub fn current_step(&self) -> Option<&VerificationStep> {
        current_step(&self.steps)
    }

    pub fn phase(&self) -> SessionPhase {
        session_phase(self.status, &self.steps)
    }

    pub fn step(&self, step_type: StepType) -> Option<&VerificationStep> {
        self.steps.iter().find(|s| s.step_type == step_type)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }

    /// Fail with `Expired` once the token's validity window has passed.
    pub fn ensure_not_expired(&self, now: Timestamp) -> Result<(), CoreError> {
        if self.is_expired(now) {
            Err(CoreError::Expired(
                "This verification link has expired. Please contact HR for a new link."
                    .to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            candidate: self.candidate.clone(),
            status: self.status,
            steps: self.steps.clone(),
            current_step: self.current_step().map(|s| s.step_type),
            ready_to_submit: self.phase() == SessionPhase::ReadyToSubmit,
            expires_at: self.expires_at,
            submitted_at: self.submitted_at,
            trust_score: self.trust_score.clone(),
        }
    }
}

/// What a caller sees of a session. The token itself is never included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub candidate: CandidateSummary,
    pub status: SessionStatus,
    pub steps: Vec<VerificationStep>,
    /// First step not yet completed. `None` once every step is done.
    pub current_step: Option<StepType>,
    /// Every step completed and submission not yet recorded.
    pub ready_to_submit: bool,
    pub expires_at: Timestamp,
    pub submitted_at: Option<Timestamp>,
    pub trust_score: Option<TrustScore>,
}

/// Input for creating a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub candidate_id: DbId,
    pub token: String,
    pub expires_at: Timestamp,
    pub created_by: Option<DbId>,
    pub steps: Vec<StepType>,
}
