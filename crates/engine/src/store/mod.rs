//! Storage seam for the engine.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use kovanent_core::candidate::CandidateStatus;
use kovanent_core::document::DocumentFacts;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{SessionStatus, VerificationStep};

use crate::error::EngineError;
use crate::session::{NewSession, SessionRecord};

/// Persistence the engine needs.
///
/// Step writes are atomic (status and metadata together) and conditional on
/// the version the caller read. Session status writes are conditional on
/// the status the caller read.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, new: NewSession) -> Result<SessionRecord, EngineError>;

    async fn load_by_token(&self, token: &str) -> Result<Option<SessionRecord>, EngineError>;

    async fn load_by_candidate(
        &self,
        candidate_id: DbId,
    ) -> Result<Option<SessionRecord>, EngineError>;

    /// Persist `next` if the stored step is still at `expected_version`.
    /// Returns the stored step, or `None` on a stale write.
    async fn save_step(
        &self,
        session_id: DbId,
        next: &VerificationStep,
        expected_version: i64,
    ) -> Result<Option<VerificationStep>, EngineError>;

    /// Move the session `from -> to`. Returns `false` if it was not in `from`.
    async fn transition(
        &self,
        session_id: DbId,
        from: SessionStatus,
        to: SessionStatus,
        at: Timestamp,
    ) -> Result<bool, EngineError>;

    /// Store a score and move `SUBMITTED -> SCORED`. Returns `false` if the
    /// session was not `SUBMITTED`.
    async fn record_score(
        &self,
        session_id: DbId,
        score: &TrustScore,
        at: Timestamp,
    ) -> Result<bool, EngineError>;

    /// Move the candidate forward to `to`; never backwards.
    async fn advance_candidate(
        &self,
        candidate_id: DbId,
        to: CandidateStatus,
    ) -> Result<(), EngineError>;

    /// Look up a document owned by `candidate_id`.
    async fn find_document(
        &self,
        candidate_id: DbId,
        document_id: DbId,
    ) -> Result<Option<DocumentFacts>, EngineError>;
}
