//! Postgres-backed session store.

use async_trait::async_trait;
use kovanent_core::candidate::CandidateStatus;
use kovanent_core::document::{DocumentFacts, DocumentType};
use kovanent_core::error::CoreError;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{SessionStatus, VerificationStep};
use kovanent_db::models::verification::{CreateVerificationSession, StepWrite, VerificationSession};
use kovanent_db::repositories::{CandidateRepo, DocumentRepo, VerificationRepo};
use sqlx::PgPool;

use super::SessionStore;
use crate::error::EngineError;
use crate::session::{CandidateSummary, NewSession, SessionRecord};

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Assemble a full record from a session row.
    async fn hydrate(&self, session: VerificationSession) -> Result<SessionRecord, EngineError> {
        let candidate = CandidateRepo::find_by_id(&self.pool, session.candidate_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Candidate", session.candidate_id))?;
        let steps = VerificationRepo::list_steps(&self.pool, session.id)
            .await?
            .into_iter()
            .map(|row| row.into_domain())
            .collect::<Result<Vec<_>, _>>()?;

        let trust_score = match session.trust_score {
            Some(score) => Some(TrustScore {
                score,
                breakdown: session
                    .score_breakdown
                    .as_ref()
                    .and_then(|b| b.as_object().cloned())
                    .unwrap_or_default(),
            }),
            None => None,
        };

        Ok(SessionRecord {
            id: session.id,
            status: session.session_status()?,
            token: session.token,
            candidate: CandidateSummary {
                id: candidate.id,
                status: CandidateStatus::from_str_db(&candidate.status)?,
                name: candidate.name,
                email: candidate.email,
                phone: candidate.phone,
            },
            steps,
            expires_at: session.expires_at,
            consent_given_at: session.consent_given_at,
            submitted_at: session.submitted_at,
            trust_score,
            created_at: session.created_at,
        })
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, new: NewSession) -> Result<SessionRecord, EngineError> {
        let session = VerificationRepo::create_session(
            &self.pool,
            &CreateVerificationSession {
                candidate_id: new.candidate_id,
                token: new.token,
                expires_at: new.expires_at,
                created_by: new.created_by,
                steps: new.steps,
            },
        )
        .await?;
        self.hydrate(session).await
    }

    async fn load_by_token(&self, token: &str) -> Result<Option<SessionRecord>, EngineError> {
        match VerificationRepo::find_by_token(&self.pool, token).await? {
            Some(session) => Ok(Some(self.hydrate(session).await?)),
            None => Ok(None),
        }
    }

    async fn load_by_candidate(
        &self,
        candidate_id: DbId,
    ) -> Result<Option<SessionRecord>, EngineError> {
        match VerificationRepo::find_by_candidate(&self.pool, candidate_id).await? {
            Some(session) => Ok(Some(self.hydrate(session).await?)),
            None => Ok(None),
        }
    }

    async fn save_step(
        &self,
        session_id: DbId,
        next: &VerificationStep,
        expected_version: i64,
    ) -> Result<Option<VerificationStep>, EngineError> {
        let write = StepWrite::from_step(next, expected_version)?;
        match VerificationRepo::update_step(&self.pool, session_id, &write).await? {
            Some(row) => Ok(Some(row.into_domain()?)),
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        session_id: DbId,
        from: SessionStatus,
        to: SessionStatus,
        at: Timestamp,
    ) -> Result<bool, EngineError> {
        Ok(
            VerificationRepo::transition_status(&self.pool, session_id, from, to, at)
                .await?
                .is_some(),
        )
    }

    async fn record_score(
        &self,
        session_id: DbId,
        score: &TrustScore,
        at: Timestamp,
    ) -> Result<bool, EngineError> {
        let breakdown = serde_json::Value::Object(score.breakdown.clone());
        Ok(
            VerificationRepo::record_score(&self.pool, session_id, score.score, &breakdown, at)
                .await?
                .is_some(),
        )
    }

    async fn advance_candidate(
        &self,
        candidate_id: DbId,
        to: CandidateStatus,
    ) -> Result<(), EngineError> {
        CandidateRepo::advance_status(&self.pool, candidate_id, to).await?;
        Ok(())
    }

    async fn find_document(
        &self,
        candidate_id: DbId,
        document_id: DbId,
    ) -> Result<Option<DocumentFacts>, EngineError> {
        match DocumentRepo::find_for_candidate(&self.pool, candidate_id, document_id).await? {
            Some(doc) => Ok(Some(DocumentFacts {
                doc_type: DocumentType::from_str_db(&doc.doc_type)?,
                mime_type: doc.mime_type,
            })),
            None => Ok(None),
        }
    }
}
