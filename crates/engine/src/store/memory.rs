//! In-process session store.
//!
//! Backs the engine in tests and in API tests for the public verification
//! surface. Whole records are cloned out under a read lock, so readers see
//! a step either before or after a write, never half of one.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use kovanent_core::candidate::CandidateStatus;
use kovanent_core::document::DocumentFacts;
use kovanent_core::error::CoreError;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{SessionStatus, VerificationStep};

use super::SessionStore;
use crate::error::EngineError;
use crate::session::{CandidateSummary, NewSession, SessionRecord};

#[derive(Default)]
struct State {
    next_id: DbId,
    candidates: HashMap<DbId, CandidateSummary>,
    sessions: HashMap<DbId, SessionRecord>,
    tokens: HashMap<String, DbId>,
    documents: HashMap<DbId, (DbId, DocumentFacts)>,
}

impl State {
    fn allocate_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    /// Session with the candidate's current status folded in.
    fn snapshot(&self, session_id: DbId) -> Option<SessionRecord> {
        let mut record = self.sessions.get(&session_id)?.clone();
        if let Some(candidate) = self.candidates.get(&record.candidate.id) {
            record.candidate = candidate.clone();
        }
        Some(record)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    state: RwLock<State>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a candidate in `pending` status.
    pub fn insert_candidate(&self, name: &str, email: Option<&str>) -> CandidateSummary {
        let mut state = self.write();
        let id = state.allocate_id();
        let candidate = CandidateSummary {
            id,
            name: name.to_string(),
            email: email.map(str::to_string),
            phone: None,
            status: CandidateStatus::Pending,
        };
        state.candidates.insert(id, candidate.clone());
        candidate
    }

    pub fn candidate(&self, id: DbId) -> Option<CandidateSummary> {
        self.read().candidates.get(&id).cloned()
    }

    /// Register an uploaded document for a candidate, returning its id.
    pub fn insert_document(&self, candidate_id: DbId, facts: DocumentFacts) -> DbId {
        let mut state = self.write();
        let id = state.allocate_id();
        state.documents.insert(id, (candidate_id, facts));
        id
    }

    /// Overwrite a stored step without any version check. For tests that
    /// need to place a session in a specific state.
    pub fn put_step(&self, token: &str, step: VerificationStep) {
        let mut state = self.write();
        let Some(id) = state.tokens.get(token).copied() else {
            return;
        };
        if let Some(session) = state.sessions.get_mut(&id) {
            if let Some(slot) = session
                .steps
                .iter_mut()
                .find(|s| s.step_type == step.step_type)
            {
                *slot = step;
            }
        }
    }

    /// Overwrite a session's expiry. For tests.
    pub fn set_expires_at(&self, token: &str, expires_at: Timestamp) {
        let mut state = self.write();
        let Some(id) = state.tokens.get(token).copied() else {
            return;
        };
        if let Some(session) = state.sessions.get_mut(&id) {
            session.expires_at = expires_at;
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, new: NewSession) -> Result<SessionRecord, EngineError> {
        let mut state = self.write();
        let candidate = state
            .candidates
            .get(&new.candidate_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Candidate", new.candidate_id))?;
        if state
            .sessions
            .values()
            .any(|s| s.candidate.id == new.candidate_id)
        {
            return Err(CoreError::Conflict(format!(
                "Candidate {} already has a verification session",
                new.candidate_id
            ))
            .into());
        }
        if state.tokens.contains_key(&new.token) {
            return Err(CoreError::Conflict("Session token already in use".to_string()).into());
        }

        let now = chrono::Utc::now();
        let id = state.allocate_id();
        let steps = new
            .steps
            .iter()
            .enumerate()
            .map(|(i, ty)| VerificationStep::new(*ty, i as i32, now))
            .collect();
        let record = SessionRecord {
            id,
            token: new.token.clone(),
            candidate,
            status: SessionStatus::InProgress,
            steps,
            expires_at: new.expires_at,
            consent_given_at: None,
            submitted_at: None,
            trust_score: None,
            created_at: now,
        };
        state.sessions.insert(id, record.clone());
        state.tokens.insert(new.token, id);
        Ok(record)
    }

    async fn load_by_token(&self, token: &str) -> Result<Option<SessionRecord>, EngineError> {
        let state = self.read();
        Ok(state
            .tokens
            .get(token)
            .and_then(|id| state.snapshot(*id)))
    }

    async fn load_by_candidate(
        &self,
        candidate_id: DbId,
    ) -> Result<Option<SessionRecord>, EngineError> {
        let state = self.read();
        Ok(state
            .sessions
            .values()
            .find(|s| s.candidate.id == candidate_id)
            .and_then(|s| state.snapshot(s.id)))
    }

    async fn save_step(
        &self,
        session_id: DbId,
        next: &VerificationStep,
        expected_version: i64,
    ) -> Result<Option<VerificationStep>, EngineError> {
        let mut state = self.write();
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| CoreError::not_found("VerificationSession", session_id))?;
        let slot = session
            .steps
            .iter_mut()
            .find(|s| s.step_type == next.step_type)
            .ok_or_else(|| CoreError::not_found("VerificationStep", next.step_type))?;
        if slot.version != expected_version {
            return Ok(None);
        }
        let mut stored = next.clone();
        stored.version = expected_version + 1;
        *slot = stored.clone();
        Ok(Some(stored))
    }

    async fn transition(
        &self,
        session_id: DbId,
        from: SessionStatus,
        to: SessionStatus,
        at: Timestamp,
    ) -> Result<bool, EngineError> {
        let mut state = self.write();
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| CoreError::not_found("VerificationSession", session_id))?;
        if session.status != from {
            return Ok(false);
        }
        session.status = to;
        if to == SessionStatus::Submitted {
            session.submitted_at = Some(at);
            session.consent_given_at = Some(at);
        }
        Ok(true)
    }

    async fn record_score(
        &self,
        session_id: DbId,
        score: &TrustScore,
        _at: Timestamp,
    ) -> Result<bool, EngineError> {
        let mut state = self.write();
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| CoreError::not_found("VerificationSession", session_id))?;
        if session.status != SessionStatus::Submitted {
            return Ok(false);
        }
        session.status = SessionStatus::Scored;
        session.trust_score = Some(score.clone());
        Ok(true)
    }

    async fn advance_candidate(
        &self,
        candidate_id: DbId,
        to: CandidateStatus,
    ) -> Result<(), EngineError> {
        let mut state = self.write();
        let candidate = state
            .candidates
            .get_mut(&candidate_id)
            .ok_or_else(|| CoreError::not_found("Candidate", candidate_id))?;
        if candidate.status < to {
            candidate.status = to;
        }
        Ok(())
    }

    async fn find_document(
        &self,
        candidate_id: DbId,
        document_id: DbId,
    ) -> Result<Option<DocumentFacts>, EngineError> {
        Ok(self
            .read()
            .documents
            .get(&document_id)
            .filter(|(owner, _)| *owner == candidate_id)
            .map(|(_, facts)| facts.clone()))
    }
}
