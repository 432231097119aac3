//! The verification session engine.
//!
//! Every mutating operation follows the same shape: take the token's lock,
//! reload the session, check the gate, compute the next step state with the
//! pure transitions in `kovanent_core::verification`, then write it back
//! conditional on the version that was read. Each call returns the updated
//! step or session so callers never need a follow-up read.

use std::sync::Arc;

use chrono::Utc;
use kovanent_core::candidate::CandidateStatus;
use kovanent_core::error::CoreError;
use kovanent_core::identity::compare_identity;
use kovanent_core::step_submission::{
    evaluate_face_liveness, evaluate_pan, evaluate_personal_info, evaluate_uan,
    FaceLivenessSubmission, PanSubmission, PersonalInfoSubmission, UanSubmission,
};
use kovanent_core::tokens::{expiry_from, generate_session_token, is_well_formed, log_prefix};
use kovanent_core::trust_score::TrustScore;
use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{
    apply_local_outcome, begin_external, check_submittable, claimed_identity, complete_external,
    default_step_plan,
    gate_step, is_stale, reset_external, resolve_correlation_id, validate_session_transition,
    validate_step_plan, ExternalProof, SessionStatus, StepGate, StepStatus, StepType,
    VerificationStep, STALE_REDIRECT_REASON,
};
use kovanent_provider::{IdentityProvider, ProviderError};
use serde::Serialize;

use crate::aggregator::TrustScoreAggregator;
use crate::error::EngineError;
use crate::locks::TokenLocks;
use crate::session::{NewSession, SessionRecord};
use crate::store::SessionStore;

/// Reason recorded when completion is attempted with no correlation id at all.
const MISSING_CORRELATION_REASON: &str =
    "No active DigiLocker session was found. Please start the verification again.";

/// Tunables for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Validity window of a newly issued session token, in days.
    pub token_ttl_days: i64,
    /// How long a redirect step may sit `IN_PROGRESS` before it is released
    /// for retry.
    pub external_step_stale_after: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            token_ttl_days: kovanent_core::tokens::DEFAULT_TOKEN_TTL_DAYS,
            external_step_stale_after: chrono::Duration::seconds(1800),
        }
    }
}

/// Result of opening a provider session for a redirect step.
#[derive(Debug, Clone, Serialize)]
pub struct InitiatedStep {
    pub url: String,
    pub client_id: String,
    pub expiry_seconds: u64,
    pub step: VerificationStep,
}

/// A typed submission for a step validated synchronously.
#[derive(Debug, Clone)]
pub enum LocalSubmission {
    PersonalInfo(PersonalInfoSubmission),
    FaceLiveness(FaceLivenessSubmission),
    Pan(PanSubmission),
    Uan(UanSubmission),
}

impl LocalSubmission {
    pub fn step_type(&self) -> StepType {
        match self {
            Self::PersonalInfo(_) => StepType::PersonalInfo,
            Self::FaceLiveness(_) => StepType::FaceLiveness,
            Self::Pan(_) => StepType::Pan,
            Self::Uan(_) => StepType::Uan,
        }
    }
}

pub struct VerificationEngine {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn IdentityProvider>,
    aggregator: Arc<dyn TrustScoreAggregator>,
    locks: TokenLocks,
    config: EngineConfig,
}

impl VerificationEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn IdentityProvider>,
        aggregator: Arc<dyn TrustScoreAggregator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            provider,
            aggregator,
            locks: TokenLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // HR side
    // -----------------------------------------------------------------------

    /// Open a session for a candidate with the default step order.
    pub async fn create_session(
        &self,
        candidate_id: DbId,
        include_uan: bool,
        created_by: Option<DbId>,
    ) -> Result<SessionRecord, EngineError> {
        let steps = default_step_plan(include_uan);
        validate_step_plan(&steps)?;
        let token = generate_session_token();
        let expires_at = expiry_from(Utc::now(), self.config.token_ttl_days);

        let record = self
            .store
            .create_session(NewSession {
                candidate_id,
                token,
                expires_at,
                created_by,
                steps,
            })
            .await?;

        tracing::info!(
            session_id = record.id,
            candidate_id,
            token = %log_prefix(&record.token),
            steps = record.steps.len(),
            "Verification session created",
        );
        Ok(record)
    }

    /// The session for a candidate, as stored. No expiry or staleness handling.
    pub async fn session_for_candidate(
        &self,
        candidate_id: DbId,
    ) -> Result<Option<SessionRecord>, EngineError> {
        self.store.load_by_candidate(candidate_id).await
    }

    /// The session behind `token`, as stored. No expiry or staleness
    /// handling, and the candidate status is left alone.
    pub async fn session_by_token(&self, token: &str) -> Result<SessionRecord, EngineError> {
        self.load(token).await
    }

    /// Record an externally computed Trust Score: `SUBMITTED -> SCORED`.
    pub async fn record_score(
        &self,
        token: &str,
        score: TrustScore,
    ) -> Result<SessionRecord, EngineError> {
        score.validate()?;
        let _guard = self.locks.acquire(token).await;
        let record = self.load(token).await?;
        validate_session_transition(record.status, SessionStatus::Scored)?;

        if !self
            .store
            .record_score(record.id, &score, Utc::now())
            .await?
        {
            return Err(EngineError::stale_write("Verification session"));
        }
        tracing::info!(
            session_id = record.id,
            score = score.score,
            "Trust score recorded",
        );
        self.load(token).await
    }

    /// External finalization: `SCORED -> COMPLETED`.
    pub async fn finalize(&self, token: &str) -> Result<SessionRecord, EngineError> {
        let _guard = self.locks.acquire(token).await;
        let record = self.load(token).await?;
        validate_session_transition(record.status, SessionStatus::Completed)?;
        if !self
            .store
            .transition(
                record.id,
                SessionStatus::Scored,
                SessionStatus::Completed,
                Utc::now(),
            )
            .await?
        {
            return Err(EngineError::stale_write("Verification session"));
        }
        tracing::info!(session_id = record.id, "Verification finalized");
        self.load(token).await
    }

    // -----------------------------------------------------------------------
    // Candidate side
    // -----------------------------------------------------------------------

    /// Fetch the session for a candidate.
    ///
    /// Redirect steps left `IN_PROGRESS` past the staleness window are
    /// released back to `PENDING` (and persisted) before the session is
    /// returned. The first read moves the candidate to `in_progress`.
    pub async fn get_session(&self, token: &str) -> Result<SessionRecord, EngineError> {
        let now = Utc::now();
        let mut record = self.load(token).await?;
        record.ensure_not_expired(now)?;

        if self.has_stale_steps(&record, now) {
            let _guard = self.locks.acquire(token).await;
            record = self.load(token).await?;
            self.release_stale_steps(&mut record, now).await?;
        }

        if record.candidate.status == CandidateStatus::Pending
            && record.status == SessionStatus::InProgress
        {
            self.store
                .advance_candidate(record.candidate.id, CandidateStatus::InProgress)
                .await?;
            record.candidate.status = CandidateStatus::InProgress;
        }
        Ok(record)
    }

    /// Open a provider session for a redirect step and mark it `IN_PROGRESS`.
    pub async fn initiate_external_step(
        &self,
        token: &str,
        step_type: StepType,
        redirect_url: &str,
    ) -> Result<InitiatedStep, EngineError> {
        let _guard = self.locks.acquire(token).await;
        let now = Utc::now();
        let mut record = self.load(token).await?;
        record.ensure_not_expired(now)?;
        self.release_stale_steps(&mut record, now).await?;

        let index = match gate_step(record.status, &record.steps, step_type)? {
            StepGate::Open(i) => i,
            StepGate::AlreadyCompleted(_) => {
                return Err(CoreError::PreconditionFailed(format!(
                    "Step {step_type} is already completed"
                ))
                .into());
            }
        };
        let step = record.steps[index].clone();
        if !step_type.requires_redirect() {
            return Err(CoreError::Validation(format!(
                "Step {step_type} is submitted directly, not through a provider redirect"
            ))
            .into());
        }

        let session = match self.provider.initiate(step_type, redirect_url).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail_external(&record, &step, e, now).await),
        };

        let next = begin_external(&step, &session.client_id, now)?;
        let stored = self.save(&record, &next, step.version).await?;
        tracing::info!(
            token = %log_prefix(token),
            step = %step_type,
            provider = self.provider.name(),
            client_id = %session.client_id,
            "External verification initiated",
        );
        Ok(InitiatedStep {
            url: session.url,
            client_id: session.client_id,
            expiry_seconds: session.expiry_seconds,
            step: stored,
        })
    }

    /// Finish a redirect step after the browser comes back.
    ///
    /// The correlation id is taken from `correlation_id` if given, else from
    /// the step's stored metadata. Completing an already-completed step
    /// returns it unchanged without contacting the provider.
    ///
    /// The verified identity is compared with the entered personal details;
    /// a failed comparison comes back as a `FAILED` step, not an error.
    pub async fn complete_external_step(
        &self,
        token: &str,
        step_type: StepType,
        correlation_id: Option<&str>,
    ) -> Result<VerificationStep, EngineError> {
        let _guard = self.locks.acquire(token).await;
        let now = Utc::now();
        let record = self.load(token).await?;
        record.ensure_not_expired(now)?;

        let index = match gate_step(record.status, &record.steps, step_type)? {
            StepGate::Open(i) => i,
            StepGate::AlreadyCompleted(i) => {
                tracing::debug!(
                    token = %log_prefix(token),
                    step = %step_type,
                    "Completion for already-completed step ignored",
                );
                return Ok(record.steps[i].clone());
            }
        };
        let step = record.steps[index].clone();
        if !step_type.requires_redirect() {
            return Err(CoreError::Validation(format!(
                "Step {step_type} is submitted directly, not through a provider redirect"
            ))
            .into());
        }

        let Some(client_id) = resolve_correlation_id(&step, correlation_id) else {
            if step.status == StepStatus::InProgress {
                let next = reset_external(&step, MISSING_CORRELATION_REASON, now)?;
                self.save(&record, &next, step.version).await?;
            }
            return Err(CoreError::Validation(MISSING_CORRELATION_REASON.to_string()).into());
        };

        let proof = match self.provider.fetch(step_type, &client_id).await {
            Ok(proof) => proof,
            Err(e) => return Err(self.fail_external(&record, &step, e, now).await),
        };

        let proof = ExternalProof {
            client_id,
            proof_reference: proof.reference,
            masked_id: proof.masked_id,
            verified_name: proof.full_name,
            dob: proof.dob,
        };
        let identity =
            claimed_identity(&record.steps).map(|claimed| compare_identity(claimed, &proof));
        let next = complete_external(&step, proof, identity.clone(), now)?;
        let stored = self.save(&record, &next, step.version).await?;
        match &identity {
            Some(m) if !m.status.is_accepted() => tracing::warn!(
                token = %log_prefix(token),
                step = %step_type,
                score = m.score,
                name_match = m.name_match,
                dob_match = m.dob_match,
                "Verified identity does not match entered details",
            ),
            _ => tracing::info!(
                token = %log_prefix(token),
                step = %step_type,
                identity = ?identity.as_ref().map(|m| m.status),
                "External verification completed",
            ),
        }
        Ok(stored)
    }

    /// Validate and record a synchronously checked step.
    ///
    /// Invalid input is not an error: the step comes back `FAILED` with the
    /// reason in its metadata.
    pub async fn submit_step(
        &self,
        token: &str,
        submission: LocalSubmission,
    ) -> Result<VerificationStep, EngineError> {
        let step_type = submission.step_type();
        let _guard = self.locks.acquire(token).await;
        let now = Utc::now();
        let mut record = self.load(token).await?;
        record.ensure_not_expired(now)?;
        self.release_stale_steps(&mut record, now).await?;

        let index = match gate_step(record.status, &record.steps, step_type)? {
            StepGate::Open(i) => i,
            StepGate::AlreadyCompleted(i) => return Ok(record.steps[i].clone()),
        };
        let step = record.steps[index].clone();

        let outcome = match &submission {
            LocalSubmission::PersonalInfo(body) => {
                evaluate_personal_info(body, now.date_naive())
            }
            LocalSubmission::FaceLiveness(body) => {
                let doc = self
                    .store
                    .find_document(record.candidate.id, body.selfie_document_id)
                    .await?;
                evaluate_face_liveness(body, doc.as_ref())
            }
            LocalSubmission::Pan(body) => evaluate_pan(body),
            LocalSubmission::Uan(body) => evaluate_uan(body),
        };

        let next = apply_local_outcome(&step, outcome, now)?;
        let stored = self.save(&record, &next, step.version).await?;
        tracing::info!(
            token = %log_prefix(token),
            step = %step_type,
            status = stored.status.as_str(),
            "Step submission processed",
        );
        Ok(stored)
    }

    /// Record final submission. Requires every step completed and consent.
    ///
    /// The Trust Score aggregator is started in the background; this call
    /// does not wait for it.
    pub async fn submit(&self, token: &str, consent: bool) -> Result<SessionRecord, EngineError> {
        let _guard = self.locks.acquire(token).await;
        let now = Utc::now();
        let record = self.load(token).await?;
        record.ensure_not_expired(now)?;
        check_submittable(record.status, &record.steps, consent)?;

        if !self
            .store
            .transition(
                record.id,
                SessionStatus::InProgress,
                SessionStatus::Submitted,
                now,
            )
            .await?
        {
            return Err(EngineError::stale_write("Verification session"));
        }
        self.store
            .advance_candidate(record.candidate.id, CandidateStatus::Completed)
            .await?;

        let submitted = self.load(token).await?;
        tracing::info!(
            token = %log_prefix(token),
            session_id = submitted.id,
            "Verification submitted",
        );
        self.spawn_aggregation(&submitted);
        Ok(submitted)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn load(&self, token: &str) -> Result<SessionRecord, EngineError> {
        if !is_well_formed(token) {
            return Err(CoreError::not_found("VerificationSession", log_prefix(token)).into());
        }
        self.store
            .load_by_token(token)
            .await?
            .ok_or_else(|| CoreError::not_found("VerificationSession", log_prefix(token)).into())
    }

    /// Versioned write of one step; a lost race is a `Conflict`.
    async fn save(
        &self,
        record: &SessionRecord,
        next: &VerificationStep,
        expected_version: i64,
    ) -> Result<VerificationStep, EngineError> {
        self.store
            .save_step(record.id, next, expected_version)
            .await?
            .ok_or_else(|| EngineError::stale_write("Verification step"))
    }

    /// Reset a redirect step after a provider failure and hand back the
    /// error to return. A failure to persist the reset wins over the
    /// provider error.
    async fn fail_external(
        &self,
        record: &SessionRecord,
        step: &VerificationStep,
        error: ProviderError,
        now: Timestamp,
    ) -> EngineError {
        tracing::warn!(
            token = %log_prefix(&record.token),
            step = %step.step_type,
            error = %error,
            "Identity provider call failed",
        );
        let reset = reset_external(step, &error.user_message(), now)
            .map_err(EngineError::from);
        let saved = match reset {
            Ok(next) => self.save(record, &next, step.version).await.map(|_| ()),
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => EngineError::Provider(error),
            Err(e) => e,
        }
    }

    fn has_stale_steps(&self, record: &SessionRecord, now: Timestamp) -> bool {
        record.status == SessionStatus::InProgress
            && record
                .steps
                .iter()
                .any(|s| is_stale(s, now, self.config.external_step_stale_after))
    }

    /// Release stale redirect steps. Caller holds the token lock.
    async fn release_stale_steps(
        &self,
        record: &mut SessionRecord,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if !self.has_stale_steps(record, now) {
            return Ok(());
        }
        for i in 0..record.steps.len() {
            let step = &record.steps[i];
            if !is_stale(step, now, self.config.external_step_stale_after) {
                continue;
            }
            let next = reset_external(step, STALE_REDIRECT_REASON, now)?;
            let stored = self.save(record, &next, step.version).await?;
            tracing::info!(
                token = %log_prefix(&record.token),
                step = %stored.step_type,
                "Stale external step released for retry",
            );
            record.steps[i] = stored;
        }
        Ok(())
    }

    fn spawn_aggregation(&self, record: &SessionRecord) {
        let store = Arc::clone(&self.store);
        let aggregator = Arc::clone(&self.aggregator);
        let session_id = record.id;
        let view = record.view();
        tokio::spawn(async move {
            match aggregator.aggregate(&view).await {
                Ok(Some(score)) => {
                    if let Err(e) = score.validate() {
                        tracing::error!(session_id, error = %e, "Aggregator produced an invalid score");
                        return;
                    }
                    match store.record_score(session_id, &score, Utc::now()).await {
                        Ok(true) => {
                            tracing::info!(session_id, score = score.score, "Session scored")
                        }
                        Ok(false) => {
                            tracing::warn!(session_id, "Session left SUBMITTED before scoring")
                        }
                        Err(e) => tracing::error!(session_id, error = %e, "Failed to store score"),
                    }
                }
                Ok(None) => {
                    tracing::debug!(session_id, "Scoring deferred to external scorer");
                }
                Err(e) => tracing::error!(session_id, error = %e, "Trust score aggregation failed"),
            }
        });
    }
}
