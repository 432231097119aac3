//! Verification session and step state machines.
//!
//! A session is an ordered, fixed list of steps. Steps are strictly
//! sequential gates: only the first incomplete step may be acted on. Steps
//! that leave the application (DigiLocker for Aadhaar) keep their in-flight
//! correlation state in typed [`StepMetadata`] so a browser reload can pick
//! the flow back up.
//!
//! Step transitions:
//!
//! ```text
//! PENDING --initiate--> IN_PROGRESS --provider success--> COMPLETED (terminal)
//! PENDING --initiate--> IN_PROGRESS --provider failure/stale--> PENDING
//! IN_PROGRESS --identity mismatch--> FAILED --initiate--> IN_PROGRESS
//! PENDING --local validation fails--> FAILED --resubmit--> PENDING --> ...
//! ```
//!
//! Session transitions are forward only:
//! `IN_PROGRESS -> SUBMITTED -> SCORED -> COMPLETED`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::identity::IdentityMatch;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Step type
// ---------------------------------------------------------------------------

/// Kinds of verification step. Unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    PersonalInfo,
    FaceLiveness,
    Aadhaar,
    Pan,
    Uan,
}

impl StepType {
    /// Every step type, in default session order.
    pub const ALL: [StepType; 5] = [
        Self::PersonalInfo,
        Self::FaceLiveness,
        Self::Aadhaar,
        Self::Pan,
        Self::Uan,
    ];

    /// Database / wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PersonalInfo => "PERSONAL_INFO",
            Self::FaceLiveness => "FACE_LIVENESS",
            Self::Aadhaar => "AADHAAR",
            Self::Pan => "PAN",
            Self::Uan => "UAN",
        }
    }

    /// Parse a step type. Accepts the canonical form and the lowercase /
    /// kebab-case spelling used in URL paths (`personal-info`).
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        match normalized.as_str() {
            "PERSONAL_INFO" => Ok(Self::PersonalInfo),
            "FACE_LIVENESS" | "FACE" => Ok(Self::FaceLiveness),
            "AADHAAR" => Ok(Self::Aadhaar),
            "PAN" => Ok(Self::Pan),
            "UAN" => Ok(Self::Uan),
            _ => Err(CoreError::Validation(format!("Invalid step type '{s}'"))),
        }
    }

    /// Whether this step is completed by redirecting the browser to an
    /// external identity provider and waiting for it to come back.
    pub fn requires_redirect(self) -> bool {
        matches!(self, Self::Aadhaar)
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::PersonalInfo => "Personal Information",
            Self::FaceLiveness => "Face Liveness",
            Self::Aadhaar => "Aadhaar (DigiLocker)",
            Self::Pan => "PAN",
            Self::Uan => "UAN",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step order used when HR opens a session for a candidate.
///
/// UAN is only requested for experienced candidates.
pub fn default_step_plan(include_uan: bool) -> Vec<StepType> {
    let mut plan = vec![
        StepType::PersonalInfo,
        StepType::FaceLiveness,
        StepType::Aadhaar,
        StepType::Pan,
    ];
    if include_uan {
        plan.push(StepType::Uan);
    }
    plan
}

/// A plan must be non-empty and name each step type at most once.
pub fn validate_step_plan(plan: &[StepType]) -> Result<(), CoreError> {
    if plan.is_empty() {
        return Err(CoreError::Validation(
            "A verification session needs at least one step".to_string(),
        ));
    }
    for (i, ty) in plan.iter().enumerate() {
        if plan[..i].contains(ty) {
            return Err(CoreError::Validation(format!(
                "Step {ty} appears more than once"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Step status
// ---------------------------------------------------------------------------

/// Status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    InProgress,
    Failed,
    Completed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Failed => "FAILED",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "FAILED" => Ok(Self::Failed),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(CoreError::Validation(format!(
                "Invalid step status '{s}'. Must be one of: PENDING, IN_PROGRESS, FAILED, COMPLETED"
            ))),
        }
    }

    /// `COMPLETED` is the only terminal step status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// Status of a whole verification session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Submitted,
    Scored,
    Completed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Scored => "SCORED",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUBMITTED" => Ok(Self::Submitted),
            "SCORED" => Ok(Self::Scored),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(CoreError::Validation(format!(
                "Invalid session status '{s}'. Must be one of: IN_PROGRESS, SUBMITTED, SCORED, COMPLETED"
            ))),
        }
    }

    /// Presentation treats every post-submission status as done.
    pub fn is_done(self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// The single status this one may advance to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::InProgress => Some(Self::Submitted),
            Self::Submitted => Some(Self::Scored),
            Self::Scored => Some(Self::Completed),
            Self::Completed => None,
        }
    }
}

/// Validate a session status change: exactly one step forward.
pub fn validate_session_transition(from: SessionStatus, to: SessionStatus) -> Result<(), CoreError> {
    if from.next() == Some(to) {
        Ok(())
    } else {
        Err(CoreError::PreconditionFailed(format!(
            "Cannot move verification from {} to {}",
            from.as_str(),
            to.as_str()
        )))
    }
}

// ---------------------------------------------------------------------------
// Step metadata
// ---------------------------------------------------------------------------

/// Where an external redirect flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalFlowStatus {
    #[default]
    NotStarted,
    AwaitingRedirect,
    Completed,
    /// The provider verified an identity that differs from the entered one.
    IdentityMismatch,
}

/// Scratch state for a step completed through a provider redirect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternalFlowMetadata {
    #[serde(default)]
    pub status: ExternalFlowStatus,
    /// Provider correlation id for the in-flight (or completed) exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_at: Option<Timestamp>,
    /// Provider-side reference to the fetched proof document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_dob: Option<String>,
    /// Comparison with the candidate's personal details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_match: Option<IdentityMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<Timestamp>,
    /// Reason shown to the candidate after the last failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Scratch state for a step validated synchronously on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct LocalStepMetadata<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<T>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl<T> Default for LocalStepMetadata<T> {
    fn default() -> Self {
        Self {
            record: None,
            attempts: 0,
            last_error: None,
            completed_at: None,
        }
    }
}

/// Accepted personal details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfoRecord {
    pub full_name: String,
    pub dob: chrono::NaiveDate,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Reference to the stored selfie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfieRecord {
    pub document_id: DbId,
}

/// Accepted PAN (masked; the clear value is never stored in metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanRecord {
    pub pan_masked: String,
}

/// Accepted UAN details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UanRecord {
    pub is_fresher: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uan_masked: Option<String>,
}

/// Per-step scratch state, one variant per step type.
///
/// Serialized with the step type as tag so the JSON column is
/// self-describing, e.g.
/// `{"step_type":"AADHAAR","status":"awaiting_redirect","client_id":"abc"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepMetadata {
    PersonalInfo(LocalStepMetadata<PersonalInfoRecord>),
    FaceLiveness(LocalStepMetadata<SelfieRecord>),
    Aadhaar(ExternalFlowMetadata),
    Pan(LocalStepMetadata<PanRecord>),
    Uan(LocalStepMetadata<UanRecord>),
}

impl StepMetadata {
    /// Fresh metadata for a step that has not been touched yet.
    pub fn empty_for(step_type: StepType) -> Self {
        match step_type {
            StepType::PersonalInfo => Self::PersonalInfo(LocalStepMetadata::default()),
            StepType::FaceLiveness => Self::FaceLiveness(LocalStepMetadata::default()),
            StepType::Aadhaar => Self::Aadhaar(ExternalFlowMetadata::default()),
            StepType::Pan => Self::Pan(LocalStepMetadata::default()),
            StepType::Uan => Self::Uan(LocalStepMetadata::default()),
        }
    }

    pub fn step_type(&self) -> StepType {
        match self {
            Self::PersonalInfo(_) => StepType::PersonalInfo,
            Self::FaceLiveness(_) => StepType::FaceLiveness,
            Self::Aadhaar(_) => StepType::Aadhaar,
            Self::Pan(_) => StepType::Pan,
            Self::Uan(_) => StepType::Uan,
        }
    }

    /// External-flow state, if this step is a redirect step.
    pub fn external(&self) -> Option<&ExternalFlowMetadata> {
        match self {
            Self::Aadhaar(m) => Some(m),
            _ => None,
        }
    }

    fn external_mut(&mut self) -> Option<&mut ExternalFlowMetadata> {
        match self {
            Self::Aadhaar(m) => Some(m),
            _ => None,
        }
    }

    /// Reason attached to the last failed attempt, for any step type.
    pub fn last_error(&self) -> Option<&str> {
        match self {
            Self::PersonalInfo(m) => m.last_error.as_deref(),
            Self::FaceLiveness(m) => m.last_error.as_deref(),
            Self::Aadhaar(m) => m.last_error.as_deref(),
            Self::Pan(m) => m.last_error.as_deref(),
            Self::Uan(m) => m.last_error.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One step of a session, as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStep {
    pub step_type: StepType,
    /// Zero-based position in the session's fixed order.
    pub position: i32,
    pub status: StepStatus,
    pub metadata: StepMetadata,
    /// Optimistic-concurrency counter, bumped on every write.
    pub version: i64,
    pub updated_at: Timestamp,
}

impl VerificationStep {
    /// A new, untouched step.
    pub fn new(step_type: StepType, position: i32, now: Timestamp) -> Self {
        Self {
            step_type,
            position,
            status: StepStatus::Pending,
            metadata: StepMetadata::empty_for(step_type),
            version: 0,
            updated_at: now,
        }
    }

    fn touched(mut self, now: Timestamp) -> Self {
        self.version += 1;
        self.updated_at = now;
        self
    }
}

/// Provider outcome recorded on a successfully completed external step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProof {
    pub client_id: String,
    pub proof_reference: String,
    pub masked_id: Option<String>,
    pub verified_name: Option<String>,
    /// Date of birth as the provider reports it.
    pub dob: Option<String>,
}

/// Move a redirect step to `IN_PROGRESS`, remembering the provider's
/// correlation id.
///
/// Re-initiating an `IN_PROGRESS` step replaces the previous correlation id
/// (the candidate restarted the flow).
pub fn begin_external(
    step: &VerificationStep,
    client_id: &str,
    now: Timestamp,
) -> Result<VerificationStep, CoreError> {
    if !step.step_type.requires_redirect() {
        return Err(CoreError::Validation(format!(
            "Step {} does not use an external redirect",
            step.step_type
        )));
    }
    if step.status.is_terminal() {
        return Err(CoreError::PreconditionFailed(format!(
            "Step {} is already completed",
            step.step_type
        )));
    }
    if client_id.trim().is_empty() {
        return Err(CoreError::ExternalProvider(
            "Provider returned an empty correlation id".to_string(),
        ));
    }

    let mut next = step.clone();
    next.status = StepStatus::InProgress;
    let meta = ExternalFlowMetadata {
        status: ExternalFlowStatus::AwaitingRedirect,
        client_id: Some(client_id.to_string()),
        initiated_at: Some(now),
        ..ExternalFlowMetadata::default()
    };
    next.metadata = StepMetadata::Aadhaar(meta);
    Ok(next.touched(now))
}

/// Pick the correlation id to complete with: the one supplied by the
/// caller (from the return URL), else the one stored at initiation while
/// the redirect is still outstanding.
pub fn resolve_correlation_id(step: &VerificationStep, supplied: Option<&str>) -> Option<String> {
    supplied
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            step.metadata
                .external()
                .filter(|m| m.status == ExternalFlowStatus::AwaitingRedirect)
                .and_then(|m| m.client_id.clone())
        })
}

/// Record a provider exchange.
///
/// Without an identity comparison, or with an accepted one, the step is
/// `COMPLETED` (terminal). A failed comparison leaves it `FAILED` with the
/// reason, keeping the proof details; the candidate restarts the redirect.
pub fn complete_external(
    step: &VerificationStep,
    proof: ExternalProof,
    identity: Option<IdentityMatch>,
    now: Timestamp,
) -> Result<VerificationStep, CoreError> {
    if step.status.is_terminal() {
        return Err(CoreError::PreconditionFailed(format!(
            "Step {} is already completed",
            step.step_type
        )));
    }
    let mut next = step.clone();
    let initiated_at = next.metadata.external().and_then(|m| m.initiated_at);
    let meta = next.metadata.external_mut().ok_or_else(|| {
        CoreError::Validation(format!(
            "Step {} does not use an external redirect",
            step.step_type
        ))
    })?;
    let rejection = identity
        .as_ref()
        .filter(|m| !m.status.is_accepted())
        .map(IdentityMatch::failure_reason);
    *meta = ExternalFlowMetadata {
        status: if rejection.is_some() {
            ExternalFlowStatus::IdentityMismatch
        } else {
            ExternalFlowStatus::Completed
        },
        client_id: Some(proof.client_id),
        initiated_at,
        proof_reference: Some(proof.proof_reference),
        masked_id: proof.masked_id,
        verified_name: proof.verified_name,
        verified_dob: proof.dob,
        identity_match: identity,
        verified_at: Some(now),
        last_error: rejection.clone(),
    };
    next.status = if rejection.is_some() {
        StepStatus::Failed
    } else {
        StepStatus::Completed
    };
    Ok(next.touched(now))
}

/// Return a redirect step to `PENDING` so the candidate can retry.
///
/// The stored correlation id is dropped: a reload must show the start
/// button, not auto-complete against a dead provider session.
pub fn reset_external(
    step: &VerificationStep,
    reason: &str,
    now: Timestamp,
) -> Result<VerificationStep, CoreError> {
    if step.status.is_terminal() {
        return Err(CoreError::PreconditionFailed(format!(
            "Step {} is already completed",
            step.step_type
        )));
    }
    let mut next = step.clone();
    let meta = next.metadata.external_mut().ok_or_else(|| {
        CoreError::Validation(format!(
            "Step {} does not use an external redirect",
            step.step_type
        ))
    })?;
    *meta = ExternalFlowMetadata {
        last_error: Some(reason.to_string()),
        ..ExternalFlowMetadata::default()
    };
    next.status = StepStatus::Pending;
    Ok(next.touched(now))
}

/// Whether an `IN_PROGRESS` redirect step has waited longer than `window`
/// for the provider to call back.
pub fn is_stale(step: &VerificationStep, now: Timestamp, window: chrono::Duration) -> bool {
    if step.status != StepStatus::InProgress {
        return false;
    }
    let started = step
        .metadata
        .external()
        .and_then(|m| m.initiated_at)
        .unwrap_or(step.updated_at);
    now - started > window
}

/// Reason recorded when a stale redirect step is released for retry.
pub const STALE_REDIRECT_REASON: &str =
    "The identity provider session expired before verification finished. Please try again.";

/// Outcome of synchronously validating a local step submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOutcome {
    Accepted(StepMetadata),
    Rejected(String),
}

/// Apply a local (non-redirect) submission result.
///
/// A `FAILED` step is first returned to `PENDING`, then the outcome moves
/// it to `COMPLETED` or back to `FAILED`. The attempt counter and last
/// error live in the step metadata.
pub fn apply_local_outcome(
    step: &VerificationStep,
    outcome: LocalOutcome,
    now: Timestamp,
) -> Result<VerificationStep, CoreError> {
    if step.step_type.requires_redirect() {
        return Err(CoreError::Validation(format!(
            "Step {} must be completed through the identity provider",
            step.step_type
        )));
    }
    if step.status.is_terminal() {
        return Err(CoreError::PreconditionFailed(format!(
            "Step {} is already completed",
            step.step_type
        )));
    }

    let mut next = step.clone();
    if next.status == StepStatus::Failed {
        next.status = StepStatus::Pending;
    }
    let attempts = local_attempts(&next.metadata) + 1;

    match outcome {
        LocalOutcome::Accepted(metadata) => {
            if metadata.step_type() != step.step_type {
                return Err(CoreError::Internal(format!(
                    "Metadata for {} applied to step {}",
                    metadata.step_type(),
                    step.step_type
                )));
            }
            next.metadata = with_local_bookkeeping(metadata, attempts, None, Some(now));
            next.status = StepStatus::Completed;
        }
        LocalOutcome::Rejected(reason) => {
            let previous = next.metadata.clone();
            next.metadata = with_local_bookkeeping(previous, attempts, Some(reason), None);
            next.status = StepStatus::Failed;
        }
    }
    Ok(next.touched(now))
}

fn local_attempts(meta: &StepMetadata) -> u32 {
    match meta {
        StepMetadata::PersonalInfo(m) => m.attempts,
        StepMetadata::FaceLiveness(m) => m.attempts,
        StepMetadata::Pan(m) => m.attempts,
        StepMetadata::Uan(m) => m.attempts,
        StepMetadata::Aadhaar(_) => 0,
    }
}

fn with_local_bookkeeping(
    meta: StepMetadata,
    attempts: u32,
    last_error: Option<String>,
    completed_at: Option<Timestamp>,
) -> StepMetadata {
    fn stamp<T>(
        mut m: LocalStepMetadata<T>,
        attempts: u32,
        last_error: Option<String>,
        completed_at: Option<Timestamp>,
    ) -> LocalStepMetadata<T> {
        m.attempts = attempts;
        m.last_error = last_error;
        m.completed_at = completed_at;
        m
    }
    match meta {
        StepMetadata::PersonalInfo(m) => {
            StepMetadata::PersonalInfo(stamp(m, attempts, last_error, completed_at))
        }
        StepMetadata::FaceLiveness(m) => {
            StepMetadata::FaceLiveness(stamp(m, attempts, last_error, completed_at))
        }
        StepMetadata::Pan(m) => StepMetadata::Pan(stamp(m, attempts, last_error, completed_at)),
        StepMetadata::Uan(m) => StepMetadata::Uan(stamp(m, attempts, last_error, completed_at)),
        other @ StepMetadata::Aadhaar(_) => other,
    }
}

// ---------------------------------------------------------------------------
// Session-level rules
// ---------------------------------------------------------------------------

/// The step the candidate must deal with next: the first step, in fixed
/// order, that is not `COMPLETED`.
///
/// An `IN_PROGRESS` redirect step is still the current step; later steps
/// stay locked until it resolves.
pub fn current_step(steps: &[VerificationStep]) -> Option<&VerificationStep> {
    steps.iter().find(|s| !s.status.is_terminal())
}

/// Personal details the candidate entered, once that step is completed.
pub fn claimed_identity(steps: &[VerificationStep]) -> Option<&PersonalInfoRecord> {
    steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .find_map(|s| match &s.metadata {
            StepMetadata::PersonalInfo(m) => m.record.as_ref(),
            _ => None,
        })
}

/// Derived position of a session in the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "step_type", rename_all = "snake_case")]
pub enum SessionPhase {
    /// Waiting on this step.
    AtStep(StepType),
    /// Every step is complete; consent and submission remain.
    ReadyToSubmit,
    /// Submission recorded.
    Done,
}

/// Derive the wizard phase from stored state.
pub fn session_phase(status: SessionStatus, steps: &[VerificationStep]) -> SessionPhase {
    if status.is_done() {
        return SessionPhase::Done;
    }
    match current_step(steps) {
        Some(step) => SessionPhase::AtStep(step.step_type),
        None => SessionPhase::ReadyToSubmit,
    }
}

/// Whether a step action is allowed to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepGate {
    /// The step is the current step; act on it.
    Open(usize),
    /// The step finished earlier; the action is a no-op.
    AlreadyCompleted(usize),
}

/// Check that `step_type` is the step the candidate may act on now.
pub fn gate_step(
    status: SessionStatus,
    steps: &[VerificationStep],
    step_type: StepType,
) -> Result<StepGate, CoreError> {
    let index = steps
        .iter()
        .position(|s| s.step_type == step_type)
        .ok_or_else(|| CoreError::not_found("VerificationStep", step_type))?;

    if steps[index].status.is_terminal() {
        return Ok(StepGate::AlreadyCompleted(index));
    }
    if status.is_done() {
        return Err(CoreError::PreconditionFailed(
            "This verification has already been submitted".to_string(),
        ));
    }
    if let Some(blocking) = steps[..index].iter().find(|s| !s.status.is_terminal()) {
        return Err(CoreError::PreconditionFailed(format!(
            "Complete step {} before {}",
            blocking.step_type, step_type
        )));
    }
    Ok(StepGate::Open(index))
}

/// Check every submission precondition: still in progress, all steps
/// completed, and final consent given.
pub fn check_submittable(
    status: SessionStatus,
    steps: &[VerificationStep],
    consent: bool,
) -> Result<(), CoreError> {
    if status.is_done() {
        return Err(CoreError::PreconditionFailed(
            "This verification has already been submitted".to_string(),
        ));
    }
    if steps.is_empty() {
        return Err(CoreError::PreconditionFailed(
            "Verification has no steps".to_string(),
        ));
    }
    if let Some(step) = current_step(steps) {
        return Err(CoreError::PreconditionFailed(format!(
            "Step {} is not complete ({})",
            step.step_type,
            step.status.as_str()
        )));
    }
    if !consent {
        return Err(CoreError::PreconditionFailed(
            "Final consent is required before submission".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
