use std::time::Duration;

use kovanent_core::candidate::CandidateStatus;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::types::{DbId, Timestamp};
use kovanent_core::verification::{SessionStatus, StepType, VerificationStep};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ClientError;
use crate::resume::{resume_action, take_client_id, ResumeAction, ResumeOutcome};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateInfo {
    pub id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub status: CandidateStatus,
}

/// A session as `GET /verify/{token}` reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub candidate: CandidateInfo,
    pub status: SessionStatus,
    pub steps: Vec<VerificationStep>,
    pub current_step: Option<StepType>,
    #[serde(default)]
    pub ready_to_submit: bool,
    pub expires_at: Timestamp,
    pub submitted_at: Option<Timestamp>,
    pub trust_score: Option<TrustScore>,
}

impl Session {
    pub fn step(&self, step_type: StepType) -> Option<&VerificationStep> {
        self.steps.iter().find(|s| s.step_type == step_type)
    }
}

/// Answer to `initiate`: where to send the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiatedStep {
    pub url: String,
    pub client_id: String,
    pub expiry_seconds: u64,
    pub step: VerificationStep,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: DbId,
    pub candidate_id: DbId,
    pub doc_type: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct StepEnvelope {
    step: VerificationStep,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for one verification session, addressed by its token.
///
/// Every mutating call returns the updated step or session, so no follow-up
/// fetch is needed.
#[derive(Debug, Clone)]
pub struct VerifyClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl VerifyClient {
    /// `base_url` is the server root, e.g. `https://api.kovanent.in`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;
        Self::with_client(http, base_url, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        reqwest::Url::parse(base_url)
            .map_err(|e| ClientError::InvalidInput(format!("{base_url}: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/api/v1/verify/{}{suffix}", self.base_url, self.token)
    }

    /// GET /api/v1/verify/{token}
    pub async fn get_session(&self) -> Result<Session, ClientError> {
        self.send(self.http.get(self.url(""))).await
    }

    /// POST /api/v1/verify/{token}/{step_type}/initiate
    pub async fn initiate(
        &self,
        step_type: StepType,
        redirect_url: &str,
    ) -> Result<InitiatedStep, ClientError> {
        let url = self.url(&format!("/{}/initiate", step_type.as_str()));
        self.send(self.http.post(url).json(&json!({ "redirect_url": redirect_url })))
            .await
    }

    /// POST /api/v1/verify/{token}/{step_type}/complete
    ///
    /// Without `client_id` the server uses the id stored at initiation.
    pub async fn complete(
        &self,
        step_type: StepType,
        client_id: Option<&str>,
    ) -> Result<VerificationStep, ClientError> {
        let url = self.url(&format!("/{}/complete", step_type.as_str()));
        let envelope: StepEnvelope = self
            .send(self.http.post(url).json(&json!({ "client_id": client_id })))
            .await?;
        Ok(envelope.step)
    }

    /// POST /api/v1/verify/{token}/{step_type}/submit
    ///
    /// A rejected submission comes back as `Ok` with the step `FAILED`.
    pub async fn submit_step<B: Serialize + ?Sized>(
        &self,
        step_type: StepType,
        body: &B,
    ) -> Result<VerificationStep, ClientError> {
        let url = self.url(&format!("/{}/submit", step_type.as_str()));
        let envelope: StepEnvelope = self.send(self.http.post(url).json(body)).await?;
        Ok(envelope.step)
    }

    /// POST /api/v1/verify/{token}/documents
    pub async fn upload_document(
        &self,
        doc_type: &str,
        file_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<Document, ClientError> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| ClientError::InvalidInput(format!("{mime_type}: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("doc_type", doc_type.to_string())
            .part("file", part);
        self.send(self.http.post(self.url("/documents")).multipart(form))
            .await
    }

    /// POST /api/v1/verify/{token}/submit
    pub async fn submit(&self, consent: bool) -> Result<Session, ClientError> {
        self.send(
            self.http
                .post(self.url("/submit"))
                .json(&json!({ "consent": consent })),
        )
        .await
    }

    /// Pick up a redirect step after the browser lands on `return_url`.
    ///
    /// The correlation id is taken from the URL's `client_id` parameter and
    /// removed from it, so a later reload does not submit it again. Without
    /// one, a step still awaiting its redirect is completed with the id
    /// stored at initiation.
    pub async fn resume(
        &self,
        step_type: StepType,
        return_url: Option<&mut reqwest::Url>,
    ) -> Result<ResumeOutcome, ClientError> {
        let from_url = return_url.and_then(take_client_id);
        let session = self.get_session().await?;
        let step = session.step(step_type).ok_or_else(|| {
            ClientError::Decode(format!("Session has no {step_type} step"))
        })?;

        match resume_action(step, from_url.as_deref()) {
            ResumeAction::AlreadyCompleted => Ok(ResumeOutcome::Completed(step.clone())),
            ResumeAction::Start => Ok(ResumeOutcome::NeedsStart(step.clone())),
            ResumeAction::Complete { client_id } => {
                tracing::debug!(step = %step_type, "Resuming redirect step");
                let step = self.complete(step_type, Some(&client_id)).await?;
                Ok(ResumeOutcome::Completed(step))
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await.map_err(ClientError::Unreachable)?;
        let status = response.status();
        let body = response.text().await.map_err(ClientError::Unreachable)?;

        if !status.is_success() {
            let err = ClientError::from_response(status.as_u16(), &body);
            tracing::debug!(status = status.as_u16(), error = %err, "Verification API call failed");
            return Err(err);
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}
