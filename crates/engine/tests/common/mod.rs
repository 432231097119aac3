#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kovanent_core::document::{DocumentFacts, DocumentType};
use kovanent_core::error::CoreError;
use kovanent_core::step_submission::{
    FaceLivenessSubmission, PanSubmission, PersonalInfoSubmission, UanSubmission,
};
use kovanent_core::tokens::generate_session_token;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::verification::{SessionStatus, StepType};
use kovanent_engine::{
    DeferredAggregator, EngineConfig, LocalSubmission, MemorySessionStore, NewSession,
    SessionRecord, SessionStore, SessionView, TrustScoreAggregator, VerificationEngine,
};
use kovanent_provider::{MockProvider, MOCK_DOB, MOCK_FULL_NAME};

pub const RETURN_URL: &str = "https://app.example.com/verify/return";

pub struct Harness {
    pub engine: Arc<VerificationEngine>,
    pub store: Arc<MemorySessionStore>,
    pub provider: Arc<MockProvider>,
}

pub fn harness() -> Harness {
    harness_with(MockProvider::new(), Arc::new(DeferredAggregator), EngineConfig::default())
}

pub fn harness_with(
    provider: MockProvider,
    aggregator: Arc<dyn TrustScoreAggregator>,
    config: EngineConfig,
) -> Harness {
    let store = Arc::new(MemorySessionStore::new());
    let provider = Arc::new(provider);
    let engine = Arc::new(VerificationEngine::new(
        store.clone(),
        provider.clone(),
        aggregator,
        config,
    ));
    Harness {
        engine,
        store,
        provider,
    }
}

/// Open a session with an explicit step order, bypassing the default plan.
pub async fn open_session(h: &Harness, steps: &[StepType]) -> SessionRecord {
    let candidate = h.store.insert_candidate("Asha Verma", Some("asha@example.com"));
    h.store
        .create_session(NewSession {
            candidate_id: candidate.id,
            token: generate_session_token(),
            expires_at: chrono::Utc::now() + chrono::Duration::days(7),
            created_by: None,
            steps: steps.to_vec(),
        })
        .await
        .expect("session creation should succeed")
}

/// Personal details matching the identity the mock provider verifies.
pub fn valid_personal_info() -> LocalSubmission {
    personal_info(MOCK_FULL_NAME, MOCK_DOB)
}

pub fn personal_info(full_name: &str, dob: &str) -> LocalSubmission {
    LocalSubmission::PersonalInfo(PersonalInfoSubmission {
        full_name: full_name.to_string(),
        dob: dob.to_string(),
        email: "asha@example.com".to_string(),
        phone: Some("9876543210".to_string()),
        address: None,
    })
}

pub fn valid_pan() -> LocalSubmission {
    LocalSubmission::Pan(PanSubmission {
        pan_number: "ABCDE1234F".to_string(),
    })
}

pub fn fresher_uan() -> LocalSubmission {
    LocalSubmission::Uan(UanSubmission {
        uan_number: None,
        is_fresher: true,
    })
}

/// Upload a selfie for the session's candidate and build the submission.
pub fn selfie_for(h: &Harness, record: &SessionRecord) -> LocalSubmission {
    let id = h.store.insert_document(
        record.candidate.id,
        DocumentFacts {
            doc_type: DocumentType::Selfie,
            mime_type: "image/jpeg".to_string(),
        },
    );
    LocalSubmission::FaceLiveness(FaceLivenessSubmission {
        selfie_document_id: id,
    })
}

/// Drive every step of `record` to COMPLETED in order.
pub async fn complete_all_steps(h: &Harness, record: &SessionRecord) {
    let token = record.token.as_str();
    for step in &record.steps {
        match step.step_type {
            StepType::PersonalInfo => {
                h.engine.submit_step(token, valid_personal_info()).await.unwrap();
            }
            StepType::FaceLiveness => {
                let body = selfie_for(h, record);
                h.engine.submit_step(token, body).await.unwrap();
            }
            StepType::Aadhaar => {
                let started = h
                    .engine
                    .initiate_external_step(token, StepType::Aadhaar, RETURN_URL)
                    .await
                    .unwrap();
                h.engine
                    .complete_external_step(token, StepType::Aadhaar, Some(&started.client_id))
                    .await
                    .unwrap();
            }
            StepType::Pan => {
                h.engine.submit_step(token, valid_pan()).await.unwrap();
            }
            StepType::Uan => {
                h.engine.submit_step(token, fresher_uan()).await.unwrap();
            }
        }
    }
}

/// Poll the store until the session reaches `status` or give up.
pub async fn wait_for_status(h: &Harness, token: &str, status: SessionStatus) -> SessionRecord {
    for _ in 0..100 {
        let record = h.store.load_by_token(token).await.unwrap().unwrap();
        if record.status == status {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never reached {status:?}");
}

/// Aggregator that always returns the same score.
pub struct FixedAggregator(pub TrustScore);

#[async_trait]
impl TrustScoreAggregator for FixedAggregator {
    async fn aggregate(&self, _session: &SessionView) -> Result<Option<TrustScore>, CoreError> {
        Ok(Some(self.0.clone()))
    }
}
