//! Deterministic in-process identity provider.
//!
//! Used when `SUREPASS_ENABLED` is off and in tests. Issues sequential
//! correlation ids, accepts any non-empty id on fetch, and counts calls so
//! tests can assert that an exchange ran exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kovanent_core::verification::StepType;

use crate::error::ProviderError;
use crate::{
    validate_redirect_url, IdentityProvider, ProviderProof, ProviderSession,
    DEFAULT_SESSION_EXPIRY_SECS,
};

/// Name on every identity the mock verifies.
pub const MOCK_FULL_NAME: &str = "Test Candidate";
/// Date of birth on every identity the mock verifies.
pub const MOCK_DOB: &str = "1990-01-01";

/// What the next `fetch` calls should do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MockFetchOutcome {
    #[default]
    Verified,
    Rejected(String),
    SessionNotFound,
    Unavailable,
}

#[derive(Default)]
pub struct MockProvider {
    fixed_client_id: Option<String>,
    fetch_delay: Option<Duration>,
    fetch_outcome: Mutex<MockFetchOutcome>,
    initiate_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always hand out `client_id` from `initiate`.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.fixed_client_id = Some(client_id.into());
        self
    }

    /// Sleep before answering `fetch`, to widen race windows in tests.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn set_fetch_outcome(&self, outcome: MockFetchOutcome) {
        *self
            .fetch_outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = outcome;
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn current_outcome(&self) -> MockFetchOutcome {
        self.fetch_outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn initiate(
        &self,
        step_type: StepType,
        redirect_url: &str,
    ) -> Result<ProviderSession, ProviderError> {
        let redirect = validate_redirect_url(redirect_url)?;
        let n = self.initiate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let client_id = self
            .fixed_client_id
            .clone()
            .unwrap_or_else(|| format!("mock_{}_{n}", step_type.as_str().to_ascii_lowercase()));
        tracing::info!(step = %step_type, client_id = %client_id, "Mock provider session opened");
        Ok(ProviderSession {
            url: format!(
                "https://mock-digilocker.local/auth?client_id={client_id}&redirect_url={}",
                redirect.as_str()
            ),
            client_id,
            expiry_seconds: DEFAULT_SESSION_EXPIRY_SECS,
        })
    }

    async fn fetch(&self, step_type: StepType, client_id: &str) -> Result<ProviderProof, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if client_id.trim().is_empty() {
            return Err(ProviderError::InvalidInput {
                field: "client_id",
                reason: "must not be empty".to_string(),
            });
        }
        match self.current_outcome() {
            MockFetchOutcome::Verified => Ok(ProviderProof {
                reference: format!("mock:{}:{client_id}", step_type.as_str()),
                full_name: Some(MOCK_FULL_NAME.to_string()),
                dob: Some(MOCK_DOB.to_string()),
                masked_id: Some("XXXX-XXXX-1234".to_string()),
            }),
            MockFetchOutcome::Rejected(reason) => Err(ProviderError::Rejected(reason)),
            MockFetchOutcome::SessionNotFound => {
                Err(ProviderError::SessionNotFound(client_id.to_string()))
            }
            MockFetchOutcome::Unavailable => Err(ProviderError::Unavailable(
                "mock provider is down".to_string(),
            )),
        }
    }
}
