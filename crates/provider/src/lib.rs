//! Identity-provider integration.
//!
//! Steps that leave the application (Aadhaar through DigiLocker) are
//! completed by an [`IdentityProvider`]: `initiate` hands back a URL to send
//! the browser to and a correlation id, `fetch` exchanges that id for the
//! verified identity once the browser comes back.

pub mod error;
pub mod mock;
pub mod surepass;

use async_trait::async_trait;
use kovanent_core::verification::StepType;
use serde::Serialize;

pub use error::ProviderError;
pub use mock::{MockFetchOutcome, MockProvider, MOCK_DOB, MOCK_FULL_NAME};
pub use surepass::{SurepassConfig, SurepassProvider};

/// Default lifetime of a provider session, in seconds.
pub const DEFAULT_SESSION_EXPIRY_SECS: u64 = 1800;

/// A provider-side session the browser is redirected into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSession {
    /// Correlation id echoed back on the return redirect.
    pub client_id: String,
    /// Where to send the browser.
    pub url: String,
    pub expiry_seconds: u64,
}

/// Identity data returned by the provider after the candidate consented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProof {
    /// Provider-side reference to the proof document.
    pub reference: String,
    pub full_name: Option<String>,
    pub dob: Option<String>,
    /// Masked identity number as the provider reports it.
    pub masked_id: Option<String>,
}

/// An external identity provider reached through a browser redirect.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Open a provider session for `step_type`. The provider redirects the
    /// browser back to `redirect_url` when the candidate is done.
    async fn initiate(
        &self,
        step_type: StepType,
        redirect_url: &str,
    ) -> Result<ProviderSession, ProviderError>;

    /// Exchange a correlation id for the verified identity.
    async fn fetch(&self, step_type: StepType, client_id: &str)
        -> Result<ProviderProof, ProviderError>;
}

/// Check that a redirect target is an absolute http(s) URL.
pub fn validate_redirect_url(redirect_url: &str) -> Result<reqwest::Url, ProviderError> {
    let url = reqwest::Url::parse(redirect_url).map_err(|e| ProviderError::InvalidInput {
        field: "redirect_url",
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProviderError::InvalidInput {
            field: "redirect_url",
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}
