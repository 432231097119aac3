//! Surepass DigiLocker client.
//!
//! Wraps the Surepass HTTP API (`digilocker/initialize`,
//! `digilocker/download-aadhaar/{client_id}`) using [`reqwest`]. Requests
//! carry a bearer token, time out after a configurable window, and are
//! retried once on transport failure or a 5xx response.

use std::time::Duration;

use async_trait::async_trait;
use kovanent_core::masking::mask_twelve_digit;
use kovanent_core::verification::StepType;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::{
    validate_redirect_url, IdentityProvider, ProviderProof, ProviderSession,
    DEFAULT_SESSION_EXPIRY_SECS,
};

/// Extra attempts after the first on a transient failure.
const MAX_RETRIES: u32 = 1;

/// Connection settings for the Surepass API.
#[derive(Debug, Clone)]
pub struct SurepassConfig {
    /// e.g. `https://sandbox.surepass.io/api/v1`
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// HTTP client for the Surepass DigiLocker endpoints.
pub struct SurepassProvider {
    client: reqwest::Client,
    config: SurepassConfig,
}

/// Surepass wraps every payload in `{"data": ..., "success": ..., "message": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    client_id: String,
    url: String,
    #[serde(default)]
    expiry_seconds: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DownloadData {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    aadhaar_xml_data: Option<AadhaarXml>,
}

#[derive(Debug, Deserialize)]
struct AadhaarXml {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    dob: Option<String>,
    #[serde(default)]
    masked_aadhaar: Option<String>,
}

impl SurepassProvider {
    pub fn new(config: SurepassConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: SurepassConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Send a request built by `build`, retrying once on a transient failure.
    async fn send_with_retry<F>(&self, endpoint: &str, build: F) -> Result<reqwest::Response, ProviderError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let result = build()
                .bearer_auth(&self.config.api_key)
                .send()
                .await
                .map_err(ProviderError::from);
            let result = match result {
                Ok(response) => Self::ensure_success(response).await,
                Err(e) => Err(e),
            };
            match result {
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(endpoint, attempt, error = %e, "Surepass call failed, retrying");
                }
                other => {
                    tracing::info!(endpoint, ok = other.is_ok(), "Surepass call finished");
                    return other;
                }
            }
        }
    }

    /// Map non-2xx statuses onto provider errors.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(match status.as_u16() {
            401 | 403 => ProviderError::Unavailable("Surepass authentication failed".to_string()),
            404 => ProviderError::SessionNotFound(message_or(&body, "session not found")),
            422 => ProviderError::Rejected(message_or(&body, "verification rejected")),
            429 => ProviderError::Unavailable("Surepass rate limit exceeded".to_string()),
            code => ProviderError::api(code, &body),
        })
    }

    /// Parse a successful JSON response and unwrap the `data` envelope.
    async fn parse_data<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let envelope = response.json::<Envelope<T>>().await?;
        if envelope.success == Some(false) {
            return Err(ProviderError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "verification rejected".to_string()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| ProviderError::Unavailable("Surepass returned no data".to_string()))
    }
}

/// Pull a `message` field out of an error body, falling back to `default`.
fn message_or(body: &str, default: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}

fn ensure_supported(step_type: StepType) -> Result<(), ProviderError> {
    if step_type == StepType::Aadhaar {
        Ok(())
    } else {
        Err(ProviderError::InvalidInput {
            field: "step_type",
            reason: format!("{step_type} is not verified through DigiLocker"),
        })
    }
}

#[async_trait]
impl IdentityProvider for SurepassProvider {
    fn name(&self) -> &'static str {
        "surepass"
    }

    async fn initiate(
        &self,
        step_type: StepType,
        redirect_url: &str,
    ) -> Result<ProviderSession, ProviderError> {
        ensure_supported(step_type)?;
        let redirect = validate_redirect_url(redirect_url)?;
        let body = serde_json::json!({
            "data": {
                "signup_flow": true,
                "redirect_url": redirect.as_str(),
            }
        });
        let url = self.url("digilocker/initialize");
        let response = self
            .send_with_retry("digilocker/initialize", || self.client.post(&url).json(&body))
            .await?;
        let data: InitializeData = Self::parse_data(response).await?;
        Ok(ProviderSession {
            client_id: data.client_id,
            url: data.url,
            expiry_seconds: data.expiry_seconds.unwrap_or(DEFAULT_SESSION_EXPIRY_SECS),
        })
    }

    async fn fetch(&self, step_type: StepType, client_id: &str) -> Result<ProviderProof, ProviderError> {
        ensure_supported(step_type)?;
        if client_id.trim().is_empty() {
            return Err(ProviderError::InvalidInput {
                field: "client_id",
                reason: "must not be empty".to_string(),
            });
        }
        let endpoint = format!("digilocker/download-aadhaar/{client_id}");
        let url = self.url(&endpoint);
        let response = self
            .send_with_retry(&endpoint, || self.client.get(&url))
            .await?;
        let data: DownloadData = Self::parse_data(response).await?;
        let xml = data.aadhaar_xml_data.ok_or_else(|| {
            ProviderError::Unavailable("DigiLocker returned no Aadhaar data".to_string())
        })?;
        Ok(ProviderProof {
            reference: format!(
                "digilocker:{}",
                data.client_id.as_deref().unwrap_or(client_id)
            ),
            full_name: xml.full_name,
            dob: xml.dob,
            masked_id: xml.masked_aadhaar.map(|m| {
                if m.contains('X') || m.contains('x') {
                    m
                } else {
                    mask_twelve_digit(&m)
                }
            }),
        })
    }
}
