use kovanent_core::masking::mask_sensitive;

/// Errors from an identity provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned an unexpected non-2xx status code.
    #[error("Provider API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, with identity numbers masked.
        body: String,
    },

    /// The provider has no session for this correlation id (expired or never existed).
    #[error("Provider session not found: {0}")]
    SessionNotFound(String),

    /// The provider refused the verification (consent denied, data mismatch).
    #[error("Verification rejected by provider: {0}")]
    Rejected(String),

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Authentication, rate limiting, or an unusable response.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Build an [`ProviderError::Api`] with identity numbers masked out of the body.
    pub fn api(status: u16, body: &str) -> Self {
        Self::Api {
            status,
            body: mask_sensitive(body),
        }
    }

    /// Reason safe to show the candidate.
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionNotFound(_) => {
                "Your DigiLocker session was not found or has expired. Please start again."
                    .to_string()
            }
            Self::Rejected(reason) => format!("Verification was not successful: {reason}"),
            Self::InvalidInput { field, reason } => format!("Invalid {field}: {reason}"),
            Self::Request(_) | Self::Api { .. } | Self::Unavailable(_) => {
                "The identity provider is unavailable right now. Please try again.".to_string()
            }
        }
    }

    /// Whether the same call may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
