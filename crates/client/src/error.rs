use serde::Deserialize;

/// Failure of a call to the verification API.
///
/// Transport failures are kept apart from errors the server reported, so a
/// caller can show "unable to reach server" instead of a business error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection refused, DNS failure, timeout.
    #[error("Unable to reach the server: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Server {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A 2xx response whose body was not what the endpoint promises.
    #[error("Unexpected response from server: {0}")]
    Decode(String),

    /// Rejected before sending (bad base URL, bad MIME type).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Error body every endpoint uses: `{"error": ..., "code": ...}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

impl ClientError {
    /// Build a `Server` error from a status and raw body.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::Server {
                status,
                code: parsed.code,
                message: parsed.error,
            },
            Err(_) => Self::Server {
                status,
                code: None,
                message: format!("Request failed with status {status}"),
            },
        }
    }

    /// Text to show the candidate.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unreachable(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::Server { message, .. } => message.clone(),
            Self::Decode(_) | Self::InvalidInput(_) => {
                "Something went wrong. Please reload the page.".to_string()
            }
        }
    }

    /// A concurrent change was detected; re-fetch the session and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Server { status: 409, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Server { status: 404, .. })
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Server { status: 410, .. })
    }
}
