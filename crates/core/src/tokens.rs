//! Verification session tokens.
//!
//! A session token is the only credential a candidate holds, so it is long,
//! random, and URL-safe. Tokens are logged by prefix only.

use rand::Rng;

use crate::types::Timestamp;

/// Length of a generated session token.
pub const TOKEN_LENGTH: usize = 64;

/// Number of leading characters that may appear in logs.
pub const TOKEN_LOG_PREFIX_LENGTH: usize = 8;

/// Default validity window for a freshly issued session token.
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

/// Generate a new random session token of [`TOKEN_LENGTH`] alphanumeric characters.
pub fn generate_session_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Loggable prefix of a token, e.g. `"a1B2c3D4…"`.
pub fn log_prefix(token: &str) -> String {
    let end = token
        .char_indices()
        .nth(TOKEN_LOG_PREFIX_LENGTH)
        .map_or(token.len(), |(i, _)| i);
    format!("{}…", &token[..end])
}

/// Expiry timestamp for a token issued at `issued_at`.
pub fn expiry_from(issued_at: Timestamp, ttl_days: i64) -> Timestamp {
    issued_at + chrono::Duration::days(ttl_days)
}

/// Reject obviously malformed tokens before touching storage.
pub fn is_well_formed(token: &str) -> bool {
    !token.is_empty() && token.len() <= 128 && token.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_long_and_alphanumeric() {
        let token = generate_session_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(is_well_formed(&token));
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(generate_session_token(), generate_session_token());
    }

    #[test]
    fn log_prefix_truncates() {
        assert_eq!(log_prefix("abcdefghijklmnop"), "abcdefgh…");
        assert_eq!(log_prefix("abc"), "abc…");
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("../etc/passwd"));
        assert!(!is_well_formed(&"a".repeat(129)));
    }

    #[test]
    fn expiry_adds_days() {
        let now = chrono::Utc::now();
        assert_eq!(expiry_from(now, 7) - now, chrono::Duration::days(7));
    }
}
