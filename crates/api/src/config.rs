use std::path::PathBuf;
use std::time::Duration;

use kovanent_core::document::DEFAULT_MAX_UPLOAD_BYTES;
use kovanent_core::tokens::DEFAULT_TOKEN_TTL_DAYS;
use kovanent_engine::EngineConfig;
use kovanent_provider::{SurepassConfig, DEFAULT_SESSION_EXPIRY_SECS};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// Everything except the JWT secret (and `DATABASE_URL`, read by the
/// binary) has a default suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    pub upload: UploadConfig,
    pub verification: VerificationConfig,
    /// `None` runs against the in-process mock provider.
    pub surepass: Option<SurepassConfig>,
}

/// Where uploads go and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub token_ttl_days: i64,
    /// Age after which an `IN_PROGRESS` redirect step is released for retry.
    pub external_step_stale_secs: u64,
}

impl VerificationConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            token_ttl_days: self.token_ttl_days,
            external_step_stale_after: chrono::Duration::seconds(
                i64::try_from(self.external_step_stale_secs).unwrap_or(i64::MAX),
            ),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            external_step_stale_secs: DEFAULT_SESSION_EXPIRY_SECS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                               |
    /// |-------------------------------|---------------------------------------|
    /// | `HOST`                        | `0.0.0.0`                             |
    /// | `PORT`                        | `3000`                                |
    /// | `CORS_ORIGINS`                | `http://localhost:3001`               |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                                  |
    /// | `UPLOAD_DIR`                  | `./uploads`                           |
    /// | `MAX_UPLOAD_BYTES`            | `10485760`                            |
    /// | `VERIFICATION_TOKEN_TTL_DAYS` | `7`                                   |
    /// | `EXTERNAL_STEP_STALE_SECS`    | `1800`                                |
    /// | `SUREPASS_ENABLED`            | `false`                               |
    /// | `SUREPASS_BASE_URL`           | `https://sandbox.surepass.io/api/v1`  |
    /// | `SUREPASS_API_KEY`            | required when enabled                 |
    /// | `SUREPASS_TIMEOUT_SECS`       | `10`                                  |
    ///
    /// # Panics
    ///
    /// Panics on unparsable values. Misconfiguration should stop startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3001".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 30);

        let upload = UploadConfig {
            dir: PathBuf::from(std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into())),
            max_bytes: env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
        };

        let verification = VerificationConfig {
            token_ttl_days: env_parse("VERIFICATION_TOKEN_TTL_DAYS", DEFAULT_TOKEN_TTL_DAYS),
            external_step_stale_secs: env_parse(
                "EXTERNAL_STEP_STALE_SECS",
                DEFAULT_SESSION_EXPIRY_SECS,
            ),
        };

        let surepass = if env_parse("SUREPASS_ENABLED", false) {
            let api_key = std::env::var("SUREPASS_API_KEY")
                .expect("SUREPASS_API_KEY must be set when SUREPASS_ENABLED=true");
            assert!(!api_key.is_empty(), "SUREPASS_API_KEY must not be empty");
            Some(SurepassConfig {
                base_url: std::env::var("SUREPASS_BASE_URL")
                    .unwrap_or_else(|_| "https://sandbox.surepass.io/api/v1".into()),
                api_key,
                timeout: Duration::from_secs(env_parse("SUREPASS_TIMEOUT_SECS", 10)),
            })
        } else {
            None
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            upload,
            verification,
            surepass,
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}
