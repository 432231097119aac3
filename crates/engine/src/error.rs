use kovanent_core::error::CoreError;
use kovanent_provider::ProviderError;

/// Errors from the verification engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The identity provider failed. The step has already been returned to
    /// `PENDING` with a reason the candidate can read.
    #[error("External provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Shorthand for the error returned when a versioned write lost a race.
    pub fn stale_write(what: &str) -> Self {
        Self::Core(CoreError::Conflict(format!(
            "{what} was changed by another request; reload and retry"
        )))
    }
}
