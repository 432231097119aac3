//! Trust Score aggregator contract.
//!
//! The engine hands a submitted session to the aggregator in the
//! background and never waits on it. An aggregator either returns a score
//! (the session moves to `SCORED`) or defers to an external scorer that
//! reports back later through the HR API.

use async_trait::async_trait;
use kovanent_core::error::CoreError;
use kovanent_core::trust_score::TrustScore;

use crate::session::SessionView;

#[async_trait]
pub trait TrustScoreAggregator: Send + Sync {
    async fn aggregate(&self, session: &SessionView) -> Result<Option<TrustScore>, CoreError>;
}

/// Leaves scoring to an external system.
pub struct DeferredAggregator;

#[async_trait]
impl TrustScoreAggregator for DeferredAggregator {
    async fn aggregate(&self, _session: &SessionView) -> Result<Option<TrustScore>, CoreError> {
        Ok(None)
    }
}
