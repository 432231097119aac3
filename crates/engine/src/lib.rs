//! Verification Session Engine.
//!
//! Drives a candidate through an ordered, resumable checklist of identity
//! verification steps. Mutations are serialized per session token in
//! process and guarded by an optimistic version check in storage, so a
//! duplicate provider callback can never apply twice.

pub mod aggregator;
pub mod engine;
pub mod error;
pub mod locks;
pub mod session;
pub mod store;

pub use aggregator::{DeferredAggregator, TrustScoreAggregator};
pub use engine::{EngineConfig, InitiatedStep, LocalSubmission, VerificationEngine};
pub use error::EngineError;
pub use session::{CandidateSummary, NewSession, SessionRecord, SessionView};
pub use store::memory::MemorySessionStore;
pub use store::postgres::PgSessionStore;
pub use store::SessionStore;
