//! Typed client for the public `/verify` API.
//!
//! Besides one method per endpoint, [`resume`] holds the rule for picking up
//! a redirect step after the browser returns from the identity provider,
//! whether or not the return URL still carries the correlation id.

pub mod client;
pub mod error;
pub mod resume;

pub use client::{Document, InitiatedStep, Session, VerifyClient};
pub use error::ClientError;
pub use resume::{resume_action, take_client_id, ResumeAction, ResumeOutcome};
