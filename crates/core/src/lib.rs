//! Domain types and rules for the Kovanent identity-verification backend.
//!
//! Everything in this crate is pure: no database, network, or filesystem
//! access. The `db`, `engine`, and `api` crates build on these definitions.

pub mod candidate;
pub mod document;
pub mod error;
pub mod hashing;
pub mod identity;
pub mod masking;
pub mod pagination;
pub mod roles;
pub mod step_submission;
pub mod tokens;
pub mod trust_score;
pub mod types;
pub mod verification;
