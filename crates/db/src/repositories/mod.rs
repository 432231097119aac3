//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod candidate_repo;
pub mod document_repo;
pub mod user_repo;
pub mod verification_repo;

pub use candidate_repo::CandidateRepo;
pub use document_repo::DocumentRepo;
pub use user_repo::UserRepo;
pub use verification_repo::VerificationRepo;
