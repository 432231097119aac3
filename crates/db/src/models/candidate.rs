//! Candidate entity model and DTOs.

use chrono::NaiveDate;
use kovanent_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `candidates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Candidate {
    pub id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub dob: Option<NaiveDate>,
    pub status: String,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCandidate {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub national_id: Option<String>,
    pub dob: Option<NaiveDate>,
}

/// DTO for updating a candidate. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCandidate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
}

/// Filters for listing candidates.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
