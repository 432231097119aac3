//! Candidate lifecycle status and field validation.

use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::CoreError;

/// Lifecycle status of a candidate. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    InProgress,
    Completed,
}

impl CandidateStatus {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(CoreError::Validation(format!(
                "Invalid candidate status '{s}'. Must be one of: pending, in_progress, completed"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

/// Validate an explicit status change. Staying put is allowed; moving
/// backwards is not.
pub fn validate_status_transition(
    from: CandidateStatus,
    to: CandidateStatus,
) -> Result<(), CoreError> {
    if to < from {
        return Err(CoreError::Validation(format!(
            "Candidate status cannot move back from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }
    Ok(())
}

/// Maximum length of a candidate name.
pub const MAX_CANDIDATE_NAME_LENGTH: usize = 200;

pub fn validate_candidate_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Candidate name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_CANDIDATE_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Candidate name must be at most {MAX_CANDIDATE_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_candidate_email(email: &str) -> Result<(), CoreError> {
    if email.trim().validate_email() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid email address '{email}'"
        )))
    }
}

/// Normalize a national identity number for storage and uniqueness checks:
/// spaces and dashes removed, letters upper-cased.
///
/// Accepts 8 to 20 alphanumeric characters, which covers Aadhaar (12
/// digits) and PAN (10 characters).
pub fn normalize_national_id(raw: &str) -> Result<String, CoreError> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let valid = (8..=20).contains(&normalized.len())
        && normalized.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(normalized)
    } else {
        Err(CoreError::Validation(
            "National ID must be 8 to 20 letters or digits".to_string(),
        ))
    }
}
