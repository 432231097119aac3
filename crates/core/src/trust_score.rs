//! Trust Score contract types.
//!
//! The score itself is computed outside this system. These types only fix
//! the shape and bounds of what an aggregator hands back.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const MIN_TRUST_SCORE: i32 = 0;
pub const MAX_TRUST_SCORE: i32 = 100;

/// Aggregate confidence score with a per-component breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub score: i32,
    /// Component name (usually a step type) to component score.
    #[serde(default)]
    pub breakdown: serde_json::Map<String, serde_json::Value>,
}

impl TrustScore {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_score_value(self.score, "score")?;
        for (component, value) in &self.breakdown {
            let n = value.as_i64().ok_or_else(|| {
                CoreError::Validation(format!(
                    "Breakdown entry '{component}' must be an integer"
                ))
            })?;
            let n = i32::try_from(n).map_err(|_| {
                CoreError::Validation(format!("Breakdown entry '{component}' is out of range"))
            })?;
            validate_score_value(n, component)?;
        }
        Ok(())
    }
}

fn validate_score_value(value: i32, name: &str) -> Result<(), CoreError> {
    if (MIN_TRUST_SCORE..=MAX_TRUST_SCORE).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{name} must be between {MIN_TRUST_SCORE} and {MAX_TRUST_SCORE}, got {value}"
        )))
    }
}
