//! Cross-check of a provider-verified identity against the personal details
//! the candidate entered.
//!
//! The name is matched fuzzily (honorifics, case and punctuation ignored);
//! the date of birth must match exactly. The address is not part of the
//! provider proof, so it contributes a fixed share instead of a comparison.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::verification::{ExternalProof, PersonalInfoRecord};

/// Name similarity at or above this counts as a match.
pub const NAME_MATCH_THRESHOLD: u8 = 85;
/// Name similarity at or above this earns partial credit.
pub const PARTIAL_NAME_THRESHOLD: u8 = 70;

const NAME_WEIGHT: u8 = 40;
const PARTIAL_NAME_WEIGHT: u8 = 25;
const DOB_WEIGHT: u8 = 30;
const ADDRESS_NOT_COMPARED_WEIGHT: u8 = 10;
const BASE_WEIGHT: u8 = 10;

const VERIFIED_SCORE: u8 = 90;
const PARTIAL_SCORE: u8 = 70;

const HONORIFICS: &[&str] = &["MR", "MRS", "MS", "DR", "SHRI", "SMT", "KUMAR", "KUMARI"];

/// Date formats a provider may use for the date of birth.
const DOB_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Verified,
    Partial,
    Failed,
}

impl MatchStatus {
    pub fn from_score(score: u8) -> Self {
        if score >= VERIFIED_SCORE {
            Self::Verified
        } else if score >= PARTIAL_SCORE {
            Self::Partial
        } else {
            Self::Failed
        }
    }

    /// `VERIFIED` and `PARTIAL` both complete the step.
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Outcome of comparing a provider proof with the entered details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMatch {
    pub status: MatchStatus,
    /// 0-100.
    pub score: u8,
    pub name_score: u8,
    pub name_match: bool,
    pub dob_match: bool,
}

impl IdentityMatch {
    /// Reason shown to the candidate when the match failed.
    pub fn failure_reason(&self) -> String {
        let mut mismatched = Vec::new();
        if !self.name_match {
            mismatched.push("name");
        }
        if !self.dob_match {
            mismatched.push("date of birth");
        }
        format!(
            "The {} on your Aadhaar does not match the details you entered.",
            mismatched.join(" and ")
        )
    }
}

/// Compare the identity in `proof` with what the candidate entered.
pub fn compare_identity(claimed: &PersonalInfoRecord, proof: &ExternalProof) -> IdentityMatch {
    let name_score = proof
        .verified_name
        .as_deref()
        .map_or(0, |name| name_similarity(name, &claimed.full_name));
    let name_match = name_score >= NAME_MATCH_THRESHOLD;
    let dob_match = proof
        .dob
        .as_deref()
        .and_then(parse_dob)
        .is_some_and(|dob| dob == claimed.dob);

    let mut score = ADDRESS_NOT_COMPARED_WEIGHT + BASE_WEIGHT;
    if name_match {
        score += NAME_WEIGHT;
    } else if name_score >= PARTIAL_NAME_THRESHOLD {
        score += PARTIAL_NAME_WEIGHT;
    }
    if dob_match {
        score += DOB_WEIGHT;
    }

    IdentityMatch {
        status: MatchStatus::from_score(score),
        score,
        name_score,
        name_match,
        dob_match,
    }
}

/// Uppercase ASCII letters only, honorifics dropped, single-spaced.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(char::is_ascii_alphabetic)
                .map(|c| c.to_ascii_uppercase())
                .collect::<String>()
        })
        .filter(|word| !word.is_empty() && !HONORIFICS.contains(&word.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two names, 0-100.
///
/// The higher of a character-sequence ratio and token overlap, so reordered
/// names still match.
pub fn name_similarity(a: &str, b: &str) -> u8 {
    let (a, b) = (normalize_name(a), normalize_name(b));
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }

    let matched = matching_len(a.as_bytes(), b.as_bytes());
    let sequence = percent(2.0 * matched as f64 / (a.len() + b.len()) as f64);

    let ta: HashSet<&str> = a.split(' ').collect();
    let tb: HashSet<&str> = b.split(' ').collect();
    let shared = ta.intersection(&tb).count();
    let all = ta.union(&tb).count();
    let tokens = percent(shared as f64 / all as f64);

    sequence.max(tokens)
}

fn parse_dob(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DOB_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn percent(ratio: f64) -> u8 {
    (ratio * 100.0).clamp(0.0, 100.0) as u8
}

/// Total length of matching blocks: the longest common block, then the
/// same recursively on each side of it.
fn matching_len(a: &[u8], b: &[u8]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_len(&a[..i], &b[..j]) + matching_len(&a[i + len..], &b[j + len..])
}

fn longest_common_block(a: &[u8], b: &[u8]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                row[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = row;
    }
    best
}
