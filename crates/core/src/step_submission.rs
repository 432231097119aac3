//! Typed bodies for steps validated synchronously on submission, and the
//! rules that accept or reject them.
//!
//! A rejected submission is not a request error: the step moves to
//! `FAILED` with the reason so the candidate can correct and resubmit.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use validator::ValidateEmail;

use crate::document::{DocumentFacts, DocumentType};
use crate::masking::{mask_pan, mask_twelve_digit};
use crate::types::DbId;
use crate::verification::{
    LocalOutcome, LocalStepMetadata, PanRecord, PersonalInfoRecord, SelfieRecord, StepMetadata,
    UanRecord,
};

/// Maximum length of a candidate's full name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Phone numbers are 10 to 15 digits, optionally prefixed with `+`.
pub const MIN_PHONE_DIGITS: usize = 10;
pub const MAX_PHONE_DIGITS: usize = 15;

/// Address bounds.
pub const MIN_ADDRESS_LENGTH: usize = 10;
pub const MAX_ADDRESS_LENGTH: usize = 500;

static PAN_FORMAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("valid regex"));

static UAN_FORMAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// `PERSONAL_INFO` submission.
///
/// `dob` is taken as text so a malformed date fails the step rather than
/// the request.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonalInfoSubmission {
    pub full_name: String,
    pub dob: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// `FACE_LIVENESS` submission: a selfie already uploaded for this candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct FaceLivenessSubmission {
    pub selfie_document_id: DbId,
}

/// `PAN` submission. The number is stored masked, for later verification.
#[derive(Debug, Clone, Deserialize)]
pub struct PanSubmission {
    pub pan_number: String,
}

/// `UAN` submission. Freshers have no UAN.
#[derive(Debug, Clone, Deserialize)]
pub struct UanSubmission {
    pub uan_number: Option<String>,
    #[serde(default)]
    pub is_fresher: bool,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Accept or reject personal details. `today` bounds the date of birth.
pub fn evaluate_personal_info(body: &PersonalInfoSubmission, today: NaiveDate) -> LocalOutcome {
    match check_personal_info(body, today) {
        Ok(record) => LocalOutcome::Accepted(StepMetadata::PersonalInfo(LocalStepMetadata {
            record: Some(record),
            ..LocalStepMetadata::default()
        })),
        Err(reason) => LocalOutcome::Rejected(reason),
    }
}

fn check_personal_info(
    body: &PersonalInfoSubmission,
    today: NaiveDate,
) -> Result<PersonalInfoRecord, String> {
    let full_name = body.full_name.trim();
    if full_name.is_empty() {
        return Err("Full name is required".to_string());
    }
    if full_name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Full name must be at most {MAX_NAME_LENGTH} characters"
        ));
    }

    let dob = NaiveDate::parse_from_str(body.dob.trim(), "%Y-%m-%d")
        .map_err(|_| "Date of birth must be in YYYY-MM-DD format".to_string())?;
    if dob >= today {
        return Err("Date of birth must be in the past".to_string());
    }

    let email = body.email.trim();
    if !email.validate_email() {
        return Err("A valid email address is required".to_string());
    }

    let phone = match body.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => Some(check_phone(p)?),
        None => None,
    };

    let address = match body.address.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        Some(a) => {
            let len = a.chars().count();
            if !(MIN_ADDRESS_LENGTH..=MAX_ADDRESS_LENGTH).contains(&len) {
                return Err(format!(
                    "Address must be between {MIN_ADDRESS_LENGTH} and {MAX_ADDRESS_LENGTH} characters"
                ));
            }
            Some(a.to_string())
        }
        None => None,
    };

    Ok(PersonalInfoRecord {
        full_name: full_name.to_string(),
        dob,
        email: email.to_string(),
        phone,
        address,
    })
}

fn check_phone(phone: &str) -> Result<String, String> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let valid = digits.chars().all(|c| c.is_ascii_digit())
        && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len());
    if valid {
        Ok(phone.to_string())
    } else {
        Err(format!(
            "Phone number must be {MIN_PHONE_DIGITS} to {MAX_PHONE_DIGITS} digits"
        ))
    }
}

/// Accept a selfie if the referenced document exists for this candidate
/// and is an image tagged `selfie`.
pub fn evaluate_face_liveness(
    body: &FaceLivenessSubmission,
    document: Option<&DocumentFacts>,
) -> LocalOutcome {
    let Some(doc) = document else {
        return LocalOutcome::Rejected(format!(
            "Selfie document {} was not found",
            body.selfie_document_id
        ));
    };
    if doc.doc_type != DocumentType::Selfie {
        return LocalOutcome::Rejected(format!(
            "Document {} is a {} document, not a selfie",
            body.selfie_document_id,
            doc.doc_type.as_str()
        ));
    }
    if !doc.mime_type.starts_with("image/") {
        return LocalOutcome::Rejected("Selfie must be an image".to_string());
    }
    LocalOutcome::Accepted(StepMetadata::FaceLiveness(LocalStepMetadata {
        record: Some(SelfieRecord {
            document_id: body.selfie_document_id,
        }),
        ..LocalStepMetadata::default()
    }))
}

/// Accept a well-formed PAN, storing only its masked form.
pub fn evaluate_pan(body: &PanSubmission) -> LocalOutcome {
    let pan = body.pan_number.trim().to_ascii_uppercase();
    if !PAN_FORMAT_RE.is_match(&pan) {
        return LocalOutcome::Rejected(
            "PAN must be 10 characters: five letters, four digits, one letter".to_string(),
        );
    }
    LocalOutcome::Accepted(StepMetadata::Pan(LocalStepMetadata {
        record: Some(PanRecord {
            pan_masked: mask_pan(&pan),
        }),
        ..LocalStepMetadata::default()
    }))
}

/// Accept a UAN, or the fresher declaration in place of one.
pub fn evaluate_uan(body: &UanSubmission) -> LocalOutcome {
    if body.is_fresher {
        return LocalOutcome::Accepted(StepMetadata::Uan(LocalStepMetadata {
            record: Some(UanRecord {
                is_fresher: true,
                uan_masked: None,
            }),
            ..LocalStepMetadata::default()
        }));
    }
    let uan: String = body
        .uan_number
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if uan.is_empty() {
        return LocalOutcome::Rejected(
            "UAN number is required for experienced candidates".to_string(),
        );
    }
    if !UAN_FORMAT_RE.is_match(&uan) {
        return LocalOutcome::Rejected("UAN must be exactly 12 digits".to_string());
    }
    LocalOutcome::Accepted(StepMetadata::Uan(LocalStepMetadata {
        record: Some(UanRecord {
            is_fresher: false,
            uan_masked: Some(mask_twelve_digit(&uan)),
        }),
        ..LocalStepMetadata::default()
    }))
}
