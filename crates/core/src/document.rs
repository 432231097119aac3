//! Uploaded document types and upload validation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default upload size limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// MIME types accepted for upload, with the extension used on disk.
pub const ALLOWED_MIME_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

/// Document-type tag attached to every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Aadhaar,
    Pan,
    Uan,
    Selfie,
    Education,
    Experience,
    Other,
}

impl DocumentType {
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "aadhaar" => Ok(Self::Aadhaar),
            "pan" => Ok(Self::Pan),
            "uan" => Ok(Self::Uan),
            "selfie" => Ok(Self::Selfie),
            "education" => Ok(Self::Education),
            "experience" => Ok(Self::Experience),
            "other" => Ok(Self::Other),
            _ => Err(CoreError::Validation(format!(
                "Invalid document type '{s}'. Must be one of: aadhaar, pan, uan, selfie, education, experience, other"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aadhaar => "aadhaar",
            Self::Pan => "pan",
            Self::Uan => "uan",
            Self::Selfie => "selfie",
            Self::Education => "education",
            Self::Experience => "experience",
            Self::Other => "other",
        }
    }
}

/// The parts of a stored document a verification step cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFacts {
    pub doc_type: DocumentType,
    pub mime_type: String,
}

/// Validate an upload's MIME type and return the file extension to store it under.
pub fn extension_for_mime(mime_type: &str) -> Result<&'static str, CoreError> {
    let normalized = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_MIME_TYPES
        .iter()
        .find(|(mime, _)| *mime == normalized)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            CoreError::Validation(format!(
                "Unsupported file type '{mime_type}'. Allowed: JPEG, PNG, WebP, PDF"
            ))
        })
}

/// Validate an upload's size against `max_bytes`.
pub fn validate_upload_size(size: usize, max_bytes: usize) -> Result<(), CoreError> {
    if size == 0 {
        return Err(CoreError::Validation("Uploaded file is empty".to_string()));
    }
    if size > max_bytes {
        return Err(CoreError::Validation(format!(
            "File is {size} bytes; the limit is {max_bytes} bytes"
        )));
    }
    Ok(())
}

/// Keep only the final path component of a client-supplied file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        "upload".to_string()
    } else {
        base.chars().take(255).collect()
    }
}
