//! Resuming a redirect step when the browser comes back.
//!
//! The provider appends `client_id` to the return URL, but a reload drops
//! it. The step's stored metadata covers that case: a step still
//! `awaiting_redirect` with a stored id is completed with that id instead of
//! showing the start button again. A step that failed the identity check
//! starts over.

use kovanent_core::verification::{ExternalFlowStatus, StepStatus, VerificationStep};

/// Query parameter the provider appends on the return redirect.
pub const CLIENT_ID_PARAM: &str = "client_id";

/// What to do with a redirect step on page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeAction {
    AlreadyCompleted,
    /// Finish the exchange with this correlation id.
    Complete { client_id: String },
    /// Nothing in flight: show the start button.
    Start,
}

/// Result of [`crate::VerifyClient::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    Completed(VerificationStep),
    NeedsStart(VerificationStep),
}

/// Decide how to resume `step`. An id from the return URL wins over the
/// stored one.
pub fn resume_action(step: &VerificationStep, return_client_id: Option<&str>) -> ResumeAction {
    if step.status == StepStatus::Completed {
        return ResumeAction::AlreadyCompleted;
    }
    if let Some(id) = return_client_id.map(str::trim).filter(|id| !id.is_empty()) {
        return ResumeAction::Complete {
            client_id: id.to_string(),
        };
    }
    match step.metadata.external() {
        Some(meta) if meta.status == ExternalFlowStatus::AwaitingRedirect => {
            match meta.client_id.as_deref().filter(|id| !id.is_empty()) {
                Some(id) => ResumeAction::Complete {
                    client_id: id.to_string(),
                },
                None => ResumeAction::Start,
            }
        }
        _ => ResumeAction::Start,
    }
}

/// Remove the `client_id` parameter from `url` and return its value.
///
/// Other parameters are kept in order. Consuming the id this way means it
/// is acted on at most once per page load.
pub fn take_client_id(url: &mut reqwest::Url) -> Option<String> {
    let mut found = None;
    let rest: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            if k == CLIENT_ID_PARAM {
                if found.is_none() && !v.is_empty() {
                    found = Some(v.into_owned());
                }
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();

    if rest.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(rest);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kovanent_core::identity::{IdentityMatch, MatchStatus};
    use kovanent_core::verification::{begin_external, complete_external, ExternalProof, StepType};

    fn aadhaar() -> VerificationStep {
        VerificationStep::new(StepType::Aadhaar, 2, Utc::now())
    }

    #[test]
    fn query_id_wins() {
        let step = begin_external(&aadhaar(), "stored", Utc::now()).unwrap();
        assert_eq!(
            resume_action(&step, Some("abc123")),
            ResumeAction::Complete {
                client_id: "abc123".into()
            }
        );
    }

    #[test]
    fn reload_while_awaiting_redirect_uses_stored_id() {
        let step = begin_external(&aadhaar(), "abc123", Utc::now()).unwrap();
        assert_eq!(
            resume_action(&step, None),
            ResumeAction::Complete {
                client_id: "abc123".into()
            }
        );
        assert_eq!(
            resume_action(&step, Some("  ")),
            ResumeAction::Complete {
                client_id: "abc123".into()
            }
        );
    }

    #[test]
    fn fresh_step_starts() {
        assert_eq!(resume_action(&aadhaar(), None), ResumeAction::Start);
    }

    #[test]
    fn local_step_without_id_starts() {
        let step = VerificationStep::new(StepType::Pan, 3, Utc::now());
        assert_eq!(resume_action(&step, None), ResumeAction::Start);
    }

    #[test]
    fn reload_after_identity_mismatch_starts_over() {
        let started = begin_external(&aadhaar(), "abc123", Utc::now()).unwrap();
        let mismatch = IdentityMatch {
            status: MatchStatus::Failed,
            score: 20,
            name_score: 30,
            name_match: false,
            dob_match: false,
        };
        let proof = ExternalProof {
            client_id: "abc123".into(),
            proof_reference: "mock:AADHAAR:abc123".into(),
            masked_id: None,
            verified_name: Some("Test Candidate".into()),
            dob: Some("1990-01-01".into()),
        };
        let failed = complete_external(&started, proof, Some(mismatch), Utc::now()).unwrap();
        assert_eq!(failed.status, StepStatus::Failed);
        assert_eq!(resume_action(&failed, None), ResumeAction::Start);
    }

    #[test]
    fn completed_step_is_left_alone() {
        let mut step = aadhaar();
        step.status = StepStatus::Completed;
        assert_eq!(resume_action(&step, Some("abc123")), ResumeAction::AlreadyCompleted);
    }

    #[test]
    fn client_id_is_consumed_once() {
        let mut url =
            reqwest::Url::parse("https://app.kovanent.in/verify/tok?client_id=abc123&lang=en")
                .unwrap();

        assert_eq!(take_client_id(&mut url).as_deref(), Some("abc123"));
        assert_eq!(url.as_str(), "https://app.kovanent.in/verify/tok?lang=en");
        assert_eq!(take_client_id(&mut url), None);
    }

    #[test]
    fn only_param_leaves_no_query() {
        let mut url = reqwest::Url::parse("https://app.kovanent.in/verify/tok?client_id=x").unwrap();
        assert_eq!(take_client_id(&mut url).as_deref(), Some("x"));
        assert_eq!(url.query(), None);
    }
}
