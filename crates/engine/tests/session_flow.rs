//! Behaviour of the verification engine against the in-memory store and
//! the call-counting mock provider.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::*;
use kovanent_core::candidate::CandidateStatus;
use kovanent_core::error::CoreError;
use kovanent_core::identity::MatchStatus;
use kovanent_core::step_submission::PersonalInfoSubmission;
use kovanent_core::trust_score::TrustScore;
use kovanent_core::verification::{
    ExternalFlowStatus, SessionStatus, StepMetadata, StepStatus, StepType,
};
use kovanent_engine::{EngineConfig, EngineError, LocalSubmission, SessionStore};
use kovanent_provider::{MockFetchOutcome, MockProvider, ProviderError, MOCK_DOB, MOCK_FULL_NAME};

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_session_uses_default_step_order() {
    let h = harness();
    let candidate = h.store.insert_candidate("Ravi Kumar", None);

    let record = h.engine.create_session(candidate.id, true, Some(7)).await.unwrap();

    let order: Vec<StepType> = record.steps.iter().map(|s| s.step_type).collect();
    assert_eq!(
        order,
        vec![
            StepType::PersonalInfo,
            StepType::FaceLiveness,
            StepType::Aadhaar,
            StepType::Pan,
            StepType::Uan,
        ]
    );
    assert_eq!(record.token.len(), 64);
    assert_eq!(record.status, SessionStatus::InProgress);
    assert!(record.steps.iter().all(|s| s.status == StepStatus::Pending));
}

#[tokio::test]
async fn second_session_for_candidate_conflicts() {
    let h = harness();
    let candidate = h.store.insert_candidate("Ravi Kumar", None);
    h.engine.create_session(candidate.id, false, None).await.unwrap();

    let err = h.engine.create_session(candidate.id, false, None).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Conflict(_)));
}

#[tokio::test]
async fn session_for_unknown_candidate_is_not_found() {
    let h = harness();
    let err = h.engine.create_session(999, false, None).await.unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::NotFound { entity: "Candidate", .. }));
}

#[tokio::test]
async fn unknown_and_malformed_tokens_are_not_found() {
    let h = harness();
    let unknown = "a".repeat(64);
    assert_matches!(
        h.engine.get_session(&unknown).await,
        Err(EngineError::Core(CoreError::NotFound { .. }))
    );
    assert_matches!(
        h.engine.get_session("../etc/passwd").await,
        Err(EngineError::Core(CoreError::NotFound { .. }))
    );
}

#[tokio::test]
async fn first_read_moves_candidate_to_in_progress() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo]).await;
    assert_eq!(record.candidate.status, CandidateStatus::Pending);

    let loaded = h.engine.get_session(&record.token).await.unwrap();
    assert_eq!(loaded.candidate.status, CandidateStatus::InProgress);
    assert_eq!(
        h.store.candidate(record.candidate.id).unwrap().status,
        CandidateStatus::InProgress
    );
}

#[tokio::test]
async fn expired_session_rejects_reads_and_mutations() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo]).await;
    h.store
        .set_expires_at(&record.token, chrono::Utc::now() - chrono::Duration::minutes(1));

    assert_matches!(
        h.engine.get_session(&record.token).await,
        Err(EngineError::Core(CoreError::Expired(_)))
    );
    assert_matches!(
        h.engine.submit_step(&record.token, valid_personal_info()).await,
        Err(EngineError::Core(CoreError::Expired(_)))
    );
}

// ---------------------------------------------------------------------------
// Current step selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_completing_personal_info_advances_to_aadhaar() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Aadhaar]).await;
    assert_eq!(
        record.current_step().map(|s| s.step_type),
        Some(StepType::PersonalInfo)
    );

    let step = h
        .engine
        .submit_step(&record.token, valid_personal_info())
        .await
        .unwrap();
    assert_eq!(step.status, StepStatus::Completed);

    let session = h.engine.get_session(&record.token).await.unwrap();
    assert_eq!(
        session.current_step().map(|s| s.step_type),
        Some(StepType::Aadhaar)
    );
}

#[tokio::test]
async fn current_step_is_first_non_completed_for_every_status_combination() {
    let h = harness();
    let types = [StepType::PersonalInfo, StepType::Aadhaar, StepType::Pan];
    let record = open_session(&h, &types).await;
    let statuses = [
        StepStatus::Pending,
        StepStatus::InProgress,
        StepStatus::Completed,
        StepStatus::Failed,
    ];

    for a in statuses {
        for b in statuses {
            for c in statuses {
                let combo = [a, b, c];
                for (ty, status) in types.iter().zip(combo) {
                    let mut step = record.step(*ty).unwrap().clone();
                    step.status = status;
                    h.store.put_step(&record.token, step);
                }
                let session = h.engine.get_session(&record.token).await.unwrap();
                let expected = types
                    .iter()
                    .zip(combo)
                    .find(|(_, s)| *s != StepStatus::Completed)
                    .map(|(ty, _)| *ty);
                assert_eq!(
                    session.current_step().map(|s| s.step_type),
                    expected,
                    "statuses {combo:?}"
                );
            }
        }
    }
}

#[tokio::test]
async fn later_step_cannot_run_while_earlier_is_open() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Aadhaar, StepType::Pan]).await;

    assert_matches!(
        h.engine.submit_step(&record.token, valid_pan()).await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );
    assert_matches!(
        h.engine
            .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
            .await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );
    assert_eq!(h.provider.initiate_calls(), 0);
}

#[tokio::test]
async fn step_outside_session_plan_is_not_found() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo]).await;
    assert_matches!(
        h.engine.submit_step(&record.token, valid_pan()).await,
        Err(EngineError::Core(CoreError::NotFound { entity: "VerificationStep", .. }))
    );
}

// ---------------------------------------------------------------------------
// Local validation steps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_personal_info_fails_step_then_resubmission_completes() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Pan]).await;

    let bad = LocalSubmission::PersonalInfo(PersonalInfoSubmission {
        full_name: "Asha Verma".to_string(),
        dob: "1994-03-12".to_string(),
        email: "not-an-email".to_string(),
        phone: None,
        address: None,
    });
    let failed = h.engine.submit_step(&record.token, bad).await.unwrap();
    assert_eq!(failed.status, StepStatus::Failed);
    assert!(failed.metadata.last_error().is_some());

    // A FAILED step still blocks later steps.
    assert_matches!(
        h.engine.submit_step(&record.token, valid_pan()).await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );

    let done = h
        .engine
        .submit_step(&record.token, valid_personal_info())
        .await
        .unwrap();
    assert_eq!(done.status, StepStatus::Completed);
    assert_matches!(&done.metadata, StepMetadata::PersonalInfo(m) => {
        assert_eq!(m.attempts, 2);
        assert!(m.last_error.is_none());
        assert_eq!(m.record.as_ref().unwrap().email, "asha@example.com");
    });
}

#[tokio::test]
async fn resubmitting_completed_step_returns_it_unchanged() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Pan]).await;
    let first = h
        .engine
        .submit_step(&record.token, valid_personal_info())
        .await
        .unwrap();

    let again = h
        .engine
        .submit_step(&record.token, valid_personal_info())
        .await
        .unwrap();
    assert_eq!(again, first);
}

#[tokio::test]
async fn face_liveness_rejects_document_that_is_not_a_selfie() {
    use kovanent_core::document::{DocumentFacts, DocumentType};
    use kovanent_core::step_submission::FaceLivenessSubmission;

    let h = harness();
    let record = open_session(&h, &[StepType::FaceLiveness]).await;
    let pan_scan = h.store.insert_document(
        record.candidate.id,
        DocumentFacts {
            doc_type: DocumentType::Pan,
            mime_type: "image/png".to_string(),
        },
    );

    let step = h
        .engine
        .submit_step(
            &record.token,
            LocalSubmission::FaceLiveness(FaceLivenessSubmission {
                selfie_document_id: pan_scan,
            }),
        )
        .await
        .unwrap();
    assert_eq!(step.status, StepStatus::Failed);

    let body = selfie_for(&h, &record);
    let step = h.engine.submit_step(&record.token, body).await.unwrap();
    assert_eq!(step.status, StepStatus::Completed);
}

#[tokio::test]
async fn pan_is_stored_masked() {
    let h = harness();
    let record = open_session(&h, &[StepType::Pan]).await;
    let step = h.engine.submit_step(&record.token, valid_pan()).await.unwrap();

    assert_matches!(&step.metadata, StepMetadata::Pan(m) => {
        let masked = &m.record.as_ref().unwrap().pan_masked;
        assert_ne!(masked, "ABCDE1234F");
        assert!(!serde_json::to_string(&step).unwrap().contains("ABCDE1234F"));
    });
}

// ---------------------------------------------------------------------------
// External redirect steps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_b_return_with_client_id_completes_step() {
    let h = harness_with(
        MockProvider::new().with_client_id("abc123"),
        Arc::new(kovanent_engine::DeferredAggregator),
        EngineConfig::default(),
    );
    let record = open_session(&h, &[StepType::Aadhaar]).await;

    let started = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();
    assert!(started.url.starts_with("https://"));
    assert_eq!(started.client_id, "abc123");
    assert_eq!(started.step.status, StepStatus::InProgress);

    let step = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, Some("abc123"))
        .await
        .unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    let meta = step.metadata.external().unwrap();
    assert_eq!(meta.status, ExternalFlowStatus::Completed);
    assert_eq!(meta.proof_reference.as_deref(), Some("mock:AADHAAR:abc123"));
    assert!(meta.verified_at.is_some());
}

#[tokio::test]
async fn scenario_c_reload_recovers_stored_client_id() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar]).await;
    let started = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();

    // Reload without the query string: durable metadata still says where we are.
    let reloaded = h.engine.get_session(&record.token).await.unwrap();
    let step = reloaded.step(StepType::Aadhaar).unwrap();
    assert_eq!(step.status, StepStatus::InProgress);
    let meta = step.metadata.external().unwrap();
    assert_eq!(meta.status, ExternalFlowStatus::AwaitingRedirect);
    assert_eq!(meta.client_id.as_deref(), Some(started.client_id.as_str()));

    let step = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, None)
        .await
        .unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(
        step.metadata.external().unwrap().client_id.as_deref(),
        Some(started.client_id.as_str())
    );
}

#[tokio::test]
async fn verified_identity_must_match_entered_details() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Aadhaar, StepType::Pan]).await;
    let step = h
        .engine
        .submit_step(&record.token, personal_info("Asha Verma", "1994-03-12"))
        .await
        .unwrap();
    assert_eq!(step.status, StepStatus::Completed);

    h.engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();
    let step = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, None)
        .await
        .unwrap();

    assert_eq!(step.status, StepStatus::Failed);
    let meta = step.metadata.external().unwrap();
    assert_eq!(meta.status, ExternalFlowStatus::IdentityMismatch);
    assert_eq!(meta.verified_name.as_deref(), Some(MOCK_FULL_NAME));
    assert_eq!(meta.verified_dob.as_deref(), Some(MOCK_DOB));
    let identity = meta.identity_match.as_ref().unwrap();
    assert_eq!(identity.status, MatchStatus::Failed);
    assert!(!identity.name_match && !identity.dob_match);
    assert!(meta.last_error.as_deref().unwrap().contains("does not match"));

    // Later steps stay locked until the candidate retries the redirect.
    assert_matches!(
        h.engine.submit_step(&record.token, valid_pan()).await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );
    let retried = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();
    assert_eq!(retried.step.status, StepStatus::InProgress);
    assert_eq!(h.provider.initiate_calls(), 2);
}

#[tokio::test]
async fn matching_identity_records_verified_match() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Aadhaar]).await;
    h.engine
        .submit_step(&record.token, valid_personal_info())
        .await
        .unwrap();
    h.engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();

    let step = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, None)
        .await
        .unwrap();

    assert_eq!(step.status, StepStatus::Completed);
    let identity = step.metadata.external().unwrap().identity_match.clone().unwrap();
    assert_eq!(identity.status, MatchStatus::Verified);
    assert!(identity.name_match && identity.dob_match);
}

#[tokio::test]
async fn completing_twice_calls_provider_once() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar]).await;
    let started = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();

    let first = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, Some(&started.client_id))
        .await
        .unwrap();
    let second = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, Some(&started.client_id))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(h.provider.fetch_calls(), 1);
}

#[tokio::test]
async fn completion_without_any_correlation_id_asks_for_restart() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar]).await;

    let err = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, None)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Core(CoreError::Validation(_)));
    assert_eq!(h.provider.fetch_calls(), 0);

    let session = h.engine.get_session(&record.token).await.unwrap();
    assert_eq!(
        session.step(StepType::Aadhaar).unwrap().status,
        StepStatus::Pending
    );
}

#[tokio::test]
async fn provider_rejection_returns_step_to_pending_for_retry() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar]).await;
    let started = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();

    h.provider
        .set_fetch_outcome(MockFetchOutcome::Rejected("Name does not match".to_string()));
    let err = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, Some(&started.client_id))
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Provider(ProviderError::Rejected(_)));

    let session = h.engine.get_session(&record.token).await.unwrap();
    let step = session.step(StepType::Aadhaar).unwrap();
    assert_eq!(step.status, StepStatus::Pending);
    let meta = step.metadata.external().unwrap();
    assert!(meta.client_id.is_none());
    assert!(meta.last_error.is_some());

    // Retry from scratch.
    h.provider.set_fetch_outcome(MockFetchOutcome::Verified);
    let restarted = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();
    assert_ne!(restarted.client_id, started.client_id);
    let step = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, Some(&restarted.client_id))
        .await
        .unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert!(step.metadata.last_error().is_none());
}

#[tokio::test]
async fn missing_provider_session_resets_step() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar]).await;
    h.engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();

    h.provider.set_fetch_outcome(MockFetchOutcome::SessionNotFound);
    let err = h
        .engine
        .complete_external_step(&record.token, StepType::Aadhaar, None)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Provider(ProviderError::SessionNotFound(_)));

    let session = h.engine.get_session(&record.token).await.unwrap();
    assert_eq!(
        session.step(StepType::Aadhaar).unwrap().status,
        StepStatus::Pending
    );
}

#[tokio::test]
async fn bad_redirect_url_leaves_step_pending_with_reason() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar]).await;

    let err = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, "ftp://example.com/back")
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::Provider(ProviderError::InvalidInput { .. }));

    let session = h.engine.get_session(&record.token).await.unwrap();
    let step = session.step(StepType::Aadhaar).unwrap();
    assert_eq!(step.status, StepStatus::Pending);
    assert!(step.metadata.last_error().is_some());
}

#[tokio::test]
async fn local_step_cannot_be_initiated() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo]).await;
    assert_matches!(
        h.engine
            .initiate_external_step(&record.token, StepType::PersonalInfo, RETURN_URL)
            .await,
        Err(EngineError::Core(CoreError::Validation(_)))
    );
}

#[tokio::test]
async fn initiating_completed_step_is_rejected() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar, StepType::Pan]).await;
    complete_all_steps(&h, &first_steps(&record, 1)).await;

    assert_matches!(
        h.engine
            .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
            .await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );
    assert_eq!(h.provider.initiate_calls(), 1);
}

/// The same record restricted to its first `n` steps.
fn first_steps(
    record: &kovanent_engine::SessionRecord,
    n: usize,
) -> kovanent_engine::SessionRecord {
    let mut prefix = record.clone();
    prefix.steps.truncate(n);
    prefix
}

#[tokio::test]
async fn stale_redirect_step_is_released_on_read() {
    let config = EngineConfig {
        external_step_stale_after: chrono::Duration::milliseconds(20),
        ..EngineConfig::default()
    };
    let h = harness_with(
        MockProvider::new(),
        Arc::new(kovanent_engine::DeferredAggregator),
        config,
    );
    let record = open_session(&h, &[StepType::Aadhaar]).await;
    h.engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(60)).await;

    let session = h.engine.get_session(&record.token).await.unwrap();
    let step = session.step(StepType::Aadhaar).unwrap();
    assert_eq!(step.status, StepStatus::Pending);
    assert_eq!(
        step.metadata.last_error(),
        Some(kovanent_core::verification::STALE_REDIRECT_REASON)
    );

    // The release was persisted, not just reported.
    let stored = h.store.load_by_token(&record.token).await.unwrap().unwrap();
    assert_eq!(
        stored.step(StepType::Aadhaar).unwrap().status,
        StepStatus::Pending
    );
}

#[tokio::test]
async fn round_trip_persists_enough_to_detect_completion_after_reload() {
    let h = harness();
    let record = open_session(&h, &[StepType::Aadhaar]).await;
    let started = h
        .engine
        .initiate_external_step(&record.token, StepType::Aadhaar, RETURN_URL)
        .await
        .unwrap();
    h.engine
        .complete_external_step(&record.token, StepType::Aadhaar, Some(&started.client_id))
        .await
        .unwrap();

    let reloaded = h.engine.get_session(&record.token).await.unwrap();
    let step = reloaded.step(StepType::Aadhaar).unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(
        step.metadata.external().unwrap().status,
        ExternalFlowStatus::Completed
    );
    assert!(reloaded.current_step().is_none());
}

// ---------------------------------------------------------------------------
// Submission and scoring
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_d_submit_requires_consent() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Aadhaar]).await;
    complete_all_steps(&h, &record).await;

    assert_matches!(
        h.engine.submit(&record.token, false).await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );

    let submitted = h.engine.submit(&record.token, true).await.unwrap();
    assert_eq!(submitted.status, SessionStatus::Submitted);
    assert!(submitted.submitted_at.is_some());
    assert!(submitted.consent_given_at.is_some());
    assert_eq!(submitted.candidate.status, CandidateStatus::Completed);
}

#[tokio::test]
async fn submit_fails_for_every_incomplete_combination() {
    let h = harness();
    let types = [StepType::PersonalInfo, StepType::Aadhaar];
    let record = open_session(&h, &types).await;
    let statuses = [
        StepStatus::Pending,
        StepStatus::InProgress,
        StepStatus::Completed,
        StepStatus::Failed,
    ];

    for a in statuses {
        for b in statuses {
            if a == StepStatus::Completed && b == StepStatus::Completed {
                continue;
            }
            for (ty, status) in types.iter().zip([a, b]) {
                let mut step = record.step(*ty).unwrap().clone();
                step.status = status;
                h.store.put_step(&record.token, step);
            }
            assert_matches!(
                h.engine.submit(&record.token, true).await,
                Err(EngineError::Core(CoreError::PreconditionFailed(_))),
                "statuses ({a:?}, {b:?})"
            );
        }
    }
}

#[tokio::test]
async fn submitted_session_is_readable_but_not_resubmittable() {
    let h = harness();
    let record = open_session(&h, &[StepType::PersonalInfo]).await;
    complete_all_steps(&h, &record).await;
    h.engine.submit(&record.token, true).await.unwrap();

    assert_matches!(
        h.engine.submit(&record.token, true).await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );
    let session = h.engine.get_session(&record.token).await.unwrap();
    assert_eq!(session.status, SessionStatus::Submitted);
    assert!(!session.view().ready_to_submit);
}

#[tokio::test]
async fn deferred_scoring_waits_for_external_score_then_finalizes() {
    let h = harness();
    let record = open_session(&h, &[StepType::Pan]).await;
    complete_all_steps(&h, &record).await;

    assert_matches!(
        h.engine.finalize(&record.token).await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );
    let early = TrustScore {
        score: 80,
        breakdown: serde_json::Map::new(),
    };
    assert_matches!(
        h.engine.record_score(&record.token, early).await,
        Err(EngineError::Core(CoreError::PreconditionFailed(_)))
    );

    h.engine.submit(&record.token, true).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let still = h.engine.get_session(&record.token).await.unwrap();
    assert_eq!(still.status, SessionStatus::Submitted);

    let mut breakdown = serde_json::Map::new();
    breakdown.insert("PAN".to_string(), serde_json::json!(90));
    let scored = h
        .engine
        .record_score(&record.token, TrustScore { score: 88, breakdown })
        .await
        .unwrap();
    assert_eq!(scored.status, SessionStatus::Scored);
    assert_eq!(scored.trust_score.as_ref().map(|t| t.score), Some(88));

    let done = h.engine.finalize(&record.token).await.unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
}

#[tokio::test]
async fn out_of_range_score_is_rejected() {
    let h = harness();
    let record = open_session(&h, &[StepType::Pan]).await;
    complete_all_steps(&h, &record).await;
    h.engine.submit(&record.token, true).await.unwrap();

    let bad = TrustScore {
        score: 150,
        breakdown: serde_json::Map::new(),
    };
    assert_matches!(
        h.engine.record_score(&record.token, bad).await,
        Err(EngineError::Core(CoreError::Validation(_)))
    );
}

#[tokio::test]
async fn aggregator_score_moves_session_to_scored() {
    let score = TrustScore {
        score: 72,
        breakdown: serde_json::Map::new(),
    };
    let h = harness_with(
        MockProvider::new(),
        Arc::new(FixedAggregator(score)),
        EngineConfig::default(),
    );
    let record = open_session(&h, &[StepType::PersonalInfo, StepType::Pan]).await;
    complete_all_steps(&h, &record).await;

    let submitted = h.engine.submit(&record.token, true).await.unwrap();
    assert_eq!(submitted.status, SessionStatus::Submitted);

    let scored = wait_for_status(&h, &record.token, SessionStatus::Scored).await;
    assert_eq!(scored.trust_score.map(|t| t.score), Some(72));
}

#[tokio::test]
async fn full_default_plan_runs_end_to_end() {
    let h = harness();
    let candidate = h.store.insert_candidate("Meera Nair", Some("meera@example.com"));
    let record = h.engine.create_session(candidate.id, true, None).await.unwrap();

    complete_all_steps(&h, &record).await;
    let ready = h.engine.get_session(&record.token).await.unwrap();
    assert!(ready.view().ready_to_submit);
    assert!(ready.view().current_step.is_none());

    let submitted = h.engine.submit(&record.token, true).await.unwrap();
    assert_eq!(submitted.status, SessionStatus::Submitted);
    assert_eq!(h.provider.fetch_calls(), 1);
}
