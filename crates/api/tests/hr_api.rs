//! HR-facing API against a real database: auth, candidates, documents and
//! verification session management.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, delete_auth, get, get_auth, multipart_body, patch_json_auth,
    post_json, post_json_auth, post_multipart, test_config, RETURN_URL,
};
use kovanent_api::auth::jwt::generate_access_token;
use kovanent_provider::{MOCK_DOB, MOCK_FULL_NAME};
use serde_json::json;
use sqlx::PgPool;

/// Register an HR user through the API and return the bearer token.
async fn register(app: axum::Router, email: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/auth/register",
        json!({ "email": email, "password": "correct-horse-1", "name": "Priya HR" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

async fn create_candidate(app: axum::Router, token: &str) -> i64 {
    let response = post_json_auth(
        app,
        "/api/v1/candidates",
        json!({ "name": "  Asha Verma ", "email": "asha@example.com" }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn register_login_and_me(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(pool, dir.path().to_path_buf());
    register(app.clone(), "Priya@Example.com").await;

    let response = post_json(
        app.clone(),
        "/api/v1/auth/login",
        json!({ "email": "priya@example.com", "password": "correct-horse-1" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "priya@example.com");
    assert_eq!(json["user"]["role"], "hr");
    assert!(json["user"].get("password_hash").is_none());

    let token = json["token"].as_str().unwrap();
    let me = body_json(get_auth(app.clone(), "/api/v1/auth/me", token).await).await;
    assert_eq!(me["email"], "priya@example.com");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn wrong_password_and_duplicate_email(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(pool, dir.path().to_path_buf());
    register(app.clone(), "hr@example.com").await;

    let response = post_json(
        app.clone(),
        "/api/v1/auth/login",
        json!({ "email": "hr@example.com", "password": "wrong-password" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(
        app,
        "/api/v1/auth/register",
        json!({ "email": "hr@example.com", "password": "another-pass-2", "name": "Dup" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn candidate_crud_and_forward_only_status(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(pool, dir.path().to_path_buf());
    let token = register(app.clone(), "hr@example.com").await;
    let id = create_candidate(app.clone(), &token).await;

    let json = body_json(get_auth(app.clone(), &format!("/api/v1/candidates/{id}"), &token).await).await;
    assert_eq!(json["name"], "Asha Verma");
    assert_eq!(json["status"], "pending");

    let response = patch_json_auth(
        app.clone(),
        &format!("/api/v1/candidates/{id}"),
        json!({ "status": "completed" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = patch_json_auth(
        app.clone(),
        &format!("/api/v1/candidates/{id}"),
        json!({ "status": "pending" }),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let list = body_json(
        get_auth(app.clone(), "/api/v1/candidates?status=completed", &token).await,
    )
    .await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let response = get_auth(app, "/api/v1/candidates/999999", &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn upload_list_and_delete_document(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(pool, dir.path().to_path_buf());
    let token = register(app.clone(), "hr@example.com").await;
    let candidate_id = create_candidate(app.clone(), &token).await;

    let cid = candidate_id.to_string();
    let (content_type, body) = multipart_body(
        &[("candidate_id", cid.as_str()), ("doc_type", "pan")],
        Some(("pan card.pdf", "application/pdf", b"%PDF-1.4 test")),
    );
    let response = post_multipart(
        app.clone(),
        "/api/v1/documents/upload",
        content_type,
        body,
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let doc = body_json(response).await;
    assert_eq!(doc["doc_type"], "pan");
    assert!(doc.get("file_path").is_none());
    let doc_id = doc["id"].as_i64().unwrap();

    let list = body_json(
        get_auth(app.clone(), &format!("/api/v1/documents/{candidate_id}"), &token).await,
    )
    .await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let response = delete_auth(app.clone(), &format!("/api/v1/documents/{doc_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = delete_auth(app, &format!("/api/v1/documents/{doc_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unsupported_upload_type_is_rejected(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(pool, dir.path().to_path_buf());
    let token = register(app.clone(), "hr@example.com").await;
    let candidate_id = create_candidate(app.clone(), &token).await;

    let cid = candidate_id.to_string();
    let (content_type, body) = multipart_body(
        &[("candidate_id", cid.as_str()), ("doc_type", "pan")],
        Some(("notes.txt", "text/plain", b"hello")),
    );
    let response =
        post_multipart(app, "/api/v1/documents/upload", content_type, body, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Verification sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn session_lifecycle_through_finalize(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(pool, dir.path().to_path_buf());
    let hr = register(app.clone(), "hr@example.com").await;
    let candidate_id = create_candidate(app.clone(), &hr).await;

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/candidates/{candidate_id}/verification"),
        json!({ "include_uan": true }),
        &hr,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = body_json(response).await;
    let token = session["token"].as_str().unwrap().to_string();
    assert_eq!(session["verify_path"], format!("/verify/{token}"));
    assert_eq!(session["steps"].as_array().unwrap().len(), 5);

    // A second session for the same candidate is a conflict.
    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/candidates/{candidate_id}/verification"),
        json!({}),
        &hr,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Candidate side.
    let view = body_json(get(app.clone(), &format!("/api/v1/verify/{token}")).await).await;
    assert_eq!(view["candidate"]["status"], "in_progress");

    let ok = |r: axum::response::Response| assert_eq!(r.status(), StatusCode::OK);
    ok(post_json(
        app.clone(),
        &format!("/api/v1/verify/{token}/PERSONAL_INFO/submit"),
        json!({ "full_name": MOCK_FULL_NAME, "dob": MOCK_DOB, "email": "asha@example.com" }),
    )
    .await);

    let (content_type, body) = multipart_body(
        &[("doc_type", "selfie")],
        Some(("me.jpg", "image/jpeg", b"\xff\xd8\xff jpeg")),
    );
    let response = post_multipart(
        app.clone(),
        &format!("/api/v1/verify/{token}/documents"),
        content_type,
        body,
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let selfie_id = body_json(response).await["id"].as_i64().unwrap();

    ok(post_json(
        app.clone(),
        &format!("/api/v1/verify/{token}/FACE_LIVENESS/submit"),
        json!({ "selfie_document_id": selfie_id }),
    )
    .await);
    ok(post_json(
        app.clone(),
        &format!("/api/v1/verify/{token}/AADHAAR/initiate"),
        json!({ "redirect_url": RETURN_URL }),
    )
    .await);
    ok(post_json(
        app.clone(),
        &format!("/api/v1/verify/{token}/AADHAAR/complete"),
        json!({}),
    )
    .await);
    ok(post_json(
        app.clone(),
        &format!("/api/v1/verify/{token}/PAN/submit"),
        json!({ "pan_number": "ABCDE1234F" }),
    )
    .await);
    ok(post_json(
        app.clone(),
        &format!("/api/v1/verify/{token}/UAN/submit"),
        json!({ "is_fresher": true }),
    )
    .await);
    ok(post_json(
        app.clone(),
        &format!("/api/v1/verify/{token}/submit"),
        json!({ "consent": true }),
    )
    .await);

    // HR side again.
    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/verifications/{token}/score"),
        json!({ "score": 87, "breakdown": { "aadhaar": 40 } }),
        &hr,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "SCORED");

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/verifications/{token}/finalize"),
        json!({}),
        &hr,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let session = body_json(
        get_auth(
            app,
            &format!("/api/v1/candidates/{candidate_id}/verification"),
            &hr,
        )
        .await,
    )
    .await;
    assert_eq!(session["status"], "COMPLETED");
    assert_eq!(session["trust_score"]["score"], 87);
    assert_eq!(session["candidate"]["status"], "completed");
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn hr_users_only_see_their_own_candidates(pool: PgPool) {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(pool, dir.path().to_path_buf());
    let owner = register(app.clone(), "owner@example.com").await;
    let other = register(app.clone(), "other@example.com").await;

    let response = post_json_auth(
        app.clone(),
        "/api/v1/candidates",
        json!({ "name": "Asha Verma", "national_id": "123412341234" }),
        &owner,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let candidate_id = body_json(response).await["id"].as_i64().unwrap();

    let cid = candidate_id.to_string();
    let (content_type, body) = multipart_body(
        &[("candidate_id", cid.as_str()), ("doc_type", "pan")],
        Some(("pan.pdf", "application/pdf", b"%PDF-1.4 test")),
    );
    let response = post_multipart(
        app.clone(),
        "/api/v1/documents/upload",
        content_type,
        body,
        Some(&owner),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let doc_id = body_json(response).await["id"].as_i64().unwrap();

    let response = post_json_auth(
        app.clone(),
        &format!("/api/v1/candidates/{candidate_id}/verification"),
        json!({}),
        &owner,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    // Another HR user cannot reach any of it.
    let list = body_json(get_auth(app.clone(), "/api/v1/candidates", &other).await).await;
    assert!(list["data"].as_array().unwrap().is_empty());

    let not_found = |r: axum::response::Response| assert_eq!(r.status(), StatusCode::NOT_FOUND);
    not_found(get_auth(app.clone(), &format!("/api/v1/candidates/{candidate_id}"), &other).await);
    not_found(
        patch_json_auth(
            app.clone(),
            &format!("/api/v1/candidates/{candidate_id}"),
            json!({ "phone": "9876543210" }),
            &other,
        )
        .await,
    );
    not_found(get_auth(app.clone(), &format!("/api/v1/documents/{candidate_id}"), &other).await);
    not_found(delete_auth(app.clone(), &format!("/api/v1/documents/{doc_id}"), &other).await);
    not_found(
        get_auth(
            app.clone(),
            &format!("/api/v1/candidates/{candidate_id}/verification"),
            &other,
        )
        .await,
    );
    not_found(
        post_json_auth(
            app.clone(),
            &format!("/api/v1/verifications/{token}/score"),
            json!({ "score": 50, "breakdown": {} }),
            &other,
        )
        .await,
    );
    not_found(
        post_json_auth(
            app.clone(),
            &format!("/api/v1/verifications/{token}/finalize"),
            json!({}),
            &other,
        )
        .await,
    );

    // The owner still sees everything, including the document.
    let json = body_json(
        get_auth(app.clone(), &format!("/api/v1/candidates/{candidate_id}"), &owner).await,
    )
    .await;
    assert_eq!(json["national_id"], "123412341234");
    let docs = body_json(
        get_auth(app.clone(), &format!("/api/v1/documents/{candidate_id}"), &owner).await,
    )
    .await;
    assert_eq!(docs["data"].as_array().unwrap().len(), 1);

    // Admins are not scoped.
    let config = test_config(dir.path().to_path_buf());
    let admin = generate_access_token(999, "admin@example.com", "admin", &config.jwt).unwrap();
    let list = body_json(get_auth(app.clone(), "/api/v1/candidates", &admin).await).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    let response = get_auth(app, &format!("/api/v1/candidates/{candidate_id}"), &admin).await;
    assert_eq!(response.status(), StatusCode::OK);
}
