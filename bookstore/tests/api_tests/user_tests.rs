use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use mongodb::bson::DateTime as BsonDateTime;
use serde_json::json;
use tower::ServiceExt;

use bookstore::model::Role;
use common::test_helpers::{TestResult, test_utils};

use super::mocks::{
    authed_get, authed_json_request, create_test_app, json_request, response_json, sample_user,
    seed_user, test_context,
};

#[tokio::test]
async fn signup_creates_user_with_token() {
    let context = test_context();
    let app = create_test_app(&context);

    let request = json_request(
        "POST",
        "/user/signup",
        &json!({
            "fullname": "Ada Lovelace",
            "email": "Ada@Example.com",
            "password": "secret123",
        }),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["message"], "User created successfully");
    assert!(body["token"].is_string());
    // email is folded to lowercase and the hash never leaves the backend
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn signup_rejects_missing_fields() -> TestResult {
    let context = test_context();
    let app = create_test_app(&context);

    let request = test_utils::build_request(
        "POST",
        "/user/signup",
        Some(json!({ "email": "ada@example.com" }).to_string()),
    )?;
    let (parts, body) = request.into_parts();
    let request = Request::from_parts(parts, Body::from(body));

    let response = app
        .oneshot(request)
        .await
        .map_err(|e| common::test_helpers::TestError::generic(format!("request failed: {}", e)))?;

    test_utils::check_status_code(response.status(), StatusCode::BAD_REQUEST)?;
    Ok(())
}

#[tokio::test]
async fn signup_rejects_short_password() {
    let context = test_context();
    let app = create_test_app(&context);

    let request = json_request(
        "POST",
        "/user/signup",
        &json!({ "fullname": "Ada", "email": "ada@example.com", "password": "abc" }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_rejects_duplicate_email() {
    let context = test_context();
    let app = create_test_app(&context);
    let (existing, _) = seed_user(&context, Role::User);

    let request = json_request(
        "POST",
        "/user/signup",
        &json!({ "fullname": "Copycat", "email": existing.email, "password": "secret123" }),
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn signup_ignores_client_supplied_role() {
    let context = test_context();
    let app = create_test_app(&context);

    let request = json_request(
        "POST",
        "/user/signup",
        &json!({
            "fullname": "Sneaky",
            "email": "sneaky@example.com",
            "password": "secret123",
            "role": "admin",
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let stored = context.users.users.lock().unwrap();
    let user = stored
        .iter()
        .find(|user| user.email == "sneaky@example.com")
        .expect("user stored");
    assert_eq!(user.role, Role::User);
}

#[tokio::test]
async fn login_does_not_distinguish_unknown_email_from_wrong_password() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, _) = seed_user(&context, Role::User);

    let unknown = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/user/login",
            &json!({ "email": "ghost@example.com", "password": "password1" }),
        ))
        .await
        .unwrap();
    let wrong = app
        .oneshot(json_request(
            "POST",
            "/user/login",
            &json!({ "email": user.email, "password": "not-the-password" }),
        ))
        .await
        .unwrap();

    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    let unknown_body = response_json(unknown).await;
    let wrong_body = response_json(wrong).await;
    assert_eq!(unknown_body["message"], wrong_body["message"]);
}

#[tokio::test]
async fn login_returns_token_for_valid_credentials() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, _) = seed_user(&context, Role::User);

    let response = app
        .oneshot(json_request(
            "POST",
            "/user/login",
            &json!({ "email": user.email, "password": "password1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Login successful");
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["_id"], user._id.to_hex());
}

#[tokio::test]
async fn profile_requires_bearer_token() {
    let context = test_context();
    let app = create_test_app(&context);

    let request = Request::builder()
        .uri("/user/me")
        .method("GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_returns_safe_user() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, token) = seed_user(&context, Role::User);

    let response = app.oneshot(authed_get("/user/me", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["_id"], user._id.to_hex());
    assert_eq!(body["email"], user.email);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn profile_update_changes_fullname_only() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, token) = seed_user(&context, Role::User);

    let response = app
        .oneshot(authed_json_request(
            "PUT",
            "/user/me",
            &token,
            &json!({ "fullname": "Renamed Reader", "email": "evil@example.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = context.users.users.lock().unwrap();
    let updated = stored.iter().find(|u| u._id == user._id).unwrap();
    assert_eq!(updated.fullname, "Renamed Reader");
    assert_eq!(updated.email, user.email);
}

#[tokio::test]
async fn forgot_password_is_generic_for_unknown_accounts() {
    let context = test_context();
    let app = create_test_app(&context);

    let response = app
        .oneshot(json_request(
            "POST",
            "/user/forgot-password",
            &json!({ "email": "ghost@example.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(context.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn forgot_password_emails_a_reset_link() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, _) = seed_user(&context, Role::User);

    let response = app
        .oneshot(json_request(
            "POST",
            "/user/forgot-password",
            &json!({ "email": user.email }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = context.users.users.lock().unwrap();
    let token = stored
        .iter()
        .find(|u| u._id == user._id)
        .and_then(|u| u.reset_password_token.clone())
        .expect("reset token stored");

    let sent = context.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, user.email);
    assert!(sent[0].1.ends_with(&format!("/reset-password/{}", token)));
}

#[tokio::test]
async fn reset_password_rejects_unknown_token() {
    let context = test_context();
    let app = create_test_app(&context);

    let response = app
        .oneshot(json_request(
            "POST",
            "/user/reset-password",
            &json!({ "token": "bogus", "password": "newsecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_password_rejects_expired_token() {
    let context = test_context();
    let app = create_test_app(&context);

    let mut user = sample_user(Role::User);
    user.reset_password_token = Some("expired-token".to_string());
    user.reset_password_expires = Some(BsonDateTime::from_millis(
        Utc::now().timestamp_millis() - 60_000,
    ));
    context.users.users.lock().unwrap().push(user);

    let response = app
        .oneshot(json_request(
            "POST",
            "/user/reset-password",
            &json!({ "token": "expired-token", "password": "newsecret" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_password_flow_allows_login_with_new_password() {
    let context = test_context();
    let app = create_test_app(&context);
    let (user, _) = seed_user(&context, Role::User);

    // Arrange: request the reset link
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/user/forgot-password",
            &json!({ "email": user.email }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = context
        .users
        .users
        .lock()
        .unwrap()
        .iter()
        .find(|u| u._id == user._id)
        .and_then(|u| u.reset_password_token.clone())
        .expect("reset token stored");

    // Act: consume it
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/user/reset-password",
            &json!({ "token": token, "password": "brand-new-pass" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Assert: token cleared, old password dead, new one works
    {
        let stored = context.users.users.lock().unwrap();
        let updated = stored.iter().find(|u| u._id == user._id).unwrap();
        assert!(updated.reset_password_token.is_none());
        assert!(updated.reset_password_expires.is_none());
    }
    let old = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/user/login",
            &json!({ "email": user.email, "password": "password1" }),
        ))
        .await
        .unwrap();
    assert_eq!(old.status(), StatusCode::BAD_REQUEST);
    let fresh = app
        .oneshot(json_request(
            "POST",
            "/user/login",
            &json!({ "email": user.email, "password": "brand-new-pass" }),
        ))
        .await
        .unwrap();
    assert_eq!(fresh.status(), StatusCode::OK);
}
