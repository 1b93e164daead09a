mod common;

use axum::http::StatusCode;
use common::{JWT_SECRET, PASSWORD, body_json, create_test_app, test_config};
use postdesk::{create_app, db::Database, jwt::JwtConfig};
use serde_json::json;

#[tokio::test]
async fn test_sign_in_success() {
    let app = create_test_app().await;
    let (user_id, _) = app.register("alice@example.com", "Alice").await;

    let response = app.sign_in("alice@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["code"], 200);
    assert_eq!(json["message"], "OK");

    let data = &json["data"];
    assert_eq!(data["userId"], user_id);
    assert_eq!(data["email"], "alice@example.com");
    assert_eq!(data["name"], "Alice");
    assert_eq!(data["role"], "USER");

    let token = data["accessToken"].as_str().unwrap();
    let claims = JwtConfig::new(JWT_SECRET)
        .validate_access_token(token)
        .unwrap();
    assert_eq!(claims.sub, user_id.to_string());

    // Sign-in stores a refresh token for the user
    assert!(app.db.refresh_tokens().get(user_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sign_in_email_is_case_insensitive() {
    let app = create_test_app().await;
    app.register("alice@example.com", "Alice").await;

    let response = app.sign_in("ALICE@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_sign_in_wrong_password() {
    let app = create_test_app().await;
    app.register("alice@example.com", "Alice").await;

    let response = app.sign_in("alice@example.com", "wrong-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["code"], 401);
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn test_sign_in_unknown_user() {
    let app = create_test_app().await;

    let response = app.sign_in("nobody@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sign_in_validation_errors() {
    let app = create_test_app().await;

    let response = app
        .send(
            "POST",
            "/api/v1/auth/signIn",
            None,
            Some(json!({ "email": "not-an-email", "password": "" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["field"], "email");
    assert_eq!(errors[0]["value"], "not-an-email");
    assert_eq!(errors[1]["field"], "password");
}

#[tokio::test]
async fn test_sign_in_malformed_body() {
    let app = create_test_app().await;

    let response = app
        .send("POST", "/api/v1/auth/signIn", None, Some(json!({ "email": 5 })))
        .await;
    assert!(response.status().is_client_error());
    assert!(body_json(response).await["message"].as_str().is_some());
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let app = create_test_app().await;
    let (user_id, token) = app.register("alice@example.com", "Alice").await;

    let response = app.send("POST", "/api/v1/auth/refresh", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let refreshed = json["data"]["accessToken"].as_str().unwrap();
    let claims = JwtConfig::new(JWT_SECRET)
        .validate_access_token(refreshed)
        .unwrap();
    assert_eq!(claims.sub, user_id.to_string());
}

#[tokio::test]
async fn test_refresh_requires_authentication() {
    let app = create_test_app().await;

    let response = app.send("POST", "/api/v1/auth/refresh", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_out_then_refresh_fails() {
    let app = create_test_app().await;
    let (user_id, token) = app.register("alice@example.com", "Alice").await;

    let response = app.send("POST", "/api/v1/auth/signOut", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.db.refresh_tokens().get(user_id).await.unwrap().is_none());

    // Signing out twice is harmless
    let response = app.send("POST", "/api/v1/auth/signOut", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send("POST", "/api/v1/auth/refresh", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Refresh token not found");
}

#[tokio::test]
async fn test_sign_in_rate_limited() {
    let db = Database::open(":memory:").await.unwrap();
    let mut config = test_config(db);
    config.sign_in_per_minute = 2;
    let app = common::TestApp {
        app: create_app(&config),
        db: config.db.clone(),
    };

    for _ in 0..2 {
        let response = app.sign_in("nobody@example.com", PASSWORD).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let response = app.sign_in("nobody@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], 429);
}
