#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use chrono::NaiveTime;
use postdesk::{ServerConfig, create_app, db::Database};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

pub const PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub app: Router,
    pub db: Database,
}

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: JWT_SECRET.to_vec(),
        access_token_ttl_secs: 3600,
        refresh_token_ttl_secs: 14 * 24 * 3600,
        retention_months: 12,
        purge_at: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
        sign_in_per_minute: 1000,
        register_per_minute: 1000,
        ip_header: None,
    }
}

pub async fn create_test_app() -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let app = create_app(&test_config(db.clone()));
    TestApp { app, db }
}

impl TestApp {
    /// Send a request with an optional bearer token and JSON body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Register a user and return `(user_id, access_token)`.
    pub async fn register(&self, email: &str, name: &str) -> (i64, String) {
        let response = self
            .send(
                "POST",
                "/api/v1/users/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "name": name })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = body_json(response).await;
        (
            json["data"]["userId"].as_i64().unwrap(),
            json["data"]["accessToken"].as_str().unwrap().to_string(),
        )
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Response<Body> {
        self.send(
            "POST",
            "/api/v1/auth/signIn",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Create a post as the token's owner and return its id.
    pub async fn create_post(&self, token: &str, title: &str) -> i64 {
        let response = self
            .send(
                "PUT",
                "/api/v1/posts",
                Some(token),
                Some(json!({ "title": title, "subTitle": "sub", "content": "body" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["data"]["postId"].as_i64().unwrap()
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
