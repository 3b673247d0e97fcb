//! Router tests: the whole app over in-memory stores.

use super::{
    app,
    handlers::{
        auth::{
            credentials::FailingCredentialStore, AuthConfig, AuthState, CredentialStore,
            MemoryCredentialStore, MemorySessionStore, Role,
        },
        records::{MemoryRecordStore, RecordStore, SharedRecordStore},
    },
    notifier::RecordingNotifier,
};
use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    notifier: Arc<RecordingNotifier>,
    records: Arc<MemoryRecordStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_credentials(Arc::new(
            MemoryCredentialStore::new().with_record("admin@x.com", "s3cret", Role::Admin),
        ))
    }

    fn with_credentials(credentials: Arc<dyn CredentialStore>) -> Self {
        let config = AuthConfig::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let records = Arc::new(MemoryRecordStore::new());
        let auth_state = Arc::new(AuthState::new(
            config.clone(),
            Arc::new(MemorySessionStore::new(config.session_ttl())),
            credentials,
            notifier.clone(),
        ));
        let shared: SharedRecordStore = records.clone();
        Self {
            router: app(auth_state, shared),
            notifier,
            records,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Result<Response> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        Ok(self.router.clone().oneshot(request).await?)
    }

    /// Admin session cookie from a password login.
    async fn admin_cookie(&self) -> Result<String> {
        let response = self
            .send(
                Method::POST,
                "/v1/auth/login",
                None,
                Some(json!({"email": "admin@x.com", "password": "s3cret"})),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }

    /// Cookie of the session that requested a one-time code, plus the code.
    async fn pending_code(&self, email: &str) -> Result<(String, String)> {
        let response = self
            .send(
                Method::POST,
                "/v1/auth/send-code",
                None,
                Some(json!({"email": email})),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response)?;
        let code = self.notifier.last_secret().await.context("no code sent")?;
        Ok((cookie, code))
    }

    /// User session cookie from the one-time code flow.
    async fn user_cookie(&self, email: &str) -> Result<String> {
        let (cookie, code) = self.pending_code(email).await?;
        let response = self
            .send(
                Method::POST,
                "/v1/auth/login",
                Some(&cookie),
                Some(json!({"email": email, "password": code})),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        session_cookie(&response)
    }
}

fn session_cookie(response: &Response) -> Result<String> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?;
    let pair = header.split(';').next().context("empty Set-Cookie")?;
    Ok(pair.trim().to_string())
}

async fn json_body(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn record_body(state: &str, location: &str) -> Value {
    json!({
        "state": state,
        "location": location,
        "establishment": "Spinning Mill",
        "act": "Factories Act, 1948",
        "details": "Form 21 annual return"
    })
}

#[tokio::test]
async fn health_reports_build_info_and_request_id() -> Result<()> {
    let app = TestApp::new();
    let response = app.send(Method::GET, "/health", None, None).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    let x_app = response
        .headers()
        .get("X-App")
        .context("missing X-App")?
        .to_str()?;
    assert!(x_app.starts_with(env!("CARGO_PKG_NAME")));

    let body = json_body(response).await?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["database"], "ok");
    Ok(())
}

#[tokio::test]
async fn send_code_sets_session_cookie() -> Result<()> {
    let app = TestApp::new();
    let response = app
        .send(
            Method::POST,
            "/v1/auth/send-code",
            None,
            Some(json!({"email": "u@x.com"})),
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?
        .to_string();
    assert!(header.starts_with("seportal_session="));
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("SameSite=Lax"));
    assert_eq!(json_body(response).await?["message"], "OTP sent successfully");
    Ok(())
}

#[tokio::test]
async fn send_code_rejects_bad_email_and_missing_body() -> Result<()> {
    let app = TestApp::new();

    let response = app
        .send(
            Method::POST,
            "/v1/auth/send-code",
            None,
            Some(json!({"email": "not-an-email"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(json_body(response).await?["error"], "invalid_email");

    let response = app.send(Method::POST, "/v1/auth/send-code", None, None).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn code_login_returns_user_session() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.user_cookie("u@x.com").await?;

    let response = app
        .send(Method::GET, "/v1/auth/session", Some(&cookie), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["email"], "u@x.com");
    assert_eq!(body["role"], "user");
    Ok(())
}

#[tokio::test]
async fn login_replaces_the_session_cookie() -> Result<()> {
    let app = TestApp::new();
    let (before, code) = app.pending_code("u@x.com").await?;

    let response = app
        .send(
            Method::POST,
            "/v1/auth/login",
            Some(&before),
            Some(json!({"email": "u@x.com", "password": code})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let after = session_cookie(&response)?;
    assert_ne!(after, before);

    let response = app
        .send(Method::GET, "/v1/auth/session", Some(&before), None)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .send(Method::GET, "/v1/auth/session", Some(&after), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn credential_store_outage_is_service_unavailable() -> Result<()> {
    let app = TestApp::with_credentials(Arc::new(FailingCredentialStore));

    let response = app
        .send(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({"email": "admin@x.com", "password": "s3cret"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(json_body(response).await?, json!({"error": "unavailable"}));

    let response = app
        .send(
            Method::POST,
            "/v1/auth/admin/reset-password",
            None,
            Some(json!({"email": "admin@x.com"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.notifier.messages().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> Result<()> {
    let app = TestApp::new();
    let response = app
        .send(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({"email": "admin@x.com", "password": "wrong"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await?["error"], "invalid_credentials");
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_are_forbidden() -> Result<()> {
    let app = TestApp::new();

    let response = app.send(Method::GET, "/v1/records", None, None).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await?["error"], "forbidden");

    // A made-up token is no better than none.
    let response = app
        .send(
            Method::GET,
            "/v1/auth/session",
            Some("seportal_session=forged"),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn user_can_list_but_not_mutate_records() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_cookie().await?;
    let response = app
        .send(
            Method::POST,
            "/v1/records",
            Some(&admin),
            Some(record_body("Kerala", "Kochi")),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let user = app.user_cookie("u@x.com").await?;
    let response = app
        .send(Method::GET, "/v1/records", Some(&user), None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?.as_array().map(Vec::len), Some(1));

    let response = app
        .send(
            Method::POST,
            "/v1/records",
            Some(&user),
            Some(record_body("Goa", "Panaji")),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .send(
            Method::PUT,
            "/v1/records/1",
            Some(&user),
            Some(record_body("Goa", "Panaji")),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .send(Method::DELETE, "/v1/records/1", Some(&user), None)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Nothing was written by the denied requests.
    assert_eq!(app.records.len().await, 1);
    let stored = app.records.list(&Default::default()).await?;
    assert_eq!(stored[0].state, "Kerala");
    Ok(())
}

#[tokio::test]
async fn admin_manages_records() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_cookie().await?;

    let response = app
        .send(
            Method::POST,
            "/v1/records",
            Some(&admin),
            Some(record_body("Kerala", "Kochi")),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await?;
    let id = created["id"].as_u64().context("missing id")?;

    app.send(
        Method::POST,
        "/v1/records",
        Some(&admin),
        Some(record_body("Goa", "Panaji")),
    )
    .await?;

    let response = app
        .send(
            Method::GET,
            "/v1/records?state=Goa&location=--%20All%20Locations%20--",
            Some(&admin),
            None,
        )
        .await?;
    let listed = json_body(response).await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["location"], "Panaji");

    let response = app
        .send(
            Method::PUT,
            &format!("/v1/records/{id}"),
            Some(&admin),
            Some(record_body("Kerala", "Thrissur")),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["location"], "Thrissur");

    let response = app
        .send(Method::DELETE, &format!("/v1/records/{id}"), Some(&admin), None)
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(Method::DELETE, &format!("/v1/records/{id}"), Some(&admin), None)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await?["error"], "not_found");
    Ok(())
}

#[tokio::test]
async fn invalid_record_body_is_rejected() -> Result<()> {
    let app = TestApp::new();
    let admin = app.admin_cookie().await?;

    let response = app
        .send(
            Method::POST,
            "/v1/records",
            Some(&admin),
            Some(record_body("", "Kochi")),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["error"], "invalid_record");
    assert_eq!(app.records.len().await, 0);
    Ok(())
}

#[tokio::test]
async fn logout_clears_cookie_and_session() -> Result<()> {
    let app = TestApp::new();
    let cookie = app.user_cookie("u@x.com").await?;

    let response = app
        .send(Method::POST, "/v1/auth/logout", Some(&cookie), None)
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .context("missing Set-Cookie")?
        .to_str()?;
    assert!(cleared.contains("Max-Age=0"));

    let response = app
        .send(Method::GET, "/v1/auth/session", Some(&cookie), None)
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Logging out without a session still answers 204.
    let response = app.send(Method::POST, "/v1/auth/logout", None, None).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn reset_password_is_accepted_only_for_admins() -> Result<()> {
    let app = TestApp::new();

    let response = app
        .send(
            Method::POST,
            "/v1/auth/admin/reset-password",
            None,
            Some(json!({"email": "admin@x.com"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await?;
    let new_password = app.notifier.last_secret().await.context("nothing mailed")?;
    // The new password is only delivered by mail.
    assert!(!body.to_string().contains(&new_password));

    let response = app
        .send(
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({"email": "admin@x.com", "password": new_password})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(
            Method::POST,
            "/v1/auth/admin/reset-password",
            None,
            Some(json!({"email": "nobody@x.com"})),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await?["error"], "not_admin");
    Ok(())
}

#[tokio::test]
async fn swagger_document_is_served() -> Result<()> {
    let app = TestApp::new();
    let response = app
        .send(Method::GET, "/api-docs/openapi.json", None, None)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert!(body["paths"]["/v1/auth/login"].is_object());
    Ok(())
}
