//! End-to-end pipeline through the HTTP router
//!
//! In-memory storage, real queue workers, and an email sender that captures
//! rendered emails so the tests can follow the emailed links.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use bankly::bootstrap::{App, Backends};
use bankly::config::AppConfig;
use bankly::email::{EmailError, EmailSender, RenderedEmail};
use bankly::gateway::build_router;

const CONFIG: &str = r#"
log_level: info
log_dir: ./logs
log_file: bankly-test.log
use_json: false
rotation: never
gateway:
  host: 127.0.0.1
  port: 0
jwt_secret: pipeline-test-secret
public_base_url: http://localhost:8080/api/v1
queue:
  capacity: 64
  max_attempts: 3
  retry_backoff_ms: 10
recovery:
  enabled: false
  scan_interval_secs: 30
  queued_stale_secs: 60
  batch_size: 100
"#;

#[derive(Default)]
struct CapturingSender {
    sent: Mutex<Vec<RenderedEmail>>,
}

#[async_trait]
impl EmailSender for CapturingSender {
    async fn send(&self, email: &RenderedEmail) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

impl CapturingSender {
    /// Token from the newest email to `to` whose body links to `path`
    fn token_for(&self, to: &str, path: &str) -> Option<String> {
        let marker = format!("/{}/", path);
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|e| e.to == to)
            .find_map(|e| {
                let start = e.body.find(&marker)? + marker.len();
                Some(e.body[start..start + 40].to_string())
            })
    }
}

struct TestApp {
    router: Router,
    emails: Arc<CapturingSender>,
}

impl TestApp {
    fn start() -> Self {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        let emails = Arc::new(CapturingSender::default());
        let state = App::build(&config, Backends::in_memory(), emails.clone()).spawn_workers();
        Self {
            router: build_router(state),
            emails,
        }
    }

    async fn call(&self, method: &str, uri: &str, jwt: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(jwt) = jwt {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", jwt));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Poll until the email worker has delivered a link
    async fn wait_for_token(&self, to: &str, path: &str) -> String {
        for _ in 0..200 {
            if let Some(token) = self.emails.token_for(to, path) {
                return token;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no {} email for {}", path, to);
    }

    /// Register, verify and log in; returns the JWT
    async fn signup(&self, name: &str) -> String {
        let email = format!("{}@example.com", name);
        let (status, _) = self
            .call(
                "POST",
                "/api/v1/users/register",
                None,
                Some(json!({
                    "first_name": name,
                    "user_name": name,
                    "email": email,
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let token = self.wait_for_token(&email, "users/verify").await;
        let (status, body) = self
            .call("GET", &format!("/api/v1/users/verify/{}", token), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["verified"], true);

        self.login(name).await.0
    }

    /// Returns (jwt, balance)
    async fn login(&self, name: &str) -> (String, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/users/login",
                None,
                Some(json!({
                    "email": format!("{}@example.com", name),
                    "password": "correct horse battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (
            body["data"]["token"].as_str().unwrap().to_string(),
            body["data"]["profile"]["balance"].as_str().unwrap().to_string(),
        )
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::start();
    let (status, body) = app.call("GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert!(body["data"]["timestamp_ms"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_protected_routes_require_jwt() {
    let app = TestApp::start();
    let (status, body) = app.call("GET", "/api/v1/transactions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2001);

    let (status, _) = app
        .call("GET", "/api/v1/transactions", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_rejects_malformed_token() {
    let app = TestApp::start();
    let (status, _) = app
        .call("GET", "/api/v1/transactions/verify/short", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = "0".repeat(40);
    let (status, _) = app
        .call("GET", &format!("/api/v1/transactions/verify/{}", unknown), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unverified_account_cannot_login() {
    let app = TestApp::start();
    let (status, _) = app
        .call(
            "POST",
            "/api/v1/users/register",
            None,
            Some(json!({
                "first_name": "Carol",
                "user_name": "carol",
                "email": "carol@example.com",
                "password": "correct horse battery",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/users/login",
            None,
            Some(json!({"email": "carol@example.com", "password": "correct horse battery"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2003);
}

#[tokio::test]
async fn test_resent_link_replaces_the_first() {
    let app = TestApp::start();
    let (status, _) = app
        .call(
            "POST",
            "/api/v1/users/register",
            None,
            Some(json!({
                "first_name": "Dora",
                "user_name": "dora",
                "email": "dora@example.com",
                "password": "correct horse battery",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let first = app.wait_for_token("dora@example.com", "users/verify").await;

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/users/resend-verification",
            None,
            Some(json!({"email": "DORA@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut second = first.clone();
    for _ in 0..200 {
        second = app.wait_for_token("dora@example.com", "users/verify").await;
        if second != first {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_ne!(second, first);

    let (status, _) = app
        .call("GET", &format!("/api/v1/users/verify/{}", first), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .call("GET", &format!("/api/v1/users/verify/{}", second), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    app.login("dora").await;
}

#[tokio::test]
async fn test_profile_and_card_issuance() {
    let app = TestApp::start();
    let (status, _) = app.call("GET", "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ada = app.signup("ada").await;
    let (status, body) = app.call("GET", "/api/v1/users/me", Some(&ada), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["balance"], "0.00");

    let (status, body) = app.call("GET", "/api/v1/cards", Some(&ada), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4004);

    let (status, _) = app
        .call("POST", "/api/v1/cards", Some(&ada), Some(json!({"pin": "12ab"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call("POST", "/api/v1/cards", Some(&ada), Some(json!({"pin": "4821"})))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "PENDING");

    let token = app.wait_for_token("ada@example.com", "cards/verify").await;
    let (status, body) = app
        .call("GET", &format!("/api/v1/cards/verify/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let number = body["data"]["number"].as_str().unwrap().to_string();
    assert_eq!(number.len(), 12);
    assert_eq!(body["data"]["cvv"].as_str().unwrap().len(), 3);

    let (status, _) = app
        .call("GET", &format!("/api/v1/cards/verify/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.call("GET", "/api/v1/cards", Some(&ada), None).await;
    assert_eq!(body["data"]["status"], "ACTIVE");
    assert_eq!(
        body["data"]["number"],
        format!("********{}", &number[8..])
    );

    let (status, _) = app
        .call("POST", "/api/v1/cards", Some(&ada), Some(json!({"pin": "4821"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[cfg(feature = "mock-api")]
#[tokio::test]
async fn test_transfer_settles_end_to_end() {
    let app = TestApp::start();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let (status, _) = app
        .call(
            "POST",
            "/internal/mock/deposit",
            Some(&alice),
            Some(json!({"amount": "100.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/transactions/send",
            Some(&alice),
            Some(json!({"email": "bob@example.com", "amount": "25.00", "description": "Dinner split"})),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "PENDING");
    let tx_id = body["data"]["id"].as_str().unwrap().to_string();

    let token = app
        .wait_for_token("alice@example.com", "transactions/verify")
        .await;
    let (status, body) = app
        .call("GET", &format!("/api/v1/transactions/verify/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "QUEUED");

    // the link is single-use
    let (status, _) = app
        .call("GET", &format!("/api/v1/transactions/verify/{}", token), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let mut settled = Value::Null;
    for _ in 0..200 {
        let (_, body) = app
            .call("GET", &format!("/api/v1/transactions/{}", tx_id), Some(&bob), None)
            .await;
        if body["data"]["status"] == "COMPLETED" {
            settled = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(settled["data"]["amount"], "25.00");

    let (_, alice_balance) = app.login("alice").await;
    let (_, bob_balance) = app.login("bob").await;
    assert_eq!(alice_balance, "75.00");
    assert_eq!(bob_balance, "25.00");

    let (status, body) = app
        .call("GET", "/api/v1/transactions", Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["id"].as_str())
        .collect();
    assert!(ids.contains(&tx_id.as_str()));

    // settlement notifications reach both parties' feeds
    let mut received = false;
    for _ in 0..200 {
        let (_, body) = app
            .call("GET", "/api/v1/notifications", Some(&bob), None)
            .await;
        if body["data"]
            .as_array()
            .is_some_and(|n| n.iter().any(|n| n["status"] == "RECEIVED"))
        {
            received = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(received);
}

#[tokio::test]
async fn test_request_reject_flow() {
    let app = TestApp::start();
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    // bob asks alice for money
    let (status, body) = app
        .call(
            "POST",
            "/api/v1/transactions/request",
            Some(&bob),
            Some(json!({"email": "alice@example.com", "amount": 12.5})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let tx_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app
        .call("GET", "/api/v1/transactions/requested", Some(&bob), None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "PENDING");

    // only the requester may approve or reject
    let (status, _) = app
        .call("POST", &format!("/api/v1/transactions/{}/reject", tx_id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call("POST", &format!("/api/v1/transactions/{}/reject", tx_id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "FAILED");

    // the cached list reflects the rejection
    let (_, body) = app
        .call("GET", "/api/v1/transactions/requested", Some(&bob), None)
        .await;
    assert_eq!(body["data"][0]["status"], "FAILED");
    assert_eq!(body["data"][0]["failure_reason"], "REJECTED");
}
