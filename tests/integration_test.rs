// Integration tests for the FieldOps session client
//
// These tests run the full stack (pipeline, token manager, credential store and
// reqwest transport) against a mock backend.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;

use fieldops_session::{
    config::Config,
    http_client::{RequestDescriptor, ReqwestTransport},
    navigation::{HistoryNavigator, Navigator, TracingNotifier},
    storage::{keys, CredentialStore, MemoryCredentialStore, SqliteCredentialStore},
    SessionClient,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

fn jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": "7", "exp": exp }).to_string());
    format!("{}.{}.sig", header, payload)
}

fn fresh_jwt() -> String {
    jwt(chrono::Utc::now().timestamp() + 3600)
}

fn stale_jwt() -> String {
    jwt(chrono::Utc::now().timestamp() - 10)
}

fn create_client(
    server: &ServerGuard,
    store: Arc<dyn CredentialStore>,
) -> (SessionClient, Arc<HistoryNavigator>) {
    let config = Config {
        base_url: server.url(),
        ..Config::default()
    };
    let transport =
        Arc::new(ReqwestTransport::new(4, 5, 10).expect("Failed to create HTTP client"));
    let navigator = Arc::new(HistoryNavigator::new("/layout/dashboard"));
    let client = SessionClient::new(
        config,
        store,
        transport,
        navigator.clone(),
        Arc::new(TracingNotifier),
    );
    (client, navigator)
}

// ==================================================================================================
// Token Injection
// ==================================================================================================

#[tokio::test]
async fn test_fresh_token_sent_as_bearer() {
    let mut server = Server::new_async().await;
    let token = fresh_jwt();

    let profile = server
        .mock("GET", "/api/profile")
        .match_header("authorization", format!("Bearer {}", token).as_str())
        .match_header("content-type", "application/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"data":{"name":"Field Tech"}}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &token).await.unwrap();
    let (client, _) = create_client(&server, store);

    let response = client
        .request(RequestDescriptor::get(client.url("/api/profile")))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.data["data"]["name"], "Field Tech");
    profile.assert_async().await;
}

#[tokio::test]
async fn test_no_token_makes_no_network_call() {
    let mut server = Server::new_async().await;
    let profile = server
        .mock("GET", "/api/profile")
        .expect(0)
        .create_async()
        .await;

    let (client, navigator) = create_client(&server, Arc::new(MemoryCredentialStore::new()));

    let err = client
        .request(RequestDescriptor::get(client.url("/api/profile")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.message(), "No token available");
    assert_eq!(navigator.current_route(), "/login");
    profile.assert_async().await;
}

#[tokio::test]
async fn test_public_endpoint_has_no_authorization() {
    let mut server = Server::new_async().await;
    let login = server
        .mock("POST", "/api/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({"username": "field.tech"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "success": true,
                "data": {
                    "access_token": fresh_jwt(),
                    "refresh_token": "r-1",
                    "privileges": ["stock.view"]
                }
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &fresh_jwt()).await.unwrap();
    let (client, navigator) = create_client(&server, store.clone());

    client.login("field.tech", "secret").await.unwrap();

    assert_eq!(store.get(keys::REFRESH_TOKEN).await.as_deref(), Some("r-1"));
    assert!(client.has_privilege("stock.view").await);
    assert_eq!(navigator.current_route(), "/layout/dashboard");
    login.assert_async().await;
}

// ==================================================================================================
// Refresh
// ==================================================================================================

#[tokio::test]
async fn test_stale_token_refreshed_before_request() {
    let mut server = Server::new_async().await;

    let refresh = server
        .mock("POST", "/api/refresh")
        .match_body(Matcher::Json(json!({"refresh_token": "r"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success":true,"data":{"access_token":"NEW","privileges":["a.b"]}}"#)
        .expect(1)
        .create_async()
        .await;
    let stock = server
        .mock("GET", "/api/stock")
        .match_header("authorization", "Bearer NEW")
        .with_status(200)
        .with_body(r#"{"success":true,"data":[]}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &stale_jwt()).await.unwrap();
    store.set(keys::REFRESH_TOKEN, "r").await.unwrap();
    let (client, _) = create_client(&server, store.clone());

    client
        .request(RequestDescriptor::get(client.url("/api/stock")))
        .await
        .unwrap();

    assert_eq!(store.get(keys::AUTH_TOKEN).await.as_deref(), Some("NEW"));
    assert_eq!(
        store.get(keys::USER_PRIVILEGES).await.as_deref(),
        Some(r#"["a.b"]"#)
    );
    assert!(client.has_privilege("a.b").await);
    refresh.assert_async().await;
    stock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_retried_once_with_new_token() {
    let mut server = Server::new_async().await;
    let old = fresh_jwt();

    let rejected = server
        .mock("GET", "/api/transfers")
        .match_header("authorization", format!("Bearer {}", old).as_str())
        .with_status(401)
        .with_body(r#"{"message":"Unauthenticated"}"#)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/api/transfers")
        .match_header("authorization", "Bearer NEW")
        .with_status(200)
        .with_body(r#"{"success":true,"data":[{"id":1}]}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/refresh")
        .with_status(200)
        .with_body(r#"{"success":true,"data":{"access_token":"NEW"}}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &old).await.unwrap();
    store.set(keys::REFRESH_TOKEN, "r").await.unwrap();
    let (client, _) = create_client(&server, store);

    let response = client
        .request(RequestDescriptor::get(client.url("/api/transfers")))
        .await
        .unwrap();

    assert_eq!(response.data["data"][0]["id"], 1);
    rejected.assert_async().await;
    accepted.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_retry_is_not_repeated() {
    let mut server = Server::new_async().await;

    let transfers = server
        .mock("GET", "/api/transfers")
        .with_status(401)
        .with_body(r#"{"message":"Unauthenticated"}"#)
        .expect(2)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/api/refresh")
        .with_status(200)
        .with_body(r#"{"success":true,"data":{"access_token":"NEW"}}"#)
        .expect(1)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &fresh_jwt()).await.unwrap();
    store.set(keys::REFRESH_TOKEN, "r").await.unwrap();
    let (client, navigator) = create_client(&server, store.clone());

    let err = client
        .request(RequestDescriptor::get(client.url("/api/transfers")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.message(), "Authentication failed");
    assert!(store.is_empty().await);
    assert_eq!(navigator.current_route(), "/login");
    transfers.assert_async().await;
    refresh.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() {
    let mut server = Server::new_async().await;

    let refresh = server
        .mock("POST", "/api/refresh")
        .with_status(200)
        .with_body(r#"{"success":true,"data":{"access_token":"NEW"}}"#)
        .expect(1)
        .create_async()
        .await;
    let readings = server
        .mock("GET", Matcher::Regex(r"^/api/readings/\d$".to_string()))
        .match_header("authorization", "Bearer NEW")
        .with_status(200)
        .with_body(r#"{"success":true}"#)
        .expect(3)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &stale_jwt()).await.unwrap();
    store.set(keys::REFRESH_TOKEN, "r").await.unwrap();
    let (client, _) = create_client(&server, store);

    let results = futures::future::join_all((1..=3).map(|i| {
        client.request(RequestDescriptor::get(
            client.url(&format!("/api/readings/{}", i)),
        ))
    }))
    .await;

    assert!(results.iter().all(|r| r.is_ok()));
    refresh.assert_async().await;
    readings.assert_async().await;
}

#[tokio::test]
async fn test_refresh_rejected_clears_session() {
    let mut server = Server::new_async().await;

    let refresh = server
        .mock("POST", "/api/refresh")
        .with_status(401)
        .with_body(r#"{"success":false,"message":"Refresh token revoked"}"#)
        .expect(1)
        .create_async()
        .await;
    let stock = server
        .mock("GET", "/api/stock")
        .expect(0)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &stale_jwt()).await.unwrap();
    store.set(keys::REFRESH_TOKEN, "r").await.unwrap();
    let (client, navigator) = create_client(&server, store.clone());

    let err = client
        .request(RequestDescriptor::get(client.url("/api/stock")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(store.is_empty().await);
    assert_eq!(navigator.current_route(), "/login");
    refresh.assert_async().await;
    stock.assert_async().await;
}

// ==================================================================================================
// Session Expiry Detection
// ==================================================================================================

#[tokio::test]
async fn test_expired_message_in_success_response() {
    let mut server = Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();

    server
        .mock("GET", "/api/profile")
        .with_status(200)
        .with_body(r#"{"success":false,"message":"Session Expired, please login again"}"#)
        .create_async()
        .await;

    let store = Arc::new(SqliteCredentialStore::open(dir.path().join("session.sqlite3")).unwrap());
    store.set(keys::AUTH_TOKEN, &fresh_jwt()).await.unwrap();
    store.set(keys::REFRESH_TOKEN, "r").await.unwrap();
    store
        .set(keys::USER_PRIVILEGES, r#"["stock.view"]"#)
        .await
        .unwrap();
    let (client, navigator) = create_client(&server, store.clone());

    let err = client
        .request(RequestDescriptor::get(client.url("/api/profile")))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(err.is_auth());
    assert!(store.get(keys::AUTH_TOKEN).await.is_none());
    assert!(store.get(keys::REFRESH_TOKEN).await.is_none());
    assert!(store.get(keys::USER_PRIVILEGES).await.is_none());
    assert!(!client.is_authenticated().await);
    assert_eq!(navigator.current_route(), "/login");
}

#[tokio::test]
async fn test_business_error_passes_through() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/api/stock-transfer")
        .with_status(422)
        .with_body(r#"{"success":false,"message":"Quantity exceeds available stock"}"#)
        .create_async()
        .await;

    let store = Arc::new(MemoryCredentialStore::new());
    store.set(keys::AUTH_TOKEN, &fresh_jwt()).await.unwrap();
    let (client, navigator) = create_client(&server, store.clone());

    let response = client
        .pipeline()
        .post(
            RequestDescriptor::get(client.url("/api/stock-transfer")).json(json!({"qty": 500})),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 422);
    assert!(store.get(keys::AUTH_TOKEN).await.is_some());
    assert_eq!(navigator.current_route(), "/layout/dashboard");
}

// ==================================================================================================
// Persistence
// ==================================================================================================

#[tokio::test]
async fn test_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.sqlite3");
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/api/login")
        .with_status(200)
        .with_body(
            json!({
                "success": true,
                "data": {
                    "access_token": fresh_jwt(),
                    "refresh_token": "r-1",
                    "privileges": ["attendance.punch"],
                    "user": {"name": "Field Tech"}
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    {
        let store = Arc::new(SqliteCredentialStore::open(&path).unwrap());
        let (client, _) = create_client(&server, store);
        client.login("field.tech", "secret").await.unwrap();
    }

    let store = Arc::new(SqliteCredentialStore::open(&path).unwrap());
    let (client, _) = create_client(&server, store);
    let creds = client.restore().await;

    assert!(creds.is_authenticated());
    assert_eq!(creds.refresh_token.as_deref(), Some("r-1"));
    assert_eq!(creds.user_profile, Some(json!({"name": "Field Tech"})));
    assert!(client.has_privilege("attendance.punch").await);

    client.logout().await.unwrap();
    assert!(!client.is_authenticated().await);
}
