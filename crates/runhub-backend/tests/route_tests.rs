//! HTTP route tests driven through the router without a live listener.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use runhub_backend::server::{create_router, AppState};
use runhub_backend::{Config, Decision, RunHubServer, TokenManager, TokenPair, VisitStore};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
        .body(Body::empty())
        .unwrap()
}

async fn read_body(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response.headers().get("location").unwrap().to_str().unwrap().to_string()
}

/// State with no visit store, pointing the provider at a dead port.
fn state_without_store() -> Arc<AppState> {
    state_for(Config::for_testing("http://127.0.0.1:1"))
}

fn state_for(config: Config) -> Arc<AppState> {
    let tokens = TokenManager::new(&config).unwrap();
    let visits = config
        .visits_db_path
        .as_deref()
        .map(|path| VisitStore::open(path).unwrap());
    Arc::new(AppState { config, tokens, visits })
}

fn live_pair() -> TokenPair {
    TokenPair {
        access_token: "live-access".to_string(),
        refresh_token: "live-refresh".to_string(),
        expires_at: chrono::Utc::now().timestamp() + 3_600,
        scope: "read".to_string(),
    }
}

fn expired_pair() -> TokenPair {
    TokenPair {
        access_token: "stale-access".to_string(),
        refresh_token: "stale-refresh".to_string(),
        expires_at: chrono::Utc::now().timestamp() - 60,
        scope: "read".to_string(),
    }
}

#[tokio::test]
async fn test_test_route_returns_hello_world() {
    let router = create_router(state_without_store());

    let response = router.oneshot(get("/test")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, "Hello World!");
}

#[tokio::test]
async fn test_health_check() {
    let router = create_router(state_without_store());

    let response = router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "runhub-backend");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let router = create_router(state_without_store());

    let response = router.oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pagecount_without_store_reports_minus_one() {
    let router = create_router(state_without_store());

    let response = router.oneshot(get("/pagecount")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&read_body(response).await).unwrap();
    assert_eq!(body["pageCount"], -1);
}

#[tokio::test]
async fn test_index_without_store_still_renders() {
    let router = create_router(state_without_store());

    let response = router.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_body(response).await;
    assert!(body.contains("Welcome to RunHub"));
    assert!(body.contains("Page counting is disabled."));
}

#[tokio::test]
async fn test_index_records_visits_and_pagecount_reports_them() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("visits.db").to_string_lossy().into_owned();
    let mut config = Config::for_testing("http://127.0.0.1:1");
    config.visits_db_path = Some(db_path);
    let router = create_router(state_for(config));

    let first = router.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert!(read_body(first).await.contains("Page view count: 1"));

    let second = router.clone().oneshot(get("/")).await.unwrap();
    assert!(read_body(second).await.contains("Page view count: 2"));

    let count = router.oneshot(get("/pagecount")).await.unwrap();
    let body: serde_json::Value = serde_json::from_str(&read_body(count).await).unwrap();
    assert_eq!(body["pageCount"], 2);
}

#[tokio::test]
async fn test_auth_without_tokens_redirects_to_consent_page() {
    let state = state_without_store();
    let authorize_url = state.config.authorize_url.clone();
    let router = create_router(state);

    let response = router.oneshot(get("/auth")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = location(&response);
    assert!(location.starts_with(&authorize_url), "unexpected location: {location}");

    let url = Url::parse(&location).unwrap();
    let params: HashMap<String, String> =
        serde_urlencoded::from_str(url.query().unwrap()).unwrap();
    assert_eq!(params["client_id"], "29349");
    assert_eq!(params["response_type"], "code");
    assert_eq!(params["redirect_uri"], "http://localhost:3001/strava/redirect");
    assert_eq!(params["scope"], "read");
}

#[tokio::test]
async fn test_auth_with_live_token_goes_straight_to_landing() {
    let state = state_without_store();
    let landing_url = state.config.landing_url.clone();
    state.tokens.apply_token_pair(live_pair()).await;
    let router = create_router(state);

    let response = router.oneshot(get("/auth")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), landing_url);
}

#[tokio::test]
async fn test_auth_refreshes_expired_token_before_landing() {
    let mock_server = MockServer::start().await;
    let state = state_for(Config::for_testing(&mock_server.uri()));
    let landing_url = state.config.landing_url.clone();
    state.tokens.apply_token_pair(expired_pair()).await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh-access",
            "refresh_token": "fresh-refresh",
            "expires_at": chrono::Utc::now().timestamp() + 3_600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let router = create_router(Arc::clone(&state));
    let response = router.oneshot(get("/auth")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), landing_url);
    assert_eq!(state.tokens.needs_authorization().await, Decision::Valid);
}

#[tokio::test]
async fn test_callback_exchanges_code_and_keeps_granted_scope() {
    let mock_server = MockServer::start().await;
    let state = state_for(Config::for_testing(&mock_server.uri()));
    let landing_url = state.config.landing_url.clone();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=xyz789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "granted-access",
            "refresh_token": "granted-refresh",
            "expires_at": chrono::Utc::now().timestamp() + 3_600
        })))
        .mount(&mock_server)
        .await;

    let router = create_router(Arc::clone(&state));
    let response =
        router.oneshot(get("/strava/redirect?code=xyz789&scope=read,profile:read_all")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), landing_url);

    let snapshot = state.tokens.snapshot().await;
    assert_eq!(snapshot.access_token.as_deref(), Some("granted-access"));
    // Token response carried no scope, so the one granted on the callback
    // query sticks.
    assert_eq!(snapshot.scope, "read,profile:read_all");
    assert_eq!(state.tokens.needs_authorization().await, Decision::Valid);
}

#[tokio::test]
async fn test_callback_exchange_failure_still_lands() {
    let mock_server = MockServer::start().await;
    let state = state_for(Config::for_testing(&mock_server.uri()));
    let landing_url = state.config.landing_url.clone();

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({ "error": "invalid_grant" })),
        )
        .mount(&mock_server)
        .await;

    let router = create_router(Arc::clone(&state));
    let response = router.oneshot(get("/strava/redirect?code=bad")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), landing_url);
    assert_eq!(state.tokens.needs_authorization().await, Decision::FreshAuthorizationRequired);
}

#[tokio::test]
async fn test_callback_without_code_redirects_to_landing() {
    let state = state_without_store();
    let landing_url = state.config.landing_url.clone();
    let router = create_router(Arc::clone(&state));

    let response = router.oneshot(get("/strava/redirect")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), landing_url);
    assert_eq!(state.tokens.needs_authorization().await, Decision::FreshAuthorizationRequired);
}

#[tokio::test]
async fn test_callback_with_provider_error_redirects_to_landing() {
    let state = state_without_store();
    let landing_url = state.config.landing_url.clone();
    let router = create_router(Arc::clone(&state));

    let response = router.oneshot(get("/strava/redirect?error=access_denied")).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), landing_url);
    assert_eq!(state.tokens.needs_authorization().await, Decision::FreshAuthorizationRequired);
}

#[tokio::test]
async fn test_server_starts_without_store_when_open_fails() {
    // A directory is not a usable SQLite file; the server must still come
    // up with page counting disabled.
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::for_testing("http://127.0.0.1:1");
    config.visits_db_path = Some(dir.path().to_string_lossy().into_owned());

    let server = RunHubServer::new(config).unwrap();

    assert!(server.state().visits.is_none());
}
