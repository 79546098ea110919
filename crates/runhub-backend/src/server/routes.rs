//! Route handlers for the RunHub backend.
//!
//! Every authorization-flow handler ends in a `302 Found` back to the
//! landing page; failures are logged rather than surfaced to the visitor.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::auth::Decision;
use crate::server::AppState;

/// Create the router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/pagecount", get(page_count))
        .route("/test", get(test_page))
        .route("/auth", get(begin_auth))
        .route("/strava/redirect", get(auth_callback))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(event = "handler_panic", message, "handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, "Something bad happened!").into_response()
}

/// `302 Found` redirect to the given location.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [("Location", location.to_string())]).into_response()
}

/// Client address for the visit log, preferring `X-Forwarded-For` when a
/// proxy sits in front.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

struct IndexData {
    count: i64,
    db_path: String,
}

fn render_index(data: Option<&IndexData>) -> String {
    let counter = match data {
        Some(data) => format!(
            "<p>Page view count: {}</p>\n    <p>Database: SQLite at {}</p>",
            data.count, data.db_path
        ),
        None => "<p>Page counting is disabled.</p>".to_string(),
    };

    format!(
        "<!DOCTYPE html>\n<html>\n  <head><title>RunHub</title></head>\n  <body>\n    <h1>Welcome to RunHub</h1>\n    {counter}\n    <p><a href=\"/auth\">Connect with Strava</a></p>\n  </body>\n</html>\n"
    )
}

/// Landing page; records the visit and renders the running total.
async fn index(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Html<String> {
    let data = match &state.visits {
        Some(store) => {
            let ip = client_ip(&headers, peer);
            let visited_at = chrono::Utc::now().timestamp_millis();
            if let Err(err) = store.record(ip, visited_at).await {
                tracing::error!(operation = "record_visit", error = %err, "failed to record visit");
            }
            match store.count().await {
                Ok(count) => Some(IndexData { count, db_path: store.path().to_string() }),
                Err(err) => {
                    tracing::error!(operation = "count_visits", error = %err, "failed to count visits");
                    None
                }
            }
        }
        None => None,
    };

    Html(render_index(data.as_ref()))
}

/// Current visit total as JSON, `-1` when the store is unavailable.
async fn page_count(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let count = match &state.visits {
        Some(store) => match store.count().await {
            Ok(count) => count,
            Err(err) => {
                tracing::error!(operation = "count_visits", error = %err, "failed to count visits");
                -1
            }
        },
        None => -1,
    };

    Json(serde_json::json!({ "pageCount": count }))
}

async fn test_page() -> &'static str {
    "Hello World!"
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "runhub-backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Entry point of the authorization flow.
///
/// With no refresh token on hand the visitor is sent to the provider's
/// consent screen; an expired access token is refreshed in place; a live
/// one needs nothing. All paths besides the consent redirect end at the
/// landing page.
async fn begin_auth(State(state): State<Arc<AppState>>) -> Response {
    match state.tokens.needs_authorization().await {
        Decision::FreshAuthorizationRequired => match state.tokens.authorize_url() {
            Ok(url) => found(url.as_str()),
            Err(err) => {
                tracing::error!(operation = "authorize_url", error = %err, "cannot build authorization redirect");
                found(&state.config.landing_url)
            }
        },
        Decision::RefreshRequired => {
            match state.tokens.refresh().await {
                Ok(_) => tracing::info!(operation = "refresh_token", "access token refreshed"),
                Err(err) => {
                    tracing::error!(operation = "refresh_token", status = err.status(), error = %err, "token refresh failed");
                }
            }
            found(&state.config.landing_url)
        }
        Decision::Valid => found(&state.config.landing_url),
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    scope: Option<String>,
    error: Option<String>,
}

/// Provider callback. Exchanges the authorization code and installs the
/// resulting tokens; the granted scope comes from the callback query when
/// the token response omits it. Always redirects to the landing page.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error.as_deref() {
        tracing::warn!(operation = "auth_callback", error, "authorization denied by provider");
        return found(&state.config.landing_url);
    }

    match query.code.as_deref() {
        Some(code) => match state.tokens.exchange_code(code).await {
            Ok(mut pair) => {
                if pair.scope.is_empty() {
                    pair.scope = query
                        .scope
                        .clone()
                        .unwrap_or_else(|| state.config.requested_scope.clone());
                }
                state.tokens.apply_token_pair(pair).await;
                tracing::info!(operation = "exchange_code", "authorization code exchanged");
            }
            Err(err) => {
                tracing::error!(operation = "exchange_code", status = err.status(), error = %err, "code exchange failed");
            }
        },
        None => {
            if state.tokens.needs_authorization().await == Decision::RefreshRequired {
                match state.tokens.refresh().await {
                    Ok(_) => tracing::info!(operation = "refresh_token", "access token refreshed"),
                    Err(err) => {
                        tracing::error!(operation = "refresh_token", status = err.status(), error = %err, "token refresh failed");
                    }
                }
            } else {
                tracing::debug!(operation = "auth_callback", "callback without code ignored");
            }
        }
    }

    found(&state.config.landing_url)
}

#[cfg(test)]
mod tests {
    use tower::ServiceExt;

    use super::*;

    async fn read_body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_handle_panic_returns_500_with_fixed_body() {
        let response = handle_panic(Box::new("boom"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_body(response).await, "Something bad happened!");
    }

    #[tokio::test]
    async fn test_panicking_handler_is_caught_by_layers() {
        async fn boom() {
            panic!("handler blew up");
        }

        let router: Router = Router::new()
            .route("/boom", get(boom))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(handle_panic));

        let request =
            axum::http::Request::builder().uri("/boom").body(axum::body::Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_body(response).await, "Something bad happened!");
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        let peer = SocketAddr::from(([127, 0, 0, 1], 4000));

        assert_eq!(client_ip(&headers, peer), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer = SocketAddr::from(([192, 168, 1, 7], 4000));

        assert_eq!(client_ip(&headers, peer), "192.168.1.7");
    }

    #[test]
    fn test_client_ip_ignores_empty_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "".parse().unwrap());
        let peer = SocketAddr::from(([10, 1, 2, 3], 4000));

        assert_eq!(client_ip(&headers, peer), "10.1.2.3");
    }

    #[test]
    fn test_render_index_with_counter() {
        let data = IndexData { count: 42, db_path: "./visits.db".to_string() };
        let html = render_index(Some(&data));

        assert!(html.contains("Page view count: 42"));
        assert!(html.contains("SQLite at ./visits.db"));
        assert!(html.contains("href=\"/auth\""));
    }

    #[test]
    fn test_render_index_without_store() {
        let html = render_index(None);

        assert!(html.contains("Page counting is disabled."));
        assert!(html.contains("Welcome to RunHub"));
    }
}
