//! HTTP routes exposing the browser session manager.
//!
//! The manager assumes a single cooperative caller, so the shared state holds
//! it behind an async mutex; handlers lock it for the duration of each call.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tabpilot_core::{BrowserError, BrowserSessionManager, TabpilotError};
use tokio::sync::Mutex;
use tracing::error;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<BrowserSessionManager>>,
    /// Budget for waiting on page loads after navigation.
    pub load_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/browser/status", get(status))
        .route("/api/browser/session", post(ensure_session))
        .route("/api/browser/navigate", post(navigate))
        .route("/api/browser/content", get(content))
        .route("/api/browser/cleanup", post(cleanup))
        .with_state(state)
}

fn error_response(err: TabpilotError) -> Response {
    let status = match &err {
        TabpilotError::Browser(BrowserError::AcquisitionFailed { .. }) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!(error = %err, "request failed");
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct StatusBody {
    page_ready: bool,
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let session = state.session.lock().await;
    Json(StatusBody {
        page_ready: session.is_page_ready(),
    })
}

async fn ensure_session(State(state): State<AppState>) -> Response {
    let mut session = state.session.lock().await;
    match session.ensure_session().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err.into()),
    }
}

#[derive(Deserialize)]
struct NavigateBody {
    url: String,
}

#[derive(Serialize)]
struct NavigateResponse {
    loaded: bool,
}

async fn navigate(State(state): State<AppState>, Json(body): Json<NavigateBody>) -> Response {
    let mut session = state.session.lock().await;
    if let Err(err) = session.navigate(&body.url).await {
        return error_response(err.into());
    }
    match session.wait_for_page_load(state.load_timeout).await {
        Ok(loaded) => Json(NavigateResponse { loaded }).into_response(),
        Err(err) => error_response(err.into()),
    }
}

#[derive(Serialize)]
struct ContentResponse {
    content: String,
}

async fn content(State(state): State<AppState>) -> Response {
    let mut session = state.session.lock().await;
    match session.page_markdown().await {
        Ok(content) => Json(ContentResponse { content }).into_response(),
        Err(err) => error_response(err),
    }
}

async fn cleanup(State(state): State<AppState>) -> StatusCode {
    let mut session = state.session.lock().await;
    session.cleanup().await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tabpilot_core::browser::{MockBrowserState, MockConnection, MockDriverLauncher};
    use tabpilot_core::config::BrowserConfig;
    use tower::ServiceExt;

    fn make_app(state: Arc<MockBrowserState>) -> Router {
        let manager = BrowserSessionManager::new(
            BrowserConfig::default(),
            MockDriverLauncher::new(state),
            None,
        );
        router(AppState {
            session: Arc::new(Mutex::new(manager)),
            load_timeout: Duration::from_secs(15),
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let (connection, _context, _page) = MockConnection::with_single_page("about:blank");
        let app = make_app(MockBrowserState::new(connection));

        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_reports_page_ready_lifecycle() {
        let (connection, _context, _page) = MockConnection::with_single_page("about:blank");
        let app = make_app(MockBrowserState::new(connection));

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/browser/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["page_ready"], false);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/browser/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::get("/api/browser/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["page_ready"], true);
    }

    #[tokio::test]
    async fn test_session_failure_maps_to_bad_gateway() {
        let (connection, _context, _page) = MockConnection::with_single_page("about:blank");
        let state = MockBrowserState::new(connection);
        state.fail_next_connects(u32::MAX);
        // Zero out backoff so the retries do not stall the test clock.
        let manager = BrowserSessionManager::new(
            BrowserConfig {
                initial_backoff_secs: 0,
                ..Default::default()
            },
            MockDriverLauncher::new(state),
            None,
        );
        let app = router(AppState {
            session: Arc::new(Mutex::new(manager)),
            load_timeout: Duration::from_secs(15),
        });

        let response = app
            .oneshot(
                Request::post("/api/browser/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_navigate_returns_loaded_flag() {
        let (connection, _context, page) = MockConnection::with_single_page("about:blank");
        page.set_load_complete(true);
        let app = make_app(MockBrowserState::new(connection));

        let response = app
            .oneshot(
                Request::post("/api/browser/navigate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"url":"https://example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["loaded"], true);
        assert_eq!(*page.url.lock().unwrap(), "https://example.com");
    }

    #[tokio::test]
    async fn test_content_returns_page_content() {
        let (connection, _context, page) = MockConnection::with_single_page("about:blank");
        *page.content.lock().unwrap() = "<html>hello</html>".to_string();
        let app = make_app(MockBrowserState::new(connection));

        let response = app
            .oneshot(
                Request::get("/api/browser/content")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["content"], "<html>hello</html>");
    }

    #[tokio::test]
    async fn test_cleanup_always_succeeds() {
        let (connection, _context, _page) = MockConnection::with_single_page("about:blank");
        let app = make_app(MockBrowserState::new(connection));

        let response = app
            .oneshot(
                Request::post("/api/browser/cleanup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
