use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use std::sync::Arc;
use std::time::Duration;

use super::{body_json, read_frame, send};
use crate::build_router;
use crate::config::Settings;
use crate::models::DeviceListResponse;
use crate::services::MockDeviceFeed;
use crate::session::{MemorySessionStore, Preferences, Session, SessionError, SessionStore};
use crate::state::AppState;
use crate::tokens::TokenManager;

const COOKIE: &str = "anonymous_session";

fn idle_feed() -> MockDeviceFeed {
    let mut feed = MockDeviceFeed::new();
    feed.expect_fetch_devices()
        .returning(|| Ok(DeviceListResponse::default()));
    feed
}

fn app_state(store: Arc<dyn SessionStore>) -> AppState {
    AppState::new(Settings::default(), store, TokenManager::new(), Arc::new(idle_feed()))
}

fn memory_state() -> (AppState, MemorySessionStore) {
    let store = MemorySessionStore::new(chrono::Duration::hours(72));
    (app_state(Arc::new(store.clone())), store)
}

fn get_prefs(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri("/user-preferences");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_prefs(cookie: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/user-preferences")
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// `name=value` part of the response's session cookie.
fn issued_cookie(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn session_id_of(cookie: &str) -> String {
    cookie
        .strip_prefix(&format!("{}=", COOKIE))
        .expect("session cookie")
        .to_string()
}

#[tokio::test]
async fn test_first_visit_issues_cookie_token_and_defaults() {
    let (state, store) = memory_state();
    let app = build_router(state.clone());

    let response = send(app, get_prefs(None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=259200"));
    assert!(!set_cookie.contains("Secure"));

    let token = response.headers()["authorization"].to_str().unwrap().to_string();
    let session_id = session_id_of(&issued_cookie(&response).unwrap());
    assert_ne!(token, session_id);
    assert_eq!(state.tokens.get(&token).unwrap().session_id, session_id);

    let body = body_json(response).await;
    let prefs: Preferences = serde_json::from_value(body).unwrap();
    assert_eq!(prefs, Preferences::default());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_update_then_read_back() {
    let (state, _) = memory_state();

    let first = send(build_router(state.clone()), get_prefs(None)).await;
    let cookie = issued_cookie(&first).unwrap();

    let response = send(
        build_router(state.clone()),
        post_prefs(&cookie, r#"{"sort_order":"az","polling_frequency":10}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let updated = body_json(response).await;
    assert_eq!(updated["visits"], 1);
    assert_eq!(updated["polling_frequency"], 10.0);
    assert_eq!(updated["sort_order"], "az");

    let again = send(build_router(state.clone()), get_prefs(Some(&cookie))).await;
    assert!(again.headers().get(header::SET_COOKIE).is_none());
    let prefs = body_json(again).await;
    assert_eq!(prefs["visits"], 1);
    assert_eq!(prefs["polling_frequency"], 10.0);
    assert_eq!(prefs["sort_order"], "az");
}

#[tokio::test]
async fn test_visits_count_up_server_side() {
    let (state, _) = memory_state();
    let first = send(build_router(state.clone()), get_prefs(None)).await;
    let cookie = issued_cookie(&first).unwrap();

    for expected in 1..=3 {
        let response = send(
            build_router(state.clone()),
            post_prefs(&cookie, r#"{"sortOrder":"status_most_active_first","visits":1000}"#),
        )
        .await;
        assert_eq!(body_json(response).await["visits"], expected);
    }
}

#[tokio::test]
async fn test_malformed_update_is_rejected_without_writing() {
    let (state, store) = memory_state();
    let first = send(build_router(state.clone()), get_prefs(None)).await;
    let cookie = issued_cookie(&first).unwrap();
    let session_id = session_id_of(&cookie);
    let before = store.get_session(&session_id).await.unwrap();

    for body in [r#"{"sort_order": "#, r#"{"polling_frequency":"soon"}"#, "not json"] {
        let response = send(build_router(state.clone()), post_prefs(&cookie, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let after = store.get_session(&session_id).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_unknown_cookie_is_silently_replaced() {
    let (state, store) = memory_state();

    let response = send(
        build_router(state),
        get_prefs(Some("anonymous_session=forged-or-purged")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = issued_cookie(&response).unwrap();
    let session_id = session_id_of(&cookie);
    assert_ne!(session_id, "forged-or-purged");
    assert!(store.get_session(&session_id).await.is_ok());
}

#[tokio::test]
async fn test_expired_cookie_is_replaced_and_old_record_removed() {
    let (state, store) = memory_state();
    let mut old = Session::new("stale-session".into(), chrono::Duration::hours(72));
    old.expires_at = chrono::Utc::now() - chrono::Duration::minutes(1);
    store.insert(old).unwrap();

    let response = send(
        build_router(state),
        get_prefs(Some("anonymous_session=stale-session")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let session_id = session_id_of(&issued_cookie(&response).unwrap());
    assert_ne!(session_id, "stale-session");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_secure_cookie_behind_tls_proxy() {
    let (state, _) = memory_state();
    let request = Request::builder()
        .uri("/user-preferences")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();

    let response = send(build_router(state), request).await;
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.ends_with("; Secure"));
}

struct UnavailableStore;

#[async_trait]
impl SessionStore for UnavailableStore {
    async fn create_session(&self) -> Result<String, SessionError> {
        Err(SessionError::Unavailable("connection refused".into()))
    }

    async fn get_session(&self, _session_id: &str) -> Result<Session, SessionError> {
        Err(SessionError::Timeout)
    }

    async fn update_session(
        &self,
        _session_id: &str,
        _preferences: Preferences,
    ) -> Result<Option<Preferences>, SessionError> {
        Err(SessionError::Timeout)
    }

    async fn delete_session(&self, _session_id: &str) -> Result<(), SessionError> {
        Err(SessionError::Timeout)
    }

    async fn purge_expired(&self) -> Result<u64, SessionError> {
        Err(SessionError::Timeout)
    }
}

#[tokio::test]
async fn test_store_outage_is_internal_error() {
    let state = app_state(Arc::new(UnavailableStore));

    let response = send(
        build_router(state.clone()),
        get_prefs(Some("anonymous_session=whatever")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(state.tokens.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_token_from_preferences_opens_stream() {
    let (state, _) = memory_state();

    let first = send(build_router(state.clone()), get_prefs(None)).await;
    let cookie = issued_cookie(&first).unwrap();
    send(
        build_router(state.clone()),
        post_prefs(&cookie, r#"{"polling_frequency":1}"#),
    )
    .await;

    // Tokens come from a preferences read; the cookie alone opens nothing.
    let refreshed = send(build_router(state.clone()), get_prefs(Some(&cookie))).await;
    let token = refreshed.headers()["authorization"].to_str().unwrap().to_string();

    let no_token = Request::builder()
        .uri("/")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        send(build_router(state.clone()), no_token).await.status(),
        StatusCode::BAD_REQUEST
    );

    let request = Request::builder()
        .uri(format!("/?slt={}", token))
        .body(Body::empty())
        .unwrap();
    let response = send(build_router(state.clone()), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let start = tokio::time::Instant::now();
    let mut body = response.into_body().into_data_stream();
    assert_eq!(read_frame(&mut body).await, "data: {\"result_list\":[]}\n\n");
    read_frame(&mut body).await;
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(state.streams.active(), 1);

    drop(body);
    assert_eq!(state.streams.active(), 0);
}

#[tokio::test]
async fn test_health_reports_counters() {
    let (state, _) = memory_state();
    state.tokens.create("s", Duration::from_secs(30));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = send(build_router(state), request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["live_tokens"], 1);
    assert_eq!(body["active_streams"], 0);
}
