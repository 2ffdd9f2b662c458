use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

use super::cookie::{is_encrypted, read_cookie, session_cookie};
use super::models::{Preferences, Session};
use super::store::SessionError;
use crate::state::AppState;
use crate::utils::error::ApiError;

/// Identity resolved from the session cookie, attached once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub session_id: String,
    pub preferences: Preferences,
}

impl From<Session> for SessionContext {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.session_id,
            preferences: session.preferences,
        }
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| ApiError::InternalError("session middleware not installed".to_string()))
    }
}

/// Cookie gate for preference routes.
///
/// Any request leaves with a live session: a missing, unknown or expired
/// cookie silently gets a fresh session and a new `Set-Cookie`. Only a store
/// that cannot create sessions turns into an error response.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let cookie_name = state.settings.session.cookie_name.clone();
    let secure = is_encrypted(request.uri(), request.headers());

    let (context, issued) = match read_cookie(request.headers(), &cookie_name) {
        None => {
            info!("No session cookie, creating new session");
            (issue_session(&state).await?, true)
        }
        Some(session_id) => match state.sessions.get_session(&session_id).await {
            Ok(session) => {
                debug!("Session exists and is valid");
                (SessionContext::from(session), false)
            }
            Err(e) => {
                log_reissue(&e);
                (issue_session(&state).await?, true)
            }
        },
    };

    let session_id = context.session_id.clone();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;

    if issued {
        let max_age = state.settings.session.ttl().num_seconds();
        let cookie = session_cookie(&cookie_name, &session_id, max_age, secure)
            .map_err(|e| ApiError::InternalError(format!("invalid session cookie: {}", e)))?;
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    Ok(response)
}

async fn issue_session(state: &AppState) -> Result<SessionContext, ApiError> {
    let session_id = state.sessions.create_session().await.map_err(|e| {
        ApiError::StoreFailure(format!("Failed to create session: {}", e))
    })?;

    let session = state.sessions.get_session(&session_id).await.map_err(|e| {
        ApiError::StoreFailure(format!("Failed to get session details: {}", e))
    })?;

    Ok(SessionContext::from(session))
}

fn log_reissue(err: &SessionError) {
    match err {
        SessionError::NotFound | SessionError::Expired => {
            info!(reason = err.reason(), "Re-issuing session");
        }
        _ => {
            warn!(reason = err.reason(), error = %err, "Re-issuing session");
        }
    }
}
