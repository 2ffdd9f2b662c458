use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::services::DeviceFeed;
use crate::session::models::whole_seconds;
use crate::state::{AppState, StreamGuard};
use crate::utils::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Short-lived token from `GET /user-preferences`.
    pub slt: Option<String>,
}

/// GET /?slt=<token>
///
/// Authenticates with a capability token (never the cookie), then emits one
/// device frame immediately and one per polling interval until the client
/// goes away. A failed fetch produces an `error` frame and the next tick
/// tries again.
pub async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let key = query
        .slt
        .filter(|slt| !slt.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing slt".to_string()))?;

    let token = state
        .tokens
        .get(&key)
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".to_string()))?;

    if token.session_id.is_empty() {
        return Err(ApiError::Unauthorized("token has no session".to_string()));
    }

    let period = resolve_polling_interval(&state, &token.session_id).await;
    let connection = StreamConnection::open(&state, period);
    let feed = state.feed.clone();

    let stream = async_stream::stream! {
        let _connection = connection;

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            yield Ok(device_frame(&feed).await);
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Polling period for the token's session. A session that cannot be read
/// (gone, expired, store down) streams at the default rate instead of failing.
async fn resolve_polling_interval(state: &AppState, session_id: &str) -> Duration {
    let default_seconds = state.settings.stream.default_polling_seconds;

    match state.sessions.get_session(session_id).await {
        Ok(session) => session.preferences.polling_interval(default_seconds),
        Err(e) => {
            if e.is_absent() {
                debug!(reason = e.reason(), "Streaming with default polling interval");
            } else {
                warn!(error = %e, "Session lookup failed, streaming with default polling interval");
            }
            whole_seconds(default_seconds)
        }
    }
}

async fn device_frame(feed: &Arc<dyn DeviceFeed>) -> Event {
    match feed.fetch_devices().await {
        Ok(devices) => Event::default().json_data(&devices).unwrap_or_else(|e| {
            error_frame(&ApiError::InternalError(format!("Error encoding devices: {}", e)))
        }),
        Err(e) => {
            warn!("Device fetch failed: {}", e);
            error_frame(&ApiError::from(e))
        }
    }
}

fn error_frame(err: &ApiError) -> Event {
    Event::default()
        .event("error")
        .data(serde_json::to_string(&err.to_body()).unwrap_or_else(|_| "{}".to_string()))
}

/// Per-connection resources. Dropping it is the stream's `Closed` state.
struct StreamConnection {
    _guard: StreamGuard,
    period: Duration,
}

impl StreamConnection {
    fn open(state: &AppState, period: Duration) -> Self {
        let guard = state.streams.open();
        info!(
            interval_secs = period.as_secs(),
            active = state.streams.active(),
            "Event stream opened"
        );
        Self {
            _guard: guard,
            period,
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        info!(interval_secs = self.period.as_secs(), "Client disconnected, event stream closed");
    }
}
