use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::session::{Preferences, SessionContext};
use crate::state::AppState;
use crate::utils::error::ApiError;

/// Preference update body. Accepts snake_case and the browser client's
/// camelCase keys. Absent fields take their defaults (the stored document is
/// replaced, never merged). `visits` is computed server-side and ignored.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PreferencesPayload {
    #[serde(alias = "sortOrder")]
    pub sort_order: String,
    #[serde(alias = "hiddenDevices")]
    pub hidden_devices: Vec<String>,
    #[serde(alias = "showVisibilityControls")]
    pub show_visibility_controls: bool,
    #[serde(alias = "pollingFrequency")]
    pub polling_frequency: f64,
}

impl Default for PreferencesPayload {
    fn default() -> Self {
        let defaults = Preferences::default();
        Self {
            sort_order: defaults.sort_order,
            hidden_devices: defaults.hidden_devices,
            show_visibility_controls: defaults.show_visibility_controls,
            polling_frequency: defaults.polling_frequency,
        }
    }
}

impl PreferencesPayload {
    pub fn into_preferences(self, visits: i64) -> Preferences {
        Preferences {
            sort_order: self.sort_order,
            hidden_devices: self.hidden_devices,
            visits,
            show_visibility_controls: self.show_visibility_controls,
            polling_frequency: self.polling_frequency,
        }
    }
}

/// GET /user-preferences
///
/// Returns the stored preferences and mints a short-lived stream token in the
/// configured response header.
pub async fn get_preferences(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Response, ApiError> {
    let token_settings = &state.settings.tokens;
    let token = state.tokens.create(&session.session_id, token_settings.ttl());

    let header_name = HeaderName::from_bytes(token_settings.header_name.as_bytes())
        .map_err(|e| ApiError::InternalError(format!("invalid token header name: {}", e)))?;
    let header_value = HeaderValue::from_str(&token)
        .map_err(|e| ApiError::InternalError(format!("invalid token value: {}", e)))?;

    debug!("Issued stream token with preferences");

    let mut response = Json(session.preferences).into_response();
    response.headers_mut().insert(header_name, header_value);
    Ok(response)
}

/// POST /user-preferences
///
/// A body that does not decode is rejected before anything is written.
pub async fn update_preferences(
    State(state): State<AppState>,
    session: SessionContext,
    payload: Result<Json<PreferencesPayload>, JsonRejection>,
) -> Result<Json<Preferences>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let visits = session.preferences.visits + 1;
    let preferences = payload.into_preferences(visits);

    let updated = state
        .sessions
        .update_session(&session.session_id, preferences)
        .await
        .map_err(|e| ApiError::StoreFailure(format!("Failed to update session: {}", e)))?
        .ok_or_else(|| ApiError::NotFound("session no longer exists".to_string()))?;

    info!(visits = updated.visits, "Preferences updated");
    Ok(Json(updated))
}
