use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::warn;

use crate::config::Settings;
use crate::handlers;
use crate::session::session_middleware;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Cookie-authenticated routes
    let preference_routes = Router::new()
        .route(
            "/user-preferences",
            get(handlers::preferences::get_preferences).post(handlers::preferences::update_preferences),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    // Token-authenticated and public routes
    let public_routes = Router::new()
        .route("/", get(handlers::events::events_handler))
        .route("/health", get(handlers::health::health_check));

    let cors = cors_layer(&state.settings);

    Router::new()
        .merge(preference_routes)
        .merge(public_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let mut layer = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderName::from_bytes(settings.tokens.header_name.as_bytes()) {
        Ok(token_header) => layer = layer.expose_headers([token_header]),
        Err(_) => warn!("Token header name is not a valid header: {}", settings.tokens.header_name),
    }

    layer
}
