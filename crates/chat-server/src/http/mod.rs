use axum::Router;
use axum::routing::{get, post};
use shared::SessionServices;

mod errors;
mod health;
mod registry;
mod sessions;

pub use registry::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionRegistry,
    pub services: SessionServices,
}

impl AppState {
    pub fn new(services: SessionServices) -> Self {
        Self {
            sessions: SessionRegistry::default(),
            services,
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/sessions", post(sessions::create_session))
        .route(
            "/v1/sessions/{session_id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route(
            "/v1/sessions/{session_id}/messages",
            post(sessions::submit_message),
        )
        .route(
            "/v1/sessions/{session_id}/reset",
            post(sessions::reset_session),
        )
        .route(
            "/v1/sessions/{session_id}/reconnect",
            post(sessions::reconnect_client),
        )
        .route(
            "/v1/sessions/{session_id}/reference/reload",
            post(sessions::reload_reference),
        )
        .with_state(app_state)
}
