use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::TurnStart;
use shared::models::{OkResponse, SubmitMessageRequest};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::AppState;
use super::errors::{
    bad_request_response, internal_error_response, session_not_found_response,
    turn_in_progress_response,
};
use super::registry::{SharedSession, lock_session};

pub(super) async fn create_session(State(state): State<AppState>) -> Response {
    let session = state.sessions.create(state.services.clone());
    let snapshot = lock_session(&session).snapshot();
    info!(session_id = %snapshot.session_id, "chat session created");

    (StatusCode::CREATED, Json(snapshot)).into_response()
}

pub(super) async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = find_session(&state, &session_id) else {
        return session_not_found_response();
    };

    let snapshot = lock_session(&session).snapshot();
    (StatusCode::OK, Json(snapshot)).into_response()
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Ok(session_id) = Uuid::parse_str(&session_id) else {
        return session_not_found_response();
    };

    if !state.sessions.remove(session_id) {
        return session_not_found_response();
    }

    info!(session_id = %session_id, "chat session deleted");
    (StatusCode::OK, Json(OkResponse { ok: true })).into_response()
}

pub(super) async fn submit_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitMessageRequest>,
) -> Response {
    let Some(session) = find_session(&state, &session_id) else {
        return session_not_found_response();
    };

    if req.text.trim().is_empty() {
        return bad_request_response("empty_message", "Message text must not be blank");
    }

    let start = lock_session(&session).begin_turn(&req.text);
    let pending = match start {
        TurnStart::Started(pending) => pending,
        TurnStart::Busy => return turn_in_progress_response(),
        TurnStart::Ignored => {
            return bad_request_response("empty_message", "Message text must not be blank");
        }
    };

    // The turn runs detached so a dropped request still completes it. The
    // session lock is only taken again once the model call has returned.
    let turn = tokio::spawn(async move {
        let completed = pending.run().await;
        let mut session = lock_session(&session);
        let resolution = session.finish_turn(completed);
        debug!(session_id = %session.id(), ?resolution, "turn finished");
        session.snapshot()
    });

    match turn.await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(err) => {
            error!(error = %err, "chat turn task failed");
            internal_error_response()
        }
    }
}

pub(super) async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = find_session(&state, &session_id) else {
        return session_not_found_response();
    };

    let mut session = lock_session(&session);
    session.reset();
    (StatusCode::OK, Json(session.snapshot())).into_response()
}

pub(super) async fn reconnect_client(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = find_session(&state, &session_id) else {
        return session_not_found_response();
    };

    let mut session = lock_session(&session);
    session.reconnect_client();
    (StatusCode::OK, Json(session.snapshot())).into_response()
}

pub(super) async fn reload_reference(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = find_session(&state, &session_id) else {
        return session_not_found_response();
    };

    let mut session = lock_session(&session);
    session.reload_reference_document();
    (StatusCode::OK, Json(session.snapshot())).into_response()
}

fn find_session(state: &AppState, raw_session_id: &str) -> Option<SharedSession> {
    let session_id = Uuid::parse_str(raw_session_id).ok()?;
    state.sessions.get(session_id)
}
