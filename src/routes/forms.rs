//! Form submission and liveness routes.
//!
//! `POST /api/contact` and `POST /api/budget` accept any non-empty JSON
//! object. Clients may send an `Idempotency-Key` header (UUID); a repeat of
//! a known key is acknowledged with 200 instead of 201 and not stored again.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::queue::{MessageKind, Payload};
use crate::services::inbox::Acceptance;
use crate::state::AppState;
use crate::transport::IDEMPOTENCY_KEY_HEADER;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "status": "error", "message": message.into() })))
}

/// `GET /api/ping`: liveness signal for the prober.
pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /api/contact`
pub async fn contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    receive(&state, MessageKind::Contact, &headers, body)
}

/// `POST /api/budget`
pub async fn budget(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    receive(&state, MessageKind::Budget, &headers, body)
}

fn receive(
    state: &AppState,
    kind: MessageKind,
    headers: &HeaderMap,
    body: Result<Json<Payload>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) = body.map_err(|rejection| api_error(rejection.status(), rejection.body_text()))?;
    if payload.is_empty() {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "submission has no fields"));
    }
    let key = idempotency_key(headers)?;

    Ok(match state.inbox.accept(kind, key, payload) {
        Acceptance::Accepted(id) => (StatusCode::CREATED, Json(json!({ "status": "received", "id": id }))),
        Acceptance::Duplicate(id) => (StatusCode::OK, Json(json!({ "status": "duplicate", "id": id }))),
    })
}

/// Parse the optional `Idempotency-Key` header.
pub(crate) fn idempotency_key(headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
    let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    raw.to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(Some)
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Idempotency-Key must be a UUID"))
}

#[cfg(test)]
#[path = "forms_test.rs"]
mod tests;
