//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The website is static and hosted elsewhere, so this router only serves
//! the JSON API the forms and the prober talk to. CORS is open because the
//! browser calls it cross-origin.

pub mod forms;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// API routes with CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ping", get(forms::ping))
        .route("/api/contact", post(forms::contact))
        .route("/api/budget", post(forms::budget))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
