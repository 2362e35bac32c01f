//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the inbox of accepted submissions.

use std::sync::Arc;

use crate::services::inbox::Inbox;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub inbox: Arc<Inbox>,
}

impl AppState {
    #[must_use]
    pub fn new(inbox_capacity: usize) -> Self {
        Self { inbox: Arc::new(Inbox::new(inbox_capacity)) }
    }
}
