//! Transport: the network seam between the queue and the backend API.
//!
//! DESIGN
//! ======
//! `Transport` is an async trait so the queue, prober and submitter can be
//! driven by a mock in tests. `HttpTransport` is the real implementation:
//! `POST {base}/api/{contact,budget}` with the payload as JSON body and the
//! submission id as `Idempotency-Key`, plus `GET {base}/api/ping`.
//! Any 2xx is success; everything else is a `DeliveryError`.

use std::time::Duration;

use uuid::Uuid;

use crate::config::LytspotConfig;
use crate::queue::{MessageKind, Payload};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
pub const PING_PATH: &str = "/api/ping";

/// Response bodies longer than this are cut before landing in an error.
const MAX_ERROR_BODY_CHARS: usize = 512;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered with a non-2xx status.
    #[error("backend responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl DeliveryError {
    /// Whether trying again later has a chance of succeeding.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 408 | 429 | 500..=599, .. })
    }
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one submission to the endpoint for `kind`.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] on network failure or a non-2xx response.
    async fn deliver(&self, id: Uuid, kind: MessageKind, payload: &Payload) -> Result<(), DeliveryError>;

    /// Liveness check against the backend.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] if the backend is unreachable or unhealthy.
    async fn ping(&self) -> Result<(), DeliveryError>;
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for `base_url` (trailing slashes are ignored).
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::HttpClientBuild`] if the client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| DeliveryError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// Build a transport from the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::HttpClientBuild`] if the client cannot be built.
    pub fn from_config(config: &LytspotConfig) -> Result<Self, DeliveryError> {
        Self::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, id: Uuid, kind: MessageKind, payload: &Payload) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.url(kind.endpoint()))
            .header(IDEMPOTENCY_KEY_HEADER, id.to_string())
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        check_status(response).await
    }

    async fn ping(&self) -> Result<(), DeliveryError> {
        let response = self
            .http
            .get(self.url(PING_PATH))
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    // EDGE: the body is diagnostic only; an unreadable body still reports the status.
    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::Status { status: status.as_u16(), body: truncate_body(&body) })
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// One recorded `deliver` call.
    #[derive(Debug, Clone)]
    pub struct Attempt {
        pub id: Uuid,
        pub kind: MessageKind,
        pub payload: Payload,
    }

    impl Attempt {
        /// The payload's `name` field, for compact ordering assertions.
        pub fn name(&self) -> &str {
            self.payload.get("name").and_then(|v| v.as_str()).unwrap_or_default()
        }
    }

    /// Scriptable transport: records every call, fails selected kinds or
    /// names, optionally sleeps inside `deliver`.
    pub struct MockTransport {
        attempts: Mutex<Vec<Attempt>>,
        failing_kinds: Mutex<HashSet<MessageKind>>,
        failing_names: Mutex<HashSet<String>>,
        ping_ok: AtomicBool,
        pings: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
                failing_kinds: Mutex::new(HashSet::new()),
                failing_names: Mutex::new(HashSet::new()),
                ping_ok: AtomicBool::new(true),
                pings: AtomicUsize::new(0),
                delay: None,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn fail_kind(&self, kind: MessageKind) {
            self.failing_kinds.lock().unwrap().insert(kind);
        }

        pub fn fail_name(&self, name: &str) {
            self.failing_names.lock().unwrap().insert(name.to_owned());
        }

        pub fn recover(&self) {
            self.failing_kinds.lock().unwrap().clear();
            self.failing_names.lock().unwrap().clear();
        }

        pub fn set_ping_ok(&self, ok: bool) {
            self.ping_ok.store(ok, Ordering::SeqCst);
        }

        pub fn attempts(&self) -> Vec<Attempt> {
            self.attempts.lock().unwrap().clone()
        }

        pub fn attempted_names(&self) -> Vec<String> {
            self.attempts().iter().map(|a| a.name().to_owned()).collect()
        }

        pub fn ping_count(&self) -> usize {
            self.pings.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn deliver(&self, id: Uuid, kind: MessageKind, payload: &Payload) -> Result<(), DeliveryError> {
            let attempt = Attempt { id, kind, payload: payload.clone() };
            let fails = self.failing_kinds.lock().unwrap().contains(&kind)
                || self.failing_names.lock().unwrap().contains(attempt.name());
            self.attempts.lock().unwrap().push(attempt);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if fails {
                Err(DeliveryError::Status { status: 503, body: "unavailable".into() })
            } else {
                Ok(())
            }
        }

        async fn ping(&self) -> Result<(), DeliveryError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.ping_ok.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(DeliveryError::Request("connection refused".into()))
            }
        }
    }

    /// Payload with a single `name` field.
    pub fn named(name: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("name".into(), serde_json::json!(name));
        payload
    }
}
