//! LytSpot submission outbox.
//!
//! Contact and budget form submissions that cannot reach the backend are kept
//! in a durable queue and retried when the backend answers a ping again. The
//! crate also carries the thin API those submissions are posted to.

pub mod config;
pub mod prober;
pub mod queue;
pub mod routes;
pub mod services;
pub mod state;
pub mod submitter;
pub mod transport;
