//! Mediakit HTTP API.
//!
//! Exposed as a library so integration tests can build the router against
//! in-memory components.

pub mod api_doc;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod task_impl;
pub mod telemetry;
