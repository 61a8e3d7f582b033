//! Mediakit Core Library
//!
//! This crate provides the domain models, error types, configuration, and the
//! conversion-task seam shared across all Mediakit components.

pub mod config;
pub mod error;
pub mod models;
pub mod task;
pub mod wire;

// Re-export commonly used types
pub use config::{resolve_storage_root, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use task::{ConversionTask, TaskError, TaskOutput};
