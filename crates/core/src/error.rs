//! The error taxonomy shared by every subsystem.
//!
//! Request handlers map each variant to an HTTP status; background loops log
//! and continue instead of propagating. `TransientDeliveryError` never
//! reaches a handler — it only ever drives the dispatcher's backoff loop.

use thiserror::Error;

/// Result type used across the domain layer.
pub type Result<T> = std::result::Result<T, CommandCenterError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandCenterError {
    /// Malformed input, unknown event_type, or a missing required field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A rule, delivery, or event id did not resolve to a row.
    #[error("not found")]
    NotFound,

    /// Caller's resolved role does not permit the requested action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The backing database failed. Logged; never silently swallowed on ingestion.
    #[error("storage error: {0}")]
    Storage(String),

    /// Webhook non-2xx, timeout, or transport error. Internal only; drives backoff.
    #[error("transient delivery error: {0}")]
    TransientDelivery(String),

    /// Database inaccessible or schema migration failed at startup.
    #[error("fatal startup error: {0}")]
    FatalStartup(String),
}

impl CommandCenterError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn transient_delivery(msg: impl Into<String>) -> Self {
        Self::TransientDelivery(msg.into())
    }

    pub fn fatal_startup(msg: impl Into<String>) -> Self {
        Self::FatalStartup(msg.into())
    }

    /// Machine-readable code surfaced in error responses, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Storage(_) => "storage_error",
            Self::TransientDelivery(_) => "transient_delivery_error",
            Self::FatalStartup(_) => "fatal_startup_error",
        }
    }
}
