//! Error types
//!
//! Errors fall into three groups: precondition violations raised before any
//! remote call, failures reported by the remote control plane, and polling
//! that ran out of attempts or time.

use crate::gcp::types::BackendServiceProtocol;
use crate::resource::ResourceKind;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while managing Traffic Director resources
#[derive(Error, Debug)]
pub enum TdError {
    /// Create called while the registry already tracks the resource
    #[error("{kind} \"{name}\" already created, delete it first")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// An upstream resource required by this step was never created or loaded
    #[error("cannot create {kind}: {required} is not created")]
    MissingDependency {
        kind: ResourceKind,
        required: ResourceKind,
    },

    /// An operation on a tracked resource found nothing tracked
    #[error("{0} is not created")]
    NotCreated(ResourceKind),

    /// The backend service protocol cannot be paired with a target proxy
    #[error("unexpected backend service protocol {0} for a target proxy")]
    UnsupportedProtocol(BackendServiceProtocol),

    /// Caller passed arguments that can never succeed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote resource does not exist (HTTP 404)
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    /// Non-success response from a GCP API
    #[error("API request failed: {status} {message}")]
    Api { status: u16, message: String },

    /// A long-running operation finished with an error
    #[error("operation {operation} failed: {message}")]
    Operation { operation: String, message: String },

    /// Random sampling ran out of attempts
    #[error("couldn't find {what} after {attempts} attempts")]
    ExhaustedAttempts { what: String, attempts: u32 },

    /// A polled condition never became true
    #[error("timed out after {elapsed:?} waiting for {condition}")]
    Timeout { condition: String, elapsed: Duration },

    /// Backends never reported healthy
    #[error("backend service {service} has unhealthy backends: {}", .backends.join(", "))]
    Unhealthy {
        service: String,
        backends: Vec<String>,
    },

    /// Best-effort cleanup could not delete some resources
    #[error("cleanup failed for {}", .failures.join("; "))]
    PartialCleanup { failures: Vec<String> },

    /// Transport, parsing and other context-carrying failures
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TdError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TdError::NotFound { .. })
    }
}

pub type Result<T, E = TdError> = std::result::Result<T, E>;
