//! Reconciliation error types.

use thiserror::Error;

use crate::facade::TransportMeta;
use crate::resource::{Lifecycle, ResourceKind};

fn status_suffix(meta: &Option<TransportMeta>) -> String {
    meta.as_ref()
        .map(|m| format!(" (status {})", m.status))
        .unwrap_or_default()
}

/// Failure reported by the remote client facade.
#[derive(Debug, Clone, Error)]
#[error("{message}{}", status_suffix(.meta))]
pub struct ApiError {
    pub message: String,
    /// Absent only when no response was received at all (connection refused, DNS, TLS).
    pub meta: Option<TransportMeta>,
    /// The call succeeded but its body could not be decoded.
    pub undecodable: bool,
}

impl ApiError {
    pub fn new(message: impl Into<String>, meta: TransportMeta) -> Self {
        Self {
            message: message.into(),
            meta: Some(meta),
            undecodable: false,
        }
    }

    pub fn without_response(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            meta: None,
            undecodable: false,
        }
    }

    /// A successful response whose body is not what the facade can decode.
    pub fn undecodable(message: impl Into<String>, meta: TransportMeta) -> Self {
        Self {
            undecodable: true,
            ..Self::new(message, meta)
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.meta.as_ref().map(|m| m.status)
    }

    pub fn is_not_found(&self) -> bool {
        !self.undecodable && self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        !self.undecodable && matches!(self.status(), Some(409) | Some(412))
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// Declared configuration failed local validation. Never reaches the network.
    #[error("invalid {kind} configuration: {message}")]
    Validation { kind: ResourceKind, message: String },

    /// A referenced resource has no local identifier yet. Never reaches the network.
    #[error("{kind} field '{field}' depends on {target} which has no resolved identifier")]
    DependencyUnresolved {
        kind: ResourceKind,
        field: String,
        target: String,
    },

    /// Remote call failed for a reason other than not-found or conflict.
    #[error("remote call failed: {0}")]
    Transport(ApiError),

    /// Remote response could not be represented as a field mapping.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Remote object changed concurrently.
    #[error("conflict: {0}")]
    Conflict(ApiError),

    /// Remote object does not exist.
    #[error("not found: {0}")]
    NotFound(ApiError),

    /// Caller cancelled the call or its deadline passed.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Remote object did not settle within the polling budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An operation tried to move a resource through an illegal lifecycle step.
    #[error("{kind} cannot move from {from} to {to}")]
    InvalidTransition {
        kind: ResourceKind,
        from: Lifecycle,
        to: Lifecycle,
    },
}

impl ReconcileError {
    pub fn validation(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Errors raised before any remote call was attempted.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::DependencyUnresolved { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The facade error behind a remote failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Transport(e) | Self::Conflict(e) | Self::NotFound(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiError> for ReconcileError {
    fn from(err: ApiError) -> Self {
        if err.undecodable {
            let body = err
                .meta
                .as_ref()
                .and_then(|m| m.read_body().ok())
                .unwrap_or_default();
            Self::MalformedResponse(format!("{}: {}", err, body.trim_end()))
        } else if err.is_not_found() {
            Self::NotFound(err)
        } else if err.is_conflict() {
            Self::Conflict(err)
        } else {
            Self::Transport(err)
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
