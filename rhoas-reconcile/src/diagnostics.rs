//! Diagnostics and the translation of errors into them.

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ReconcileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A structured, user-facing report of one reconciliation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    /// Declaration the diagnostic is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            address: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            address: None,
        }
    }

    pub fn at(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Every diagnostic produced by an operation or a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    /// A non-empty error list means the operation failed, whatever data came back.
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Translate an error into an Error-severity diagnostic.
///
/// Local errors never consult transport metadata. Remote errors carry the
/// server's raw body in the detail; an unreadable body is reported as a
/// failure of its own.
pub fn translate(err: &ReconcileError) -> Diagnostic {
    match err {
        ReconcileError::Validation { .. } => {
            Diagnostic::error("invalid configuration", err.to_string())
        }
        ReconcileError::DependencyUnresolved { .. } => {
            Diagnostic::error("unresolved dependency", err.to_string())
        }
        ReconcileError::MalformedResponse(_) => {
            Diagnostic::error("malformed remote response", err.to_string())
        }
        ReconcileError::Cancelled(_) => Diagnostic::error("operation cancelled", err.to_string()),
        ReconcileError::Timeout(_) => Diagnostic::error("operation timed out", err.to_string()),
        ReconcileError::InvalidTransition { .. } => {
            Diagnostic::error("invalid lifecycle transition", err.to_string())
        }
        ReconcileError::Conflict(api) => translate_api("remote object changed concurrently", api),
        ReconcileError::NotFound(api) => translate_api("remote object not found", api),
        ReconcileError::Transport(api) => translate_api("remote call failed", api),
    }
}

fn translate_api(summary: &str, api: &ApiError) -> Diagnostic {
    let Some(meta) = &api.meta else {
        return Diagnostic::error(summary, api.message.clone());
    };

    match meta.read_body() {
        Ok(body) if body.trim().is_empty() => {
            Diagnostic::error(summary, format!("{} (status {})", api.message, meta.status))
        }
        Ok(body) => Diagnostic::error(
            summary,
            format!("{} (status {}): {}", api.message, meta.status, body.trim_end()),
        ),
        Err(read_err) => Diagnostic::error(
            "failed to read remote response",
            format!("{} (status {}): {}", api.message, meta.status, read_err),
        ),
    }
}
