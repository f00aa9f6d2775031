//! Error taxonomy shared by the store and memory crates.
//!
//! Each variant displays as the bare reason so the message can be placed
//! verbatim into the `errorMessage` field of a response envelope.

/// Errors surfaced by connection handling, request validation and storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Missing or invalid connection configuration, or no store for a node.
    #[error("{0}")]
    Configuration(String),
    /// Malformed request shape or missing required fields.
    #[error("{0}")]
    Validation(String),
    /// An item violates the required-field rules of its scope.
    #[error("{0}")]
    ScopeViolation(String),
    /// Insert or query failure reported by the underlying store.
    #[error("{0}")]
    Store(String),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn scope_violation(msg: impl Into<String>) -> Self {
        Self::ScopeViolation(msg.into())
    }

    /// Wrap any displayable backend error as a store error.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }

    /// Short machine-friendly name of the variant, used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::ScopeViolation(_) => "scope_violation",
            Self::Store(_) => "store",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
