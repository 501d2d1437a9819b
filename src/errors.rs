//! Central error taxonomy for the resolver
//!
//! Expected outcomes (not a memecoin, still indexing, transport hiccups) are
//! returned as values by the resolver. What lives here are the failures:
//! decode mismatches against the contract interface, rejected launch plans,
//! bad configuration. Each maps onto an [`ErrorCategory`] for logs.

use thiserror::Error;

use crate::config::ConfigError;
use crate::rpc_manager::TransportError;
use crate::tx_builder::PlanValidationError;

/// High-level error categories for logs and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network/RPC failures, safe to retry
    Network,
    /// Configuration errors
    Configuration,
    /// Contract results that do not match the expected interface
    Decode,
    /// Caller input rejected before any calldata is built
    Validation,
    /// Internal system errors
    System,
}

impl ErrorCategory {
    pub fn metric_label(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Decode => "decode",
            ErrorCategory::Validation => "validation",
            ErrorCategory::System => "system",
        }
    }
}

/// A result layout that violates the contract interface. Never coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{call}: expected {expected} result words, got {got}")]
    Arity {
        call: &'static str,
        expected: String,
        got: usize,
    },
    #[error("{call}: result truncated at word {position}")]
    Truncated { call: &'static str, position: usize },
    #[error("{call}: {left} unread trailing words")]
    TrailingWords { call: &'static str, left: usize },
    #[error("aggregate response: expected {expected} result groups, got {got}")]
    GroupCount { expected: usize, got: usize },
    #[error("aggregate response: {0}")]
    MalformedAggregate(String),
    #[error("{call}: {field} does not fit: {value}")]
    Overflow {
        call: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{call}: {field} is not a valid {kind}: {value}")]
    InvalidValue {
        call: &'static str,
        field: &'static str,
        kind: &'static str,
        value: String,
    },
    #[error("{call}: unknown {field} tag {tag}")]
    UnknownTag {
        call: &'static str,
        field: &'static str,
        tag: String,
    },
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// Failure of a single resolution step.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Top-level error for callers that mix resolution, building and config.
#[derive(Debug, Error)]
pub enum MemecoinError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("launch plan rejected: {0}")]
    PlanValidation(#[from] PlanValidationError),
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("system error: {message}")]
    System {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl MemecoinError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MemecoinError::Transport(_) => ErrorCategory::Network,
            MemecoinError::Decode(_) => ErrorCategory::Decode,
            MemecoinError::PlanValidation(_) => ErrorCategory::Validation,
            MemecoinError::Configuration(_) => ErrorCategory::Configuration,
            MemecoinError::System { .. } => ErrorCategory::System,
        }
    }

    /// Transport failures are the only ones a retry can fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, MemecoinError::Transport(_))
    }

    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
            source: None,
        }
    }
}

impl From<ResolveError> for MemecoinError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::Transport(e) => MemecoinError::Transport(e),
            ResolveError::Decode(e) => MemecoinError::Decode(e),
        }
    }
}

/// Extension trait to categorize anyhow errors at the binary edge
pub trait ErrorContext {
    fn system_context<S: Into<String>>(self, message: S) -> MemecoinError;
}

impl ErrorContext for anyhow::Error {
    fn system_context<S: Into<String>>(self, message: S) -> MemecoinError {
        MemecoinError::System {
            message: message.into(),
            source: Some(self),
        }
    }
}
