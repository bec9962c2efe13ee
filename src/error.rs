// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types for the studio engine.
//!
//! Errors are classified by how the caller is expected to react:
//! transient failures are retried on the next relevant trigger, user input
//! errors are surfaced inline before any network call, capacity and conflict
//! errors abort the current operation, and fatal errors indicate the version
//! store may be in a state that needs user attention.

use thiserror::Error;

/// Engine-level error taxonomy.
///
/// Every variant carries a human-readable message; variants that originate
/// from a collaborator call also carry the operation name so the caller can
/// offer a targeted retry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StudioError {
    /// Transient I/O failure (stream load, job status fetch). Retried
    /// silently on the next relevant trigger.
    #[error("{operation}: {message}")]
    Transient { operation: String, message: String },

    /// Invalid user input, rejected synchronously before any network call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Capacity or rate limit reached. Not retryable by the engine.
    #[error("capacity: {0}")]
    Capacity(String),

    /// A conflicting operation is already in flight.
    #[error("busy: {0}")]
    Busy(String),

    /// The operation was attempted in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The version store may have been left in an inconsistent state.
    #[error("{operation} failed: {message}")]
    Fatal { operation: String, message: String },
}

impl StudioError {
    /// Build a transient error tagged with the originating operation.
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Build a fatal error tagged with the originating operation.
    pub fn fatal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether a retry of the originating operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Convenience alias used throughout the engine.
pub type StudioResult<T> = Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retryable() {
        let err = StudioError::transient("job_status", "connection reset");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "job_status: connection reset");
    }

    #[test]
    fn test_terminal_errors_are_not_retryable() {
        assert!(!StudioError::Capacity("credits exhausted".into()).is_retryable());
        assert!(!StudioError::Busy("a replacement is processing".into()).is_retryable());
        assert!(!StudioError::fatal("set_primary", "partial write").is_retryable());
    }

    #[test]
    fn test_messages_carry_operation() {
        let err = StudioError::fatal("set_primary_version", "store timeout");
        assert!(err.to_string().contains("set_primary_version"));
    }
}
