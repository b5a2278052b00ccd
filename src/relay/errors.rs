//! Error types for the fee-relay boundary

use thiserror::Error;

/// Failures surfaced from relay calls
///
/// The relay owns its own error vocabulary (unsupported fee token, insufficient
/// balance, ...); those arrive as [`RelayError::Rpc`] with the relay's code and
/// message untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Network or HTTP-level failure reaching the relay
    #[error("Transport error calling {method}: {message}")]
    Transport {
        method: &'static str,
        message: String,
    },

    /// JSON-RPC error object returned by the relay
    #[error("Relay error on {method} (code {code}): {message}")]
    Rpc {
        method: &'static str,
        code: i64,
        message: String,
    },

    /// Response arrived but could not be interpreted
    #[error("Invalid response from {method}: {reason}")]
    InvalidResponse {
        method: &'static str,
        reason: String,
    },
}

impl RelayError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "relay_transport",
            Self::Rpc { .. } => "relay_rpc",
            Self::InvalidResponse { .. } => "relay_response",
        }
    }

    /// The relay method the failure belongs to
    pub fn method(&self) -> &'static str {
        match self {
            Self::Transport { method, .. }
            | Self::Rpc { method, .. }
            | Self::InvalidResponse { method, .. } => method,
        }
    }

    pub(crate) fn invalid(method: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            method,
            reason: reason.into(),
        }
    }
}
