//! Error types for transaction assembly
//!
//! Errors are grouped by assembly stage so callers can report which step of
//! the draft → priced → final pipeline failed:
//! - instruction validation
//! - message compilation
//! - signing (including missing signer capabilities)
//! - wire encoding

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Error type for all transaction builder operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// Message could not be compiled from the instruction list
    #[error("Message compile error: {0}")]
    Compile(String),

    /// A required signer has no signer capability attached
    #[error("No signer available for required signer {0}")]
    MissingSigner(Pubkey),

    /// No lifetime checkpoint was set before assembly
    #[error("Blockhash error: {0}")]
    Blockhash(String),

    /// Instruction list violates compute-budget or structure rules
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Missing fee payer or similar incomplete draft
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Wire (bincode + base64) encoding or decoding failed
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl TransactionBuilderError {
    /// Get the error category for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Compile(_) => "compile",
            Self::MissingSigner(_) => "signing",
            Self::Blockhash(_) => "blockhash",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::Configuration(_) => "config",
            Self::Encoding(_) => "encoding",
        }
    }
}

// Convenience constructors for common error scenarios
impl TransactionBuilderError {
    pub fn blockhash_unavailable(reason: impl Into<String>) -> Self {
        Self::Blockhash(reason.into())
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }

    pub fn encoding(reason: impl std::fmt::Display) -> Self {
        Self::Encoding(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let key = Pubkey::new_unique();
        assert_eq!(
            TransactionBuilderError::MissingSigner(key).to_string(),
            format!("No signer available for required signer {}", key)
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            TransactionBuilderError::MissingSigner(Pubkey::new_unique()).category(),
            "signing"
        );
        assert_eq!(
            TransactionBuilderError::Compile("test".to_string()).category(),
            "compile"
        );
        assert_eq!(TransactionBuilderError::encoding("bad").category(), "encoding");
    }

    #[test]
    fn test_convenience_constructors() {
        let err = TransactionBuilderError::blockhash_unavailable("not set");
        assert!(matches!(err, TransactionBuilderError::Blockhash(_)));

        let err = TransactionBuilderError::invalid_order("duplicate");
        assert!(matches!(err, TransactionBuilderError::InvalidInstructionOrder(_)));
    }
}
