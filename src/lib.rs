//! Gasless purchase client for the let-me-buy store program
//!
//! This library exposes the building blocks shared by the `gasless-purchase`
//! and `local_setup` binaries and their tests.

pub mod compat;
pub mod config;
pub mod observability;
pub mod program;
pub mod purchase;
pub mod relay;
pub mod setup;
pub mod structured_logging;
pub mod submit;
pub mod tx_builder;
pub mod wallet;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;


// Re-export commonly used types
pub use solana_sdk::{message::VersionedMessage, pubkey::Pubkey, signature::Signature};
