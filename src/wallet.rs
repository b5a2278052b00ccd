//! Wallet management module

use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;

/// Owns a signing keypair loaded from a base58 secret key
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl WalletManager {
    /// Load a wallet from a base58-encoded 64-byte secret key
    pub fn from_base58(secret: &str) -> Result<Self> {
        let bytes = bs58::decode(secret.trim())
            .into_vec()
            .context("Secret key is not valid base58")?;

        if bytes.len() != 64 {
            anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", bytes.len());
        }
        if bytes.iter().all(|&b| b == 0) {
            anyhow::bail!("Invalid keypair: all-zero key rejected");
        }

        let keypair = Keypair::try_from(bytes.as_slice()).context("Invalid keypair bytes")?;
        Ok(Self::from_keypair(keypair))
    }

    /// Create a new wallet manager from a keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Generate a fresh random wallet
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::new())
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Get an Arc reference to the keypair (for signer capabilities)
    pub fn keypair_arc(&self) -> Arc<Keypair> {
        Arc::clone(&self.keypair)
    }

    /// Export the secret key in the same base58 form `from_base58` accepts
    pub fn to_base58(&self) -> String {
        self.keypair.to_base58_string()
    }
}

impl Clone for WalletManager {
    fn clone(&self) -> Self {
        Self {
            keypair: Arc::clone(&self.keypair),
        }
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base58_roundtrip_preserves_address() {
        let wallet = WalletManager::generate();
        let restored = WalletManager::from_base58(&wallet.to_base58()).unwrap();
        assert_eq!(wallet.pubkey(), restored.pubkey());
    }

    #[test]
    fn test_rejects_short_key() {
        let short = bs58::encode([7u8; 32]).into_string();
        let err = WalletManager::from_base58(&short).unwrap_err();
        assert!(err.to_string().contains("expected 64 bytes"));
    }

    #[test]
    fn test_rejects_all_zero_key() {
        let zero = bs58::encode([0u8; 64]).into_string();
        assert!(WalletManager::from_base58(&zero).is_err());
    }

    #[test]
    fn test_rejects_non_base58() {
        assert!(WalletManager::from_base58("0OIl not base58").is_err());
    }
}
