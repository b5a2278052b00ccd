//! Fee-relay boundary
//!
//! The relay pays network fees on the buyer's behalf and recovers its cost via
//! a token payment instruction it builds for us. This crate only consumes the
//! relay; [`FeeRelay`] is the full surface it depends on, so the purchase flow
//! can run against [`KoraClient`] or an in-memory double.

pub mod errors;
mod kora;

pub use errors::RelayError;
pub use kora::KoraClient;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;

/// Relay fee-payer identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayerSigner {
    /// Address that pays network fees and co-signs
    pub signer_address: Pubkey,

    /// Address that receives the token payment
    pub payment_address: Pubkey,
}

/// Fee quote returned for a draft transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentQuote {
    /// Fee in the smallest unit of the fee token
    pub amount: u64,

    /// Ready-made token transfer from the buyer to the relay
    pub instruction: Instruction,

    pub payment_token: Pubkey,
}

/// Async relay interface
#[async_trait]
pub trait FeeRelay: Send + Sync {
    /// Fee-payer and payment-destination addresses
    async fn get_payer_signer(&self) -> Result<PayerSigner, RelayError>;

    /// Recent blockhash used as a transaction lifetime checkpoint
    async fn get_blockhash(&self) -> Result<Hash, RelayError>;

    /// Quote the fee for `transaction` (base64 wire form) payable in `fee_token`
    async fn get_payment_instruction(
        &self,
        transaction: &str,
        fee_token: &Pubkey,
        source_wallet: &Pubkey,
    ) -> Result<PaymentQuote, RelayError>;

    /// Co-sign with `signer_key` and return the new wire transaction
    async fn sign_transaction(
        &self,
        transaction: &str,
        signer_key: &Pubkey,
    ) -> Result<String, RelayError>;

    /// Co-sign and broadcast; returns the relay signer address only
    async fn sign_and_send_transaction(&self, transaction: &str) -> Result<Pubkey, RelayError>;
}

/// Instruction as carried in relay JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireInstruction {
    /// Base58 program id
    pub program_id: String,
    pub accounts: Vec<WireAccountMeta>,
    /// Base64 instruction data
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAccountMeta {
    pub pubkey: String,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl WireInstruction {
    pub fn into_instruction(self, method: &'static str) -> Result<Instruction, RelayError> {
        let program_id = parse_pubkey(method, "program_id", &self.program_id)?;
        let accounts = self
            .accounts
            .into_iter()
            .map(|meta| {
                Ok(AccountMeta {
                    pubkey: parse_pubkey(method, "accounts.pubkey", &meta.pubkey)?,
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
            })
            .collect::<Result<Vec<_>, RelayError>>()?;
        let data = BASE64_STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| RelayError::invalid(method, format!("instruction data: {}", e)))?;

        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }
}

impl From<&Instruction> for WireInstruction {
    fn from(ix: &Instruction) -> Self {
        Self {
            program_id: ix.program_id.to_string(),
            accounts: ix
                .accounts
                .iter()
                .map(|meta| WireAccountMeta {
                    pubkey: meta.pubkey.to_string(),
                    is_signer: meta.is_signer,
                    is_writable: meta.is_writable,
                })
                .collect(),
            data: BASE64_STANDARD.encode(&ix.data),
        }
    }
}

pub(crate) fn parse_pubkey(
    method: &'static str,
    field: &str,
    raw: &str,
) -> Result<Pubkey, RelayError> {
    Pubkey::from_str(raw)
        .map_err(|e| RelayError::invalid(method, format!("{} '{}': {}", field, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_instruction_conversion() {
        let ix = Instruction {
            program_id: spl_token::id(),
            accounts: vec![
                AccountMeta::new(Pubkey::new_unique(), false),
                AccountMeta::new_readonly(Pubkey::new_unique(), true),
            ],
            data: vec![3, 1, 2, 3],
        };

        let wire = WireInstruction::from(&ix);
        assert_eq!(wire.data, "AwECAw==");
        assert_eq!(wire.into_instruction("test").unwrap(), ix);
    }

    #[test]
    fn test_wire_instruction_rejects_bad_pubkey() {
        let wire = WireInstruction {
            program_id: "not-base58!".to_string(),
            accounts: vec![],
            data: String::new(),
        };
        let err = wire.into_instruction("getPaymentInstruction").unwrap_err();
        assert!(matches!(err, RelayError::InvalidResponse { .. }));
        assert!(err.to_string().contains("program_id"));
    }

    #[test]
    fn test_wire_instruction_rejects_bad_data() {
        let wire = WireInstruction {
            program_id: spl_token::id().to_string(),
            accounts: vec![],
            data: "%%%".to_string(),
        };
        assert!(wire.into_instruction("getPaymentInstruction").is_err());
    }
}
