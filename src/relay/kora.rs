//! JSON-RPC client for a Kora relay node

use super::{parse_pubkey, FeeRelay, PayerSigner, PaymentQuote, RelayError, WireInstruction};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use solana_sdk::{hash::Hash, pubkey::Pubkey};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct PayerSignerResult {
    signer_address: String,
    payment_address: String,
}

#[derive(Deserialize)]
struct BlockhashResult {
    blockhash: String,
}

#[derive(Serialize)]
struct PaymentInstructionParams<'a> {
    transaction: &'a str,
    fee_token: String,
    source_wallet: String,
}

#[derive(Deserialize)]
struct PaymentInstructionResult {
    payment_instruction: WireInstruction,
    payment_amount: u64,
    payment_token: String,
}

#[derive(Serialize)]
struct SignTransactionParams<'a> {
    transaction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signer_key: Option<String>,
}

#[derive(Deserialize)]
struct SignTransactionResult {
    signed_transaction: String,
}

#[derive(Deserialize)]
struct SignAndSendResult {
    signer_pubkey: String,
}

/// HTTP JSON-RPC 2.0 relay client
pub struct KoraClient {
    http: Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl KoraClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Transport {
                method: "connect",
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: P) -> Result<R, RelayError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, url = %self.rpc_url, "Relay request");

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Transport {
                method,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RelayError::Transport {
            method,
            message: e.to_string(),
        })?;

        // JSON-RPC servers may report errors with a non-2xx status and a JSON
        // error body; prefer the body when it parses.
        let parsed: JsonRpcResponse<R> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(RelayError::invalid(method, e.to_string()));
            }
            Err(_) => {
                return Err(RelayError::Transport {
                    method,
                    message: format!("HTTP {}: {}", status, body),
                });
            }
        };

        if let Some(error) = parsed.error {
            return Err(RelayError::Rpc {
                method,
                code: error.code,
                message: error.message,
            });
        }
        parsed
            .result
            .ok_or_else(|| RelayError::invalid(method, "response has neither result nor error"))
    }
}

#[async_trait]
impl FeeRelay for KoraClient {
    async fn get_payer_signer(&self) -> Result<PayerSigner, RelayError> {
        const METHOD: &str = "getPayerSigner";
        let result: PayerSignerResult = self.call(METHOD, serde_json::json!({})).await?;
        Ok(PayerSigner {
            signer_address: parse_pubkey(METHOD, "signer_address", &result.signer_address)?,
            payment_address: parse_pubkey(METHOD, "payment_address", &result.payment_address)?,
        })
    }

    async fn get_blockhash(&self) -> Result<Hash, RelayError> {
        const METHOD: &str = "getBlockhash";
        let result: BlockhashResult = self.call(METHOD, serde_json::json!({})).await?;
        Hash::from_str(&result.blockhash).map_err(|e| {
            RelayError::invalid(METHOD, format!("blockhash '{}': {}", result.blockhash, e))
        })
    }

    async fn get_payment_instruction(
        &self,
        transaction: &str,
        fee_token: &Pubkey,
        source_wallet: &Pubkey,
    ) -> Result<PaymentQuote, RelayError> {
        const METHOD: &str = "getPaymentInstruction";
        let params = PaymentInstructionParams {
            transaction,
            fee_token: fee_token.to_string(),
            source_wallet: source_wallet.to_string(),
        };
        let result: PaymentInstructionResult = self.call(METHOD, params).await?;

        Ok(PaymentQuote {
            amount: result.payment_amount,
            instruction: result.payment_instruction.into_instruction(METHOD)?,
            payment_token: parse_pubkey(METHOD, "payment_token", &result.payment_token)?,
        })
    }

    async fn sign_transaction(
        &self,
        transaction: &str,
        signer_key: &Pubkey,
    ) -> Result<String, RelayError> {
        let params = SignTransactionParams {
            transaction,
            signer_key: Some(signer_key.to_string()),
        };
        let result: SignTransactionResult = self.call("signTransaction", params).await?;
        Ok(result.signed_transaction)
    }

    async fn sign_and_send_transaction(&self, transaction: &str) -> Result<Pubkey, RelayError> {
        const METHOD: &str = "signAndSendTransaction";
        let params = SignTransactionParams {
            transaction,
            signer_key: None,
        };
        let result: SignAndSendResult = self.call(METHOD, params).await?;
        parse_pubkey(METHOD, "signer_pubkey", &result.signer_pubkey)
    }
}

impl std::fmt::Debug for KoraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KoraClient")
            .field("rpc_url", &self.rpc_url)
            .finish()
    }
}
