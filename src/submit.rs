//! Transaction submission and confirmation tracking
//!
//! Two relay strategies plus a direct path:
//!
//! - **fire-and-forget**: the relay co-signs and broadcasts in one call and
//!   reports only its signer address
//! - **two-step**: the relay co-signs, we broadcast to the network RPC and
//!   wait for `confirmed` within a bounded deadline
//! - **direct**: an already fully signed transaction is broadcast and
//!   confirmed without the relay
//!
//! Every path walks [`SubmissionState`] forward and logs each transition.
//! Nothing is retried; each failure is terminal for the run.

use async_trait::async_trait;
use futures_util::StreamExt;
use solana_client::nonblocking::{pubsub_client::PubsubClient, rpc_client::RpcClient};
use solana_rpc_client_api::{
    client_error::Error as ClientError, config::RpcSignatureSubscribeConfig,
    response::RpcSignatureResult,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{TransactionError, VersionedTransaction},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::relay::{FeeRelay, RelayError};
use crate::structured_logging::StructuredLogger;
use crate::tx_builder::{TransactionBuilderError, TxBuildOutput};

/// Default bound on the confirmation wait
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Status polling interval when the websocket is unavailable
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Network RPC error: {0}")]
    Network(String),

    #[error("Transaction {signature} not confirmed within {timeout:?}")]
    ConfirmationTimeout {
        signature: Signature,
        timeout: Duration,
    },

    /// `signature` is absent when the cluster refused the transaction
    /// before it had one to report
    #[error("Transaction {}rejected: {reason}", signature_prefix(.signature))]
    Rejected {
        signature: Option<Signature>,
        reason: String,
    },

    #[error("Encoding error: {0}")]
    Encoding(#[from] TransactionBuilderError),
}

impl SubmitError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Relay(e) => e.category(),
            Self::Network(_) => "network",
            Self::ConfirmationTimeout { .. } => "timeout",
            Self::Rejected { .. } => "rejected",
            Self::Encoding(_) => "encoding",
        }
    }

    /// Map an RPC client error, separating transaction failures reported by
    /// the cluster (preflight or execution) from transport problems
    pub fn from_client_error(signature: Option<&Signature>, err: ClientError) -> Self {
        match err.get_transaction_error() {
            Some(tx_err) => Self::Rejected {
                signature: signature.copied().filter(|sig| *sig != Signature::default()),
                reason: tx_err.to_string(),
            },
            None => Self::Network(err.to_string()),
        }
    }

    fn rejected(signature: &Signature, reason: impl std::fmt::Display) -> Self {
        Self::Rejected {
            signature: Some(*signature),
            reason: reason.to_string(),
        }
    }
}

fn signature_prefix(signature: &Option<Signature>) -> String {
    signature.map(|sig| format!("{} ", sig)).unwrap_or_default()
}

/// Lifecycle of one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Built,
    RelaySigned,
    Submitted,
    Confirmed,
    TimedOut,
    Rejected,
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::TimedOut | Self::Rejected)
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Built => "Built",
            Self::RelaySigned => "RelaySigned",
            Self::Submitted => "Submitted",
            Self::Confirmed => "Confirmed",
            Self::TimedOut => "TimedOut",
            Self::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

/// Outcome of a confirmed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub signature: Signature,
    pub state: SubmissionState,
    /// Relay co-signer, absent on the direct path
    pub relay_signer: Option<Pubkey>,
    pub elapsed: Duration,
}

/// Network-facing half of submission
#[async_trait]
pub trait NetworkSubmitter: Send + Sync {
    /// Recent blockhash and its last valid block height
    async fn latest_blockhash(&self) -> Result<(Hash, u64), SubmitError>;

    /// Broadcast a fully signed transaction
    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, SubmitError>;

    /// Resolve once `signature` reaches the configured commitment
    ///
    /// Returns `Rejected` when the cluster reports a transaction error.
    /// Never returns while the status is still unknown; callers bound the
    /// wait with a timeout.
    async fn wait_for_confirmation(&self, signature: &Signature) -> Result<(), SubmitError>;
}

/// Cluster status of a signature
#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusCheck {
    Confirmed,
    Failed(String),
    Pending,
}

impl StatusCheck {
    fn from_status(status: Option<Result<(), TransactionError>>) -> Self {
        match status {
            Some(Ok(())) => Self::Confirmed,
            Some(Err(e)) => Self::Failed(e.to_string()),
            None => Self::Pending,
        }
    }

    fn into_result(self, signature: &Signature) -> Option<Result<(), SubmitError>> {
        match self {
            Self::Confirmed => Some(Ok(())),
            Self::Failed(reason) => Some(Err(SubmitError::rejected(signature, reason))),
            Self::Pending => None,
        }
    }
}

/// Solana cluster over HTTP RPC plus websocket subscriptions
pub struct SolanaNetwork {
    rpc: RpcClient,
    ws_url: String,
    commitment: CommitmentConfig,
}

impl SolanaNetwork {
    pub fn new(rpc_url: &str, ws_url: &str, request_timeout: Duration) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            rpc: RpcClient::new_with_timeout_and_commitment(
                rpc_url.to_string(),
                request_timeout,
                commitment,
            ),
            ws_url: ws_url.to_string(),
            commitment,
        }
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    async fn check_status(&self, signature: &Signature) -> Result<StatusCheck, SubmitError> {
        let status = self
            .rpc
            .get_signature_status_with_commitment(signature, self.commitment)
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        Ok(StatusCheck::from_status(status))
    }

    /// `Ok(None)` when the subscription ended or could not be opened and
    /// the caller should fall back to polling
    async fn wait_via_subscription(
        &self,
        signature: &Signature,
    ) -> Result<Option<()>, SubmitError> {
        let client = match PubsubClient::new(&self.ws_url).await {
            Ok(client) => client,
            Err(e) => {
                warn!(ws_url = %self.ws_url, error = %e, "Websocket unavailable, polling status");
                return Ok(None);
            }
        };

        let (mut notifications, unsubscribe) = match client
            .signature_subscribe(
                signature,
                Some(RpcSignatureSubscribeConfig {
                    commitment: Some(self.commitment),
                    enable_received_notification: Some(false),
                }),
            )
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(%signature, error = %e, "Signature subscription failed, polling status");
                return Ok(None);
            }
        };

        // Subscribed first so a confirmation landing in between is not missed
        if let Some(result) = self.check_status(signature).await?.into_result(signature) {
            unsubscribe().await;
            return result.map(Some);
        }

        let mut outcome = None;
        while let Some(response) = notifications.next().await {
            debug!(%signature, slot = response.context.slot, "Signature notification");
            match response.value {
                RpcSignatureResult::ProcessedSignature(processed) => {
                    outcome = Some(match processed.err {
                        None => Ok(()),
                        Some(err) => Err(SubmitError::rejected(signature, format!("{:?}", err))),
                    });
                    break;
                }
                RpcSignatureResult::ReceivedSignature(_) => continue,
            }
        }
        unsubscribe().await;

        match outcome {
            Some(result) => result.map(Some),
            None => {
                warn!(%signature, "Signature subscription closed early, polling status");
                Ok(None)
            }
        }
    }

    async fn wait_via_polling(&self, signature: &Signature) -> Result<(), SubmitError> {
        loop {
            if let Some(result) = self.check_status(signature).await?.into_result(signature) {
                return result;
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl NetworkSubmitter for SolanaNetwork {
    async fn latest_blockhash(&self) -> Result<(Hash, u64), SubmitError> {
        self.rpc
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, SubmitError> {
        let signature = tx.signatures.first().copied();
        self.rpc
            .send_transaction(tx)
            .await
            .map_err(|e| SubmitError::from_client_error(signature.as_ref(), e))
    }

    async fn wait_for_confirmation(&self, signature: &Signature) -> Result<(), SubmitError> {
        match self.wait_via_subscription(signature).await? {
            Some(()) => Ok(()),
            None => self.wait_via_polling(signature).await,
        }
    }
}

impl std::fmt::Debug for SolanaNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaNetwork")
            .field("rpc_url", &self.rpc.url())
            .field("ws_url", &self.ws_url)
            .field("commitment", &self.commitment.commitment)
            .finish()
    }
}

/// Forward-only state holder that logs each transition
struct StateTracker<'a> {
    state: SubmissionState,
    logger: &'a StructuredLogger,
}

impl<'a> StateTracker<'a> {
    fn new(logger: &'a StructuredLogger) -> Self {
        Self {
            state: SubmissionState::Built,
            logger,
        }
    }

    fn advance(&mut self, to: SubmissionState, signature: Option<&Signature>) {
        let sig = signature.map(ToString::to_string);
        self.logger.log_transition(self.state, to, sig.as_deref());
        self.state = to;
    }
}

/// Broadcasts fully signed transactions and bounds the confirmation wait
#[derive(Debug, Clone)]
pub struct DirectSubmitter {
    confirm_timeout: Duration,
    logger: StructuredLogger,
}

impl DirectSubmitter {
    pub fn new(logger: StructuredLogger) -> Self {
        Self {
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            logger,
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    /// Broadcast a transaction the caller already fully signed
    pub async fn submit(
        &self,
        network: &dyn NetworkSubmitter,
        output: &TxBuildOutput,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let started = Instant::now();
        let mut tracker = StateTracker::new(&self.logger);

        let signature = self
            .send_and_confirm(network, &output.tx, &mut tracker)
            .await?;

        Ok(SubmissionReceipt {
            signature,
            state: tracker.state,
            relay_signer: None,
            elapsed: started.elapsed(),
        })
    }

    async fn send_and_confirm(
        &self,
        network: &dyn NetworkSubmitter,
        tx: &VersionedTransaction,
        tracker: &mut StateTracker<'_>,
    ) -> Result<Signature, SubmitError> {
        let signature = match network.send_transaction(tx).await {
            Ok(signature) => signature,
            Err(e) => {
                if matches!(e, SubmitError::Rejected { .. }) {
                    tracker.advance(SubmissionState::Rejected, tx.signatures.first());
                }
                return Err(e);
            }
        };
        tracker.advance(SubmissionState::Submitted, Some(&signature));

        match tokio::time::timeout(
            self.confirm_timeout,
            network.wait_for_confirmation(&signature),
        )
        .await
        {
            Ok(Ok(())) => {
                tracker.advance(SubmissionState::Confirmed, Some(&signature));
                Ok(signature)
            }
            Ok(Err(e)) => {
                if matches!(e, SubmitError::Rejected { .. }) {
                    tracker.advance(SubmissionState::Rejected, Some(&signature));
                }
                Err(e)
            }
            Err(_) => {
                tracker.advance(SubmissionState::TimedOut, Some(&signature));
                Err(SubmitError::ConfirmationTimeout {
                    signature,
                    timeout: self.confirm_timeout,
                })
            }
        }
    }
}

/// Drives a relay-bound transaction to a terminal state
pub struct SubmissionDriver {
    relay: Arc<dyn FeeRelay>,
    sender: DirectSubmitter,
}

impl SubmissionDriver {
    pub fn new(relay: Arc<dyn FeeRelay>, logger: StructuredLogger) -> Self {
        Self {
            relay,
            sender: DirectSubmitter::new(logger),
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.sender = self.sender.with_confirm_timeout(timeout);
        self
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.sender.confirm_timeout()
    }

    /// Relay co-signs and broadcasts; only its signer address comes back
    pub async fn fire_and_forget(&self, output: &TxBuildOutput) -> Result<Pubkey, SubmitError> {
        let logger = &self.sender.logger;
        let mut tracker = StateTracker::new(logger);

        let signer = self.relay.sign_and_send_transaction(&output.wire).await;
        logger.log_relay_call("signAndSendTransaction", signer.is_ok());
        let signer = signer?;

        tracker.advance(SubmissionState::Submitted, None);
        info!(relay_signer = %signer, "Transaction handed to relay for broadcast");
        Ok(signer)
    }

    /// Relay co-signs, then we broadcast and wait for confirmation
    pub async fn two_step(
        &self,
        network: &dyn NetworkSubmitter,
        output: &TxBuildOutput,
        relay_signer: &Pubkey,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let started = Instant::now();
        let logger = &self.sender.logger;
        let mut tracker = StateTracker::new(logger);

        let cosigned = self.relay.sign_transaction(&output.wire, relay_signer).await;
        logger.log_relay_call("signTransaction", cosigned.is_ok());
        let cosigned = TxBuildOutput::from_wire(&cosigned?)?;

        if !cosigned.is_fully_signed() {
            let missing: Vec<String> = cosigned
                .pending_signers
                .iter()
                .map(ToString::to_string)
                .collect();
            return Err(RelayError::invalid(
                "signTransaction",
                format!(
                    "co-signed transaction still missing signatures for {}",
                    missing.join(", ")
                ),
            )
            .into());
        }
        tracker.advance(SubmissionState::RelaySigned, cosigned.signature().as_ref());

        let signature = self
            .sender
            .send_and_confirm(network, &cosigned.tx, &mut tracker)
            .await?;

        Ok(SubmissionReceipt {
            signature,
            state: tracker.state,
            relay_signer: Some(*relay_signer),
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::InstructionError;

    #[test]
    fn test_status_classification() {
        let sig = Signature::default();
        assert_eq!(StatusCheck::from_status(None), StatusCheck::Pending);
        assert!(StatusCheck::from_status(None).into_result(&sig).is_none());

        assert!(matches!(
            StatusCheck::from_status(Some(Ok(()))).into_result(&sig),
            Some(Ok(()))
        ));

        let failed = StatusCheck::from_status(Some(Err(TransactionError::InstructionError(
            0,
            InstructionError::Custom(1),
        ))));
        let err = failed.into_result(&sig).unwrap().unwrap_err();
        assert_eq!(err.category(), "rejected");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SubmissionState::Built.is_terminal());
        assert!(!SubmissionState::Submitted.is_terminal());
        assert!(SubmissionState::Confirmed.is_terminal());
        assert!(SubmissionState::TimedOut.is_terminal());
        assert!(SubmissionState::Rejected.is_terminal());
        assert_eq!(SubmissionState::RelaySigned.to_string(), "RelaySigned");
    }

    #[test]
    fn test_error_categories() {
        let timeout = SubmitError::ConfirmationTimeout {
            signature: Signature::default(),
            timeout: DEFAULT_CONFIRM_TIMEOUT,
        };
        assert_eq!(timeout.category(), "timeout");

        let relay = SubmitError::from(RelayError::Rpc {
            method: "signTransaction",
            code: -32000,
            message: "insufficient payment".to_string(),
        });
        assert_eq!(relay.category(), "relay_rpc");
        assert!(relay.to_string().contains("insufficient payment"));
    }

    #[test]
    fn test_rejection_carries_typed_signature() {
        let sig = Signature::from([7u8; 64]);
        let err = SubmitError::rejected(&sig, "custom program error: 0x1");
        assert!(matches!(err, SubmitError::Rejected { signature: Some(s), .. } if s == sig));
        assert_eq!(
            err.to_string(),
            format!("Transaction {} rejected: custom program error: 0x1", sig)
        );

        let unsent = SubmitError::Rejected {
            signature: None,
            reason: "blockhash not found".to_string(),
        };
        assert_eq!(unsent.to_string(), "Transaction rejected: blockhash not found");
        assert_eq!(unsent.category(), "rejected");
    }
}
