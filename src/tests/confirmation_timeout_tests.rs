//! Confirmation deadline tests
//!
//! Run on paused tokio time so the 60-second bound elapses instantly.

#[cfg(test)]
mod tests {
    use crate::config::QuotePolicy;
    use crate::purchase::{GaslessPurchase, PurchaseError, PurchasePlan};
    use crate::structured_logging::StructuredLogger;
    use crate::submit::{DirectSubmitter, SubmitError, DEFAULT_CONFIRM_TIMEOUT};
    use crate::test_utils::{ConfirmBehavior, MockNetwork, MockRelay};
    use crate::tx_builder::{ExecutionContext, TransactionDraft, TxSigner};
    use crate::wallet::WalletManager;
    use solana_sdk::{
        instruction::{AccountMeta, Instruction},
        pubkey::Pubkey,
    };
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_two_step_times_out_after_sixty_seconds() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let network = MockNetwork::new(ConfirmBehavior::Hang);
        let plan = PurchasePlan::new(
            buyer,
            "kora-test-store",
            "coffee",
            1,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        )
        .with_quote_policy(QuotePolicy::ReuseQuote);
        let purchase = GaslessPurchase::new(plan, Arc::new(relay));

        let started = tokio::time::Instant::now();
        let err = purchase.run_two_step(&network).await.unwrap_err();

        match err {
            PurchaseError::Submit(SubmitError::ConfirmationTimeout { timeout, signature }) => {
                assert_eq!(timeout, DEFAULT_CONFIRM_TIMEOUT);
                assert_eq!(network.sent().await[0].signatures[0], signature);
            }
            other => panic!("Expected ConfirmationTimeout, got {:?}", other),
        }
        assert!(started.elapsed() >= DEFAULT_CONFIRM_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_submit_honours_custom_deadline() {
        let payer = WalletManager::generate();
        let network = MockNetwork::new(ConfirmBehavior::Hang);
        let ix = Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![AccountMeta::new(payer.pubkey(), true)],
            data: vec![1],
        };
        let output = TransactionDraft::new()
            .with_fee_payer(TxSigner::keypair(payer.keypair_arc()))
            .with_lifetime(ExecutionContext::new(network.blockhash))
            .with_instruction(ix, vec![])
            .partially_sign()
            .unwrap();

        let sender = DirectSubmitter::new(StructuredLogger::new("timeout-test".into()))
            .with_confirm_timeout(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        let err = sender.submit(&network, &output).await.unwrap_err();

        assert_eq!(err.category(), "timeout");
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(5) && waited < DEFAULT_CONFIRM_TIMEOUT);
    }
}
