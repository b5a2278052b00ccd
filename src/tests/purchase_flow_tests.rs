//! Purchase flow tests against in-memory relay and network doubles
//!
//! Covers the staged build (estimate, quote, final), both quote policies and
//! the three submission paths.

#[cfg(test)]
mod tests {
    use crate::config::QuotePolicy;
    use crate::program::{MakePurchaseArgs, LET_ME_BUY_PROGRAM_ID};
    use crate::purchase::{GaslessPurchase, PurchaseError, PurchasePlan};
    use crate::relay::RelayError;
    use crate::submit::{SubmissionState, SubmitError};
    use crate::test_utils::{ConfirmBehavior, MockNetwork, MockRelay};
    use crate::tx_builder::decode_wire;
    use crate::wallet::WalletManager;
    use solana_sdk::{pubkey::Pubkey, signature::Signature};
    use std::sync::Arc;

    fn plan(buyer: &WalletManager) -> PurchasePlan {
        PurchasePlan::new(
            buyer.clone(),
            "kora-test-store",
            "coffee",
            1,
            Pubkey::new_unique(),
            Pubkey::new_unique(),
        )
    }

    fn gasless(buyer: &WalletManager, relay: &MockRelay, policy: QuotePolicy) -> GaslessPurchase {
        GaslessPurchase::new(plan(buyer).with_quote_policy(policy), Arc::new(relay.clone()))
    }

    #[tokio::test]
    async fn test_build_runs_estimate_quote_final() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let purchase = gasless(&buyer, &relay, QuotePolicy::ReuseQuote);

        let prepared = purchase.build_purchase_transaction().await.unwrap();

        assert_eq!(
            relay.calls().await,
            vec!["getPayerSigner", "getBlockhash", "getPaymentInstruction", "getBlockhash"]
        );
        assert_eq!(prepared.quote.amount, relay.fee_amount);
        assert_eq!(prepared.payer.signer_address, relay.signer_address());

        // Estimate draft: compute budget + purchase, no payment yet
        let quoted = relay.quoted.lock().await.clone();
        assert_eq!(quoted.len(), 1);
        let estimate = decode_wire(&quoted[0]).unwrap();
        assert_eq!(estimate.message.instructions().len(), 3);
        assert_eq!(*estimate.message.recent_blockhash(), prepared.estimate_blockhash);

        // Final: compute budget + purchase + payment, fee payer first
        let output = &prepared.output;
        assert_eq!(output.tx.message.instructions().len(), 4);
        assert_eq!(output.fee_payer(), Some(relay.signer_address()));
        assert_eq!(output.pending_signers, vec![relay.signer_address()]);
        assert_eq!(output.tx.signatures[0], Signature::default());
    }

    #[tokio::test]
    async fn test_reuse_quote_takes_fresh_checkpoint() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let prepared = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .build_purchase_transaction()
            .await
            .unwrap();

        let hashes = relay.blockhashes.lock().await.clone();
        assert_eq!(hashes.len(), 2);
        assert_eq!(prepared.estimate_blockhash, hashes[0]);
        assert_eq!(prepared.output.blockhash, hashes[1]);
        assert_ne!(prepared.output.blockhash, prepared.estimate_blockhash);
    }

    #[tokio::test]
    async fn test_reuse_checkpoint_binds_final_to_quoted_blockhash() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let prepared = gasless(&buyer, &relay, QuotePolicy::ReuseCheckpoint)
            .build_purchase_transaction()
            .await
            .unwrap();

        assert_eq!(relay.blockhashes.lock().await.len(), 1);
        assert_eq!(prepared.output.blockhash, prepared.estimate_blockhash);
    }

    #[tokio::test]
    async fn test_buyer_signs_once_despite_payment_placeholder() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let prepared = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .build_purchase_transaction()
            .await
            .unwrap();

        // The payment instruction names the buyer as a signer too
        assert!(prepared
            .quote
            .instruction
            .accounts
            .iter()
            .any(|m| m.pubkey == buyer.pubkey() && m.is_signer));

        let output = &prepared.output;
        assert_eq!(
            output.required_signers,
            vec![relay.signer_address(), buyer.pubkey()]
        );
        let message_bytes = output.tx.message.serialize();
        assert!(output.tx.signatures[1].verify(buyer.pubkey().as_ref(), &message_bytes));
    }

    #[tokio::test]
    async fn test_final_carries_purchase_payload() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let prepared = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .build_purchase_transaction()
            .await
            .unwrap();

        let message = &prepared.output.tx.message;
        let keys = message.static_account_keys();
        let purchase = message
            .instructions()
            .iter()
            .find(|ix| keys[ix.program_id_index as usize] == LET_ME_BUY_PROGRAM_ID)
            .unwrap();
        let args = MakePurchaseArgs::decode(&purchase.data).unwrap();
        assert_eq!(args.store_name, "kora-test-store");
        assert_eq!(args.product_name, "coffee");
        assert_eq!(args.table_number, 1);
    }

    #[tokio::test]
    async fn test_two_step_confirms() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let network = MockNetwork::confirming();

        let receipt = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .run_two_step(&network)
            .await
            .unwrap();

        assert_eq!(receipt.state, SubmissionState::Confirmed);
        assert_eq!(receipt.relay_signer, Some(relay.signer_address()));

        let sent = network.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].signatures[0], receipt.signature);
        assert!(sent[0].verify_with_results().iter().all(|ok| *ok));
        assert!(relay.calls().await.contains(&"signTransaction"));
    }

    #[tokio::test]
    async fn test_fire_and_forget_returns_signer_only() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();

        let signer = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .run_fire_and_forget()
            .await
            .unwrap();

        assert_eq!(signer, relay.signer_address());
        assert_eq!(relay.cosigned.lock().await.len(), 1);
        assert_eq!(relay.calls().await.last(), Some(&"signAndSendTransaction"));
    }

    #[tokio::test]
    async fn test_relay_error_surfaces_verbatim() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        relay.fail_on("getPaymentInstruction").await;

        let err = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .run_two_step(&MockNetwork::confirming())
            .await
            .unwrap_err();

        match err {
            PurchaseError::Relay(RelayError::Rpc { method, message, .. }) => {
                assert_eq!(method, "getPaymentInstruction");
                assert_eq!(message, "getPaymentInstruction failed");
            }
            other => panic!("Expected relay error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cosign_failure_stops_before_network() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        relay.fail_on("signTransaction").await;
        let network = MockNetwork::confirming();

        let err = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .run_two_step(&network)
            .await
            .unwrap_err();

        assert!(matches!(err, PurchaseError::Submit(SubmitError::Relay(_))));
        assert!(network.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_terminal() {
        let buyer = WalletManager::generate();
        let relay = MockRelay::new();
        let network = MockNetwork::new(ConfirmBehavior::Reject("custom program error: 0x1".into()));

        let err = gasless(&buyer, &relay, QuotePolicy::ReuseQuote)
            .run_two_step(&network)
            .await
            .unwrap_err();

        assert_eq!(err.category(), "rejected");
        assert_eq!(network.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_direct_purchase_buyer_pays() {
        let buyer = WalletManager::generate();
        let network = MockNetwork::confirming();

        let receipt = plan(&buyer).run_direct(&network).await.unwrap();

        assert_eq!(receipt.state, SubmissionState::Confirmed);
        assert_eq!(receipt.relay_signer, None);

        let sent = network.sent().await;
        assert_eq!(sent.len(), 1);
        let signers = crate::compat::get_required_signers(&sent[0].message);
        assert_eq!(signers, &[buyer.pubkey()][..]);
        assert_eq!(*sent[0].message.recent_blockhash(), network.blockhash);
        // Compute budget + purchase, no payment instruction
        assert_eq!(sent[0].message.instructions().len(), 3);
    }
}
