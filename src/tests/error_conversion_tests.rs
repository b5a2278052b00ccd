//! Error conversion and category tests
//!
//! Every layer's error must convert into [`PurchaseError`] and keep its
//! category for structured logging.

#[cfg(test)]
mod tests {
    use crate::config::ConfigError;
    use crate::program::ProgramClientError;
    use crate::purchase::PurchaseError;
    use crate::relay::RelayError;
    use crate::submit::SubmitError;
    use crate::tx_builder::TransactionBuilderError;
    use solana_sdk::pubkey::Pubkey;

    #[test]
    fn test_config_error_to_purchase_error() {
        let err: PurchaseError = ConfigError::Missing {
            name: "BUYER_KEYPAIR",
            hint: "set it",
        }
        .into();
        assert_eq!(err.category(), "config_missing");
        assert!(err.to_string().contains("BUYER_KEYPAIR env variable is not set"));
    }

    #[test]
    fn test_program_error_to_purchase_error() {
        let err: PurchaseError = ProgramClientError::SeedTooLong { len: 40, max: 32 }.into();
        assert!(matches!(err, PurchaseError::Program(_)));
        assert_eq!(err.category(), "derivation");
    }

    #[test]
    fn test_builder_error_through_submit() {
        let signer = Pubkey::new_unique();
        let submit: SubmitError = TransactionBuilderError::MissingSigner(signer).into();
        let err: PurchaseError = submit.into();
        assert_eq!(err.category(), "encoding");

        let err: PurchaseError = TransactionBuilderError::MissingSigner(signer).into();
        assert_eq!(err.category(), "signing");
        assert!(err.to_string().contains(&signer.to_string()));
    }

    #[test]
    fn test_relay_error_keeps_method() {
        let err: PurchaseError = RelayError::Transport {
            method: "getBlockhash",
            message: "connection refused".to_string(),
        }
        .into();
        match &err {
            PurchaseError::Relay(inner) => assert_eq!(inner.method(), "getBlockhash"),
            other => panic!("Expected Relay variant, got {:?}", other),
        }
        assert_eq!(err.category(), "relay_transport");
    }
}
