//! Execution context for transaction assembly
//!
//! Holds the lifetime checkpoint a transaction is bound to, plus the trace
//! context of the stage building it. A context is cheap to clone and is
//! consumed by value into a draft.

use solana_sdk::hash::Hash;

use crate::observability::TraceContext;

/// Lifetime checkpoint and trace state for one assembly pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Recent blockhash the transaction is bound to
    pub blockhash: Hash,

    /// Last block height the blockhash is valid for; 0 when the source
    /// (e.g. the relay) does not report one
    pub last_valid_block_height: u64,

    pub trace_context: Option<TraceContext>,
}

impl ExecutionContext {
    pub fn new(blockhash: Hash) -> Self {
        Self {
            blockhash,
            last_valid_block_height: 0,
            trace_context: None,
        }
    }

    pub fn with_last_valid_block_height(mut self, height: u64) -> Self {
        self.last_valid_block_height = height;
        self
    }

    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace_context = Some(trace);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let hash = Hash::new_unique();
        let ctx = ExecutionContext::new(hash);
        assert_eq!(ctx.blockhash, hash);
        assert_eq!(ctx.last_valid_block_height, 0);

        let ctx = ctx
            .with_last_valid_block_height(1_000)
            .with_trace(TraceContext::new("estimate"));
        assert_eq!(ctx.last_valid_block_height, 1_000);
        assert_eq!(ctx.trace_context.unwrap().operation, "estimate");
    }
}
