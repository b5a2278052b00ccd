//! Structured logging for purchase events

use std::fmt::Display;

use crate::observability::TraceContext;

/// Structured logger for one purchase flow
///
/// Every event carries the flow's `context_id` (its correlation id) so the
/// lines of a single purchase can be grepped out of interleaved output.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context_id: String,
}

impl StructuredLogger {
    pub fn new(context_id: String) -> Self {
        Self { context_id }
    }

    pub fn for_trace(trace: &TraceContext) -> Self {
        Self::new(trace.correlation_id().to_string())
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn log_stage(&self, stage: &str, trace: &TraceContext) {
        tracing::info!(
            context_id = %self.context_id,
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
            stage = %stage,
            "Purchase stage"
        );
    }

    pub fn log_relay_call(&self, method: &str, success: bool) {
        tracing::debug!(
            context_id = %self.context_id,
            method = %method,
            success = %success,
            "Relay call"
        );
    }

    pub fn log_quote(&self, amount: u64, token: &str, policy: &str) {
        tracing::info!(
            context_id = %self.context_id,
            amount = %amount,
            token = %token,
            policy = %policy,
            "Fee quote received"
        );
    }

    pub fn log_transition(&self, from: impl Display, to: impl Display, signature: Option<&str>) {
        tracing::info!(
            context_id = %self.context_id,
            from = %from,
            to = %to,
            signature = ?signature,
            "Submission state changed"
        );
    }

    pub fn log_purchase_success(
        &self,
        store: &str,
        product: &str,
        signature: &str,
        latency_ms: u64,
    ) {
        tracing::info!(
            context_id = %self.context_id,
            store = %store,
            product = %product,
            signature = %signature,
            latency_ms = %latency_ms,
            "Purchase confirmed"
        );
    }

    pub fn log_purchase_failure(&self, category: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            context_id = %self.context_id,
            category = %category,
            error = %error,
            latency_ms = %latency_ms,
            "Purchase failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_uses_correlation_id() {
        let trace = TraceContext::new("purchase");
        let logger = StructuredLogger::for_trace(&trace);
        assert_eq!(logger.context_id(), trace.correlation_id().as_str());

        // Emitting without a subscriber must not panic
        logger.log_stage("estimate", &trace);
        logger.log_transition("Built", "RelaySigned", None);
    }
}
