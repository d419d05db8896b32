use crate::config::LocalEmulationConfig;
use crate::domain::ports::{PaymentProcessor, RandomSource};
use crate::domain::transaction::{Amount, Operation, Transaction};
use crate::infrastructure::random::ThreadRandom;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{Span, error, info, info_span};

/// In-process backend that approves a configurable share of requests.
///
/// Each operation draws one value from the injected [`RandomSource`] and
/// succeeds when it falls below the configured success probability.
#[derive(Clone)]
pub struct LocalEmulationProcessor {
    config: LocalEmulationConfig,
    random: Arc<dyn RandomSource>,
    span: Span,
}

impl LocalEmulationProcessor {
    pub fn new(config: LocalEmulationConfig, random: Arc<dyn RandomSource>) -> Self {
        Self {
            config,
            random,
            span: info_span!("local_emulation"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn roll(&self) -> bool {
        self.random.next_f64() < self.config.success_probability()
    }

    fn settle(&self, mut tx: Transaction, op: Operation, success: Value, failure: &str) -> Transaction {
        if self.roll() {
            tx.record_outcome(op.outcome(true), success);
            info!(transaction_id = %tx.id(), operation = %op, "emulated success");
        } else {
            tx.record_outcome(
                op.outcome(false),
                json!({ "result": "Failure", "error": failure }),
            );
            error!(transaction_id = %tx.id(), operation = %op, "emulated failure");
        }
        tx
    }
}

impl Default for LocalEmulationProcessor {
    fn default() -> Self {
        Self::new(LocalEmulationConfig::default(), Arc::new(ThreadRandom))
    }
}

#[async_trait]
impl PaymentProcessor for LocalEmulationProcessor {
    async fn authorize(&self, tx: Transaction) -> Transaction {
        self.span.in_scope(|| {
            info!(transaction_id = %tx.id(), "emulating authorization");
            let success = json!({
                "result": "Success",
                "transaction_reference": format!("local-{}", tx.id()),
            });
            self.settle(tx, Operation::Authorize, success, "Simulated processing error")
        })
    }

    async fn reauthorize(&self, tx: Transaction, new_amount: Amount) -> Transaction {
        self.span.in_scope(|| {
            info!(transaction_id = %tx.id(), %new_amount, "emulating re-authorization");
            let success = json!({ "result": "Success", "new_amount": new_amount });
            let mut tx = self.settle(
                tx,
                Operation::Reauthorize,
                success,
                "Simulated re-authorization error",
            );
            if tx.status() == Operation::Reauthorize.outcome(true) {
                tx.set_amount(new_amount);
            }
            tx
        })
    }

    async fn capture(&self, tx: Transaction) -> Transaction {
        self.span.in_scope(|| {
            info!(transaction_id = %tx.id(), "emulating capture");
            let success = json!({
                "result": "Success",
                "capture_reference": format!("capture-{}", tx.correlation_id()),
            });
            self.settle(tx, Operation::Capture, success, "Simulated capture error")
        })
    }
}
