use crate::domain::ports::{PaymentProcessor, TransactionRegistryBox};
use crate::domain::transaction::{Amount, Operation, Transaction};
use crate::infrastructure::processor::Processor;
use std::collections::HashMap;
use tracing::{Instrument, Span, error, info, info_span, warn};

enum Step {
    Authorize,
    Reauthorize(Amount),
    Capture,
}

impl Step {
    fn operation(&self) -> Operation {
        match self {
            Step::Authorize => Operation::Authorize,
            Step::Reauthorize(_) => Operation::Reauthorize,
            Step::Capture => Operation::Capture,
        }
    }
}

/// Routes transactions to payment backends by platform name.
///
/// `Orchestrator` owns the transaction registry and the set of configured
/// processors. It never decides an outcome itself: it picks the processor,
/// checks that the requested operation is legal from the transaction's
/// current state, and hands back whatever the processor returned.
///
/// Every call takes the transaction by value, so the working copy can never
/// alias the instance kept in the registry.
pub struct Orchestrator {
    processors: HashMap<String, Processor>,
    registry: TransactionRegistryBox,
    span: Span,
}

impl Orchestrator {
    /// Creates an orchestrator with no processors.
    pub fn new(registry: TransactionRegistryBox) -> Self {
        Self {
            processors: HashMap::new(),
            registry,
            span: info_span!("orchestrator"),
        }
    }

    /// Registers `processor` under `platform`. Names match case-insensitively.
    pub fn with_processor(mut self, platform: &str, processor: impl Into<Processor>) -> Self {
        self.processors
            .insert(platform.to_lowercase(), processor.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Registered platform names, sorted.
    pub fn platforms(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Records `tx` in the registry, then authorizes it on `platform`.
    pub async fn authorize(&self, tx: Transaction, platform: &str) -> Transaction {
        self.registry.append(tx.duplicate()).await;
        self.dispatch(tx, platform, Step::Authorize)
            .instrument(self.span.clone())
            .await
    }

    /// Moves an authorized hold to `new_amount`.
    pub async fn reauthorize(
        &self,
        tx: Transaction,
        new_amount: Amount,
        platform: &str,
    ) -> Transaction {
        self.dispatch(tx, platform, Step::Reauthorize(new_amount))
            .instrument(self.span.clone())
            .await
    }

    /// Settles an authorized or re-authorized hold.
    pub async fn capture(&self, tx: Transaction, platform: &str) -> Transaction {
        self.dispatch(tx, platform, Step::Capture)
            .instrument(self.span.clone())
            .await
    }

    /// Snapshot of every transaction submitted for authorization.
    pub async fn history(&self) -> Vec<Transaction> {
        self.registry.all().await
    }

    pub async fn find(&self, id: &str) -> Option<Transaction> {
        self.registry.find(id).await
    }

    /// Consumes the orchestrator and returns the registry contents.
    pub async fn into_history(self) -> Vec<Transaction> {
        self.registry.all().await
    }

    async fn dispatch(&self, mut tx: Transaction, platform: &str, step: Step) -> Transaction {
        let op = step.operation();

        let Some(processor) = self.processors.get(&platform.to_lowercase()) else {
            error!(platform, transaction_id = %tx.id(), "invalid platform specified");
            tx.mark_invalid_platform(platform);
            return tx;
        };

        if !matches!(step, Step::Authorize) {
            tx.link_original();
        }

        if !op.permitted_from(tx.status()) {
            warn!(
                platform,
                transaction_id = %tx.id(),
                operation = %op,
                status = %tx.status(),
                "rejected out-of-order operation"
            );
            let reason = format!("cannot {op} a transaction in state {}", tx.status());
            tx.record_failure(op.outcome(false), reason);
            return tx;
        }

        info!(platform, kind = processor.kind(), transaction_id = %tx.id(), operation = %op, "dispatching");
        let tx = match step {
            Step::Authorize => processor.authorize(tx).await,
            Step::Reauthorize(new_amount) => processor.reauthorize(tx, new_amount).await,
            Step::Capture => processor.capture(tx).await,
        };
        info!(platform, transaction_id = %tx.id(), status = %tx.status(), "processor returned");
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocalEmulationConfig, TerminalConfig};
    use crate::domain::ports::RandomSource;
    use crate::domain::transaction::{TransactionRequest, TransactionStatus};
    use crate::infrastructure::in_memory::InMemoryRegistry;
    use crate::infrastructure::local::LocalEmulationProcessor;
    use crate::infrastructure::terminal::TerminalProcessor;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    struct CountingRandom {
        value: f64,
        calls: AtomicUsize,
    }

    impl RandomSource for CountingRandom {
        fn next_f64(&self) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value
        }
    }

    /// Collects the names of the spans enclosing every event.
    struct SpanNames(Arc<parking_lot::Mutex<Vec<String>>>);

    impl<S> Layer<S> for SpanNames
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
            if let Some(scope) = ctx.event_scope(event) {
                self.0
                    .lock()
                    .extend(scope.map(|span| span.name().to_string()));
            }
        }
    }

    fn orchestrator(random: Arc<CountingRandom>) -> Orchestrator {
        let local = LocalEmulationProcessor::new(LocalEmulationConfig::default(), random);
        Orchestrator::new(Box::new(InMemoryRegistry::new())).with_processor("local", local)
    }

    fn counting(value: f64) -> Arc<CountingRandom> {
        Arc::new(CountingRandom {
            value,
            calls: AtomicUsize::new(0),
        })
    }

    fn pending() -> Transaction {
        Transaction::new(TransactionRequest {
            amount: dec!(100.00),
            currency: "USD".to_string(),
            card_number: "4111111111111111".to_string(),
            expiry_date: "12/28".to_string(),
            cvv: "123".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_authorize_registers_pre_operation_copy() {
        let engine = orchestrator(counting(0.5));
        let tx = engine.authorize(pending(), "local").await;

        assert_eq!(tx.status(), TransactionStatus::Approved);
        let history = engine.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id(), tx.id());
        assert_eq!(history[0].status(), TransactionStatus::Pending);
        assert!(history[0].processor_response().is_none());
    }

    #[tokio::test]
    async fn test_follow_ups_do_not_register() {
        let engine = orchestrator(counting(0.5));
        let tx = engine.authorize(pending(), "local").await;
        let tx = engine
            .reauthorize(tx.duplicate(), Amount::new(dec!(110.00)).unwrap(), "local")
            .await;
        let tx = engine.capture(tx.duplicate(), "local").await;

        assert_eq!(tx.status(), TransactionStatus::Captured);
        assert_eq!(engine.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_platform_skips_processor() {
        let random = counting(0.5);
        let engine = orchestrator(random.clone());

        let tx = engine.authorize(pending(), "unknown").await;

        assert_eq!(tx.status(), TransactionStatus::InvalidPlatform);
        assert_eq!(random.calls.load(Ordering::SeqCst), 0);
        assert!(tx.error_message().unwrap().contains("unknown"));
        assert_eq!(engine.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_platform_lookup_ignores_case() {
        let engine = orchestrator(counting(0.5));
        let tx = engine.authorize(pending(), "LOCAL").await;
        assert_eq!(tx.status(), TransactionStatus::Approved);
    }

    #[tokio::test]
    async fn test_capture_before_authorize_is_rejected() {
        let random = counting(0.5);
        let engine = orchestrator(random.clone());

        let tx = engine.capture(pending(), "local").await;

        assert_eq!(tx.status(), TransactionStatus::CaptureFailed);
        assert!(tx.error_message().unwrap().contains("Pending"));
        assert_eq!(random.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_follow_ups_link_original_id() {
        let engine = orchestrator(counting(0.5));
        let tx = engine.authorize(pending(), "local").await;
        assert!(tx.original_transaction_id().is_none());

        let id = tx.id().to_string();
        let tx = engine
            .reauthorize(tx, Amount::new(dec!(1.00)).unwrap(), "local")
            .await;
        assert_eq!(tx.original_transaction_id(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_unknown_platform_leaves_follow_up_unlinked() {
        let engine = orchestrator(counting(0.5));
        let tx = engine.authorize(pending(), "local").await;

        let tx = engine
            .reauthorize(tx, Amount::new(dec!(1.00)).unwrap(), "unknown")
            .await;
        assert_eq!(tx.status(), TransactionStatus::InvalidPlatform);
        assert!(tx.original_transaction_id().is_none());

        let tx = engine.capture(tx, "unknown").await;
        assert!(tx.original_transaction_id().is_none());
    }

    #[tokio::test]
    async fn test_injected_spans_wrap_logs() {
        let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(SpanNames(names.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let local = LocalEmulationProcessor::new(LocalEmulationConfig::default(), counting(0.5))
            .with_span(info_span!("card_present_lane"));
        let engine = Orchestrator::new(Box::new(InMemoryRegistry::new()))
            .with_processor("local", local)
            .with_span(info_span!("nightly_batch"));

        engine.authorize(pending(), "local").await;

        let names = names.lock();
        assert!(names.iter().any(|name| name == "card_present_lane"));
        assert!(names.iter().any(|name| name == "nightly_batch"));
    }

    #[test]
    fn test_platforms_sorted() {
        let terminal = TerminalProcessor::new(TerminalConfig::default());
        let engine = orchestrator(counting(0.5)).with_processor("Terminal", terminal);
        assert_eq!(engine.platforms(), ["local", "terminal"]);
    }
}
