use super::gateway::GatewayProcessor;
use super::local::LocalEmulationProcessor;
use super::terminal::TerminalProcessor;
use crate::domain::ports::PaymentProcessor;
use crate::domain::transaction::{Amount, Transaction};
use async_trait::async_trait;

/// The closed set of backends the orchestrator can route to.
#[derive(Clone)]
pub enum Processor {
    Gateway(GatewayProcessor),
    LocalEmulation(LocalEmulationProcessor),
    Terminal(TerminalProcessor),
}

impl Processor {
    pub fn kind(&self) -> &'static str {
        match self {
            Processor::Gateway(_) => "gateway",
            Processor::LocalEmulation(_) => "local",
            Processor::Terminal(_) => "terminal",
        }
    }

    fn as_dyn(&self) -> &dyn PaymentProcessor {
        match self {
            Processor::Gateway(p) => p,
            Processor::LocalEmulation(p) => p,
            Processor::Terminal(p) => p,
        }
    }
}

#[async_trait]
impl PaymentProcessor for Processor {
    async fn authorize(&self, tx: Transaction) -> Transaction {
        self.as_dyn().authorize(tx).await
    }

    async fn reauthorize(&self, tx: Transaction, new_amount: Amount) -> Transaction {
        self.as_dyn().reauthorize(tx, new_amount).await
    }

    async fn capture(&self, tx: Transaction) -> Transaction {
        self.as_dyn().capture(tx).await
    }
}

impl From<GatewayProcessor> for Processor {
    fn from(p: GatewayProcessor) -> Self {
        Processor::Gateway(p)
    }
}

impl From<LocalEmulationProcessor> for Processor {
    fn from(p: LocalEmulationProcessor) -> Self {
        Processor::LocalEmulation(p)
    }
}

impl From<TerminalProcessor> for Processor {
    fn from(p: TerminalProcessor) -> Self {
        Processor::Terminal(p)
    }
}
