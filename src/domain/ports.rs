use super::transaction::{Amount, Transaction};
use async_trait::async_trait;

/// A payment backend.
///
/// Every operation is total: failures are recorded on the returned
/// transaction as a failure status plus an `error` entry in the processor
/// response, never surfaced as `Err`.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn authorize(&self, tx: Transaction) -> Transaction;
    async fn reauthorize(&self, tx: Transaction, new_amount: Amount) -> Transaction;
    async fn capture(&self, tx: Transaction) -> Transaction;
}

/// Append-only history of submitted transactions.
#[async_trait]
pub trait TransactionRegistry: Send + Sync {
    async fn append(&self, tx: Transaction);
    async fn all(&self) -> Vec<Transaction>;
    async fn find(&self, id: &str) -> Option<Transaction>;
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub type TransactionRegistryBox = Box<dyn TransactionRegistry>;

/// Source of uniformly distributed floats in `[0, 1)`.
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}
