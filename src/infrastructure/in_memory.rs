use crate::domain::ports::TransactionRegistry;
use crate::domain::transaction::Transaction;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe, append-only in-memory transaction history.
///
/// Uses `Arc<RwLock<Vec<Transaction>>>` so clones share the same history
/// across concurrent orchestrator calls. Nothing outlives the process.
#[derive(Default, Clone)]
pub struct InMemoryRegistry {
    transactions: Arc<RwLock<Vec<Transaction>>>,
}

impl InMemoryRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionRegistry for InMemoryRegistry {
    async fn append(&self, tx: Transaction) {
        self.transactions.write().await.push(tx);
    }

    async fn all(&self) -> Vec<Transaction> {
        self.transactions.read().await.clone()
    }

    async fn find(&self, id: &str) -> Option<Transaction> {
        let transactions = self.transactions.read().await;
        transactions.iter().rev().find(|tx| tx.id() == id).cloned()
    }

    async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }
}
