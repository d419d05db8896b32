use edc_switch::application::orchestrator::Orchestrator;
use edc_switch::config::LocalEmulationConfig;
use edc_switch::domain::transaction::{Transaction, TransactionRequest};
use edc_switch::infrastructure::in_memory::InMemoryRegistry;
use edc_switch::infrastructure::local::LocalEmulationProcessor;
use edc_switch::infrastructure::random::FixedRandom;
use rust_decimal::Decimal;
use std::sync::Arc;

pub const CARD_NUMBER: &str = "4111111111111111";

pub fn request(amount: Decimal) -> TransactionRequest {
    TransactionRequest {
        amount,
        currency: "USD".to_string(),
        card_number: CARD_NUMBER.to_string(),
        expiry_date: "12/28".to_string(),
        cvv: "123".to_string(),
        customer_id: Some("cust-1".to_string()),
        ..Default::default()
    }
}

pub fn pending(amount: Decimal) -> Transaction {
    Transaction::new(request(amount)).unwrap()
}

/// Orchestrator with a single `local` backend whose every roll is `roll`.
pub fn local_orchestrator(roll: f64) -> Orchestrator {
    let local =
        LocalEmulationProcessor::new(LocalEmulationConfig::default(), Arc::new(FixedRandom(roll)));
    Orchestrator::new(Box::new(InMemoryRegistry::new())).with_processor("local", local)
}
