use crate::config::{GatewayConfig, GatewayCredential};
use crate::domain::ports::PaymentProcessor;
use crate::domain::transaction::{Amount, Operation, Transaction};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};
use tracing::{Instrument, Span, error, info, info_span};

/// Remote card gateway reached over HTTPS with JSON bodies.
#[derive(Clone)]
pub struct GatewayProcessor {
    client: Client,
    config: GatewayConfig,
    span: Span,
}

impl GatewayProcessor {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let span = info_span!("gateway", endpoint = %config.endpoint);
        Ok(Self {
            client,
            config,
            span,
        })
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.credential {
            GatewayCredential::Bearer(key) => request.bearer_auth(key),
            GatewayCredential::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    async fn post(&self, url: String, payload: Value) -> Result<Value> {
        let response = self
            .authenticated(self.client.post(url))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    async fn submit(
        &self,
        mut tx: Transaction,
        op: Operation,
        url: String,
        payload: Value,
    ) -> Transaction {
        info!(transaction_id = %tx.id(), operation = %op, "submitting to gateway");
        match self.post(url, payload).await {
            Ok(response) => {
                tx.record_outcome(op.outcome(true), response);
                info!(transaction_id = %tx.id(), operation = %op, "gateway accepted");
            }
            Err(e) => {
                error!(transaction_id = %tx.id(), operation = %op, error = %e, "gateway request failed");
                tx.record_failure(op.outcome(false), e);
            }
        }
        tx
    }
}

#[async_trait]
impl PaymentProcessor for GatewayProcessor {
    async fn authorize(&self, tx: Transaction) -> Transaction {
        let payload = json!({
            "amount": tx.amount(),
            "currency": tx.currency(),
            "card_number": tx.card_number_unmasked(),
            "expiry_date": tx.expiry_date(),
            "cvv": tx.cvv(),
            "transaction_id": tx.id(),
            "var_sheet": tx.var_sheet(),
        });
        let url = self.config.endpoint.clone();
        self.submit(tx, Operation::Authorize, url, payload)
            .instrument(self.span.clone())
            .await
    }

    async fn reauthorize(&self, tx: Transaction, new_amount: Amount) -> Transaction {
        let payload = json!({
            "original_transaction_id": tx.correlation_id(),
            "amount": new_amount,
            "var_sheet": tx.var_sheet(),
        });
        let url = self.url("reauthorize");
        let mut tx = self
            .submit(tx, Operation::Reauthorize, url, payload)
            .instrument(self.span.clone())
            .await;
        if tx.status() == Operation::Reauthorize.outcome(true) {
            tx.set_amount(new_amount);
        }
        tx
    }

    async fn capture(&self, tx: Transaction) -> Transaction {
        let payload = json!({
            "original_transaction_id": tx.correlation_id(),
            "var_sheet": tx.var_sheet(),
        });
        let url = self.url("capture");
        self.submit(tx, Operation::Capture, url, payload)
            .instrument(self.span.clone())
            .await
    }
}
