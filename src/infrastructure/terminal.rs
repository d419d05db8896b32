use crate::config::TerminalConfig;
use crate::domain::ports::PaymentProcessor;
use crate::domain::transaction::{Amount, Operation, Transaction};
use crate::error::{EdcError, Result};
use crate::interfaces::wire::frame::{
    ETX, ProtocolError, TerminalRequest, TerminalResponse, TransactionCode,
};
use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

/// Physical payment terminal reached over a raw TCP socket.
///
/// Each call opens its own connection, sends one framed request, waits for
/// one framed response and drops the socket. Only sales are supported;
/// re-authorization and capture always fail without touching the network.
#[derive(Debug, Clone)]
pub struct TerminalProcessor {
    config: TerminalConfig,
    span: Span,
}

impl TerminalProcessor {
    pub fn new(config: TerminalConfig) -> Self {
        let span = info_span!("terminal", address = %config.address());
        Self { config, span }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Sends one request frame and returns the decoded response.
    async fn exchange(&self, request: &TerminalRequest) -> Result<TerminalResponse> {
        let address = self.config.address();
        let mut stream = timeout(self.config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| EdcError::Timeout(self.config.connect_timeout))?
            .map_err(|e| EdcError::Transport(format!("connect to {address}: {e}")))?;

        stream.write_all(&request.encode()).await?;
        debug!(amount_minor = request.amount_minor, "request frame sent");

        let frame = timeout(self.config.read_timeout, self.read_frame(&mut stream))
            .await
            .map_err(|_| EdcError::Timeout(self.config.read_timeout))??;

        Ok(TerminalResponse::decode(&frame)?)
    }

    /// Reads until one byte past ETX (the LRC), EOF, or the frame size cap.
    async fn read_frame(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(64);
        let mut chunk = [0u8; 256];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            let room = self.config.max_frame_len - frame.len();
            frame.extend_from_slice(&chunk[..n.min(room)]);

            if let Some(etx) = frame.iter().position(|b| *b == ETX)
                && frame.len() > etx + 1
            {
                frame.truncate(etx + 2);
                break;
            }
            if frame.len() >= self.config.max_frame_len {
                return Err(ProtocolError::MalformedLength(frame.len()).into());
            }
        }

        if frame.is_empty() {
            return Err(EdcError::Transport(
                "terminal closed the connection without responding".to_string(),
            ));
        }
        Ok(frame)
    }

    async fn sale(&self, mut tx: Transaction) -> Transaction {
        let op = Operation::Authorize;
        info!(transaction_id = %tx.id(), "sending sale to terminal");

        let outcome = match TerminalRequest::new(TransactionCode::SALE, tx.amount().value()) {
            Ok(request) => self.exchange(&request).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(response) if response.is_approved() => {
                info!(transaction_id = %tx.id(), "terminal approved");
                tx.record_outcome(op.outcome(true), response.to_json());
            }
            Ok(response) => {
                warn!(
                    transaction_id = %tx.id(),
                    response_code = %response.response_code,
                    "terminal declined"
                );
                let mut body = response.to_json();
                body["error"] = json!(format!(
                    "terminal declined with code {}: {}",
                    response.response_code, response.message
                ));
                tx.record_outcome(op.outcome(false), body);
            }
            Err(e) => {
                error!(transaction_id = %tx.id(), error = %e, "terminal exchange failed");
                tx.record_failure(op.outcome(false), e);
            }
        }
        tx
    }

    fn unsupported(&self, mut tx: Transaction, op: Operation) -> Transaction {
        warn!(transaction_id = %tx.id(), operation = %op, "operation not supported by terminal");
        tx.record_failure(
            op.outcome(false),
            format!("{op} is not supported by the terminal transport"),
        );
        tx
    }
}

#[async_trait]
impl PaymentProcessor for TerminalProcessor {
    async fn authorize(&self, tx: Transaction) -> Transaction {
        self.sale(tx).instrument(self.span.clone()).await
    }

    async fn reauthorize(&self, tx: Transaction, _new_amount: Amount) -> Transaction {
        self.span
            .in_scope(|| self.unsupported(tx, Operation::Reauthorize))
    }

    async fn capture(&self, tx: Transaction) -> Transaction {
        self.span.in_scope(|| self.unsupported(tx, Operation::Capture))
    }
}
