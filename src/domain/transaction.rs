use super::card::{REDACTED_CVV, generate_transaction_id, mask_card_number, unmask_card_number};
use crate::error::{EdcError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Merchant and terminal identification fields forwarded verbatim to backends.
pub type VarSheet = BTreeMap<String, String>;

/// Well-known VAR sheet keys.
pub mod var_sheet_keys {
    pub const MERCHANT_NUMBER: &str = "merchant_number";
    pub const ACQUIRER_BIN: &str = "acquirer_bin";
    pub const STORE_NUMBER: &str = "store_number";
    pub const TERMINAL_NUMBER: &str = "terminal_number";
    pub const MCC: &str = "mcc";
    pub const LOCATION_NUMBER: &str = "location_number";
    pub const VITAL_NUMBER: &str = "vital_number";
    pub const AGENT_BANK: &str = "agent_bank";
    pub const AGENT_CHAIN: &str = "agent_chain";
}

/// A non-negative monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EdcError::InvalidInput(format!(
                "amount must not be negative, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Multiplies by `factor`, rounding half away from zero to cents.
    pub fn scaled(&self, factor: Decimal) -> Result<Self> {
        let product = self.0.checked_mul(factor).ok_or_else(|| {
            EdcError::InvalidInput(format!("amount {} scaled by {factor} overflows", self.0))
        })?;
        Self::new(product.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EdcError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransactionStatus {
    Pending,
    Approved,
    Failed,
    #[serde(rename = "Re-authorized")]
    ReAuthorized,
    #[serde(rename = "Re-authorization Failed")]
    ReAuthorizationFailed,
    Captured,
    #[serde(rename = "Capture Failed")]
    CaptureFailed,
    #[serde(rename = "Error: Invalid Platform")]
    InvalidPlatform,
}

impl TransactionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed | Self::ReAuthorizationFailed | Self::CaptureFailed | Self::InvalidPlatform
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Failed => "Failed",
            Self::ReAuthorized => "Re-authorized",
            Self::ReAuthorizationFailed => "Re-authorization Failed",
            Self::Captured => "Captured",
            Self::CaptureFailed => "Capture Failed",
            Self::InvalidPlatform => "Error: Invalid Platform",
        };
        f.write_str(label)
    }
}

/// The lifecycle operations a processor can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Authorize,
    Reauthorize,
    Capture,
}

impl Operation {
    /// Whether this operation may run against a transaction in `status`.
    pub fn permitted_from(self, status: TransactionStatus) -> bool {
        use TransactionStatus::*;
        match self {
            Operation::Authorize => status == Pending,
            Operation::Reauthorize => status == Approved,
            Operation::Capture => matches!(status, Approved | ReAuthorized),
        }
    }

    /// The status a transaction lands in once the backend has answered.
    pub fn outcome(self, approved: bool) -> TransactionStatus {
        use TransactionStatus::*;
        match (self, approved) {
            (Operation::Authorize, true) => Approved,
            (Operation::Authorize, false) => Failed,
            (Operation::Reauthorize, true) => ReAuthorized,
            (Operation::Reauthorize, false) => ReAuthorizationFailed,
            (Operation::Capture, true) => Captured,
            (Operation::Capture, false) => CaptureFailed,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Authorize => "authorize",
            Operation::Reauthorize => "re-authorize",
            Operation::Capture => "capture",
        })
    }
}

/// Raw, caller-validated input for a new transaction.
///
/// Holds the full card number and CVV; both are dropped by
/// [`Transaction::new`]. `Debug` never prints them.
#[derive(Clone, Default)]
pub struct TransactionRequest {
    pub amount: Decimal,
    pub currency: String,
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub customer_id: Option<String>,
    pub transaction_id: Option<String>,
    pub var_sheet: VarSheet,
}

impl fmt::Debug for TransactionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionRequest")
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("card_number", &"<redacted>")
            .field("expiry_date", &self.expiry_date)
            .field("cvv", &REDACTED_CVV)
            .field("customer_id", &self.customer_id)
            .field("transaction_id", &self.transaction_id)
            .field("var_sheet", &self.var_sheet)
            .finish()
    }
}

/// One payment attempt.
///
/// Card data is masked and the CVV discarded at construction; the remaining
/// mutable state (`status`, `processor_response`) is only written by
/// processors and the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: String,
    created_at: DateTime<Utc>,
    amount: Amount,
    currency: String,
    card_number_masked: String,
    expiry_date: String,
    customer_id: Option<String>,
    status: TransactionStatus,
    processor_response: Option<Value>,
    original_transaction_id: Option<String>,
    var_sheet: VarSheet,
}

impl Transaction {
    /// Builds a pending transaction from raw input.
    pub fn new(request: TransactionRequest) -> Result<Self> {
        let TransactionRequest {
            amount,
            currency,
            card_number,
            expiry_date,
            cvv: _,
            customer_id,
            transaction_id,
            var_sheet,
        } = request;

        let amount = Amount::new(amount)?;
        let card_number_masked = mask_card_number(&card_number)?;
        let currency = normalize_currency(&currency)?;
        let created_at = Utc::now();
        let id = match transaction_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => generate_transaction_id(created_at),
        };

        Ok(Self {
            id,
            created_at,
            amount,
            currency,
            card_number_masked,
            expiry_date,
            customer_id: customer_id.filter(|c| !c.is_empty()),
            status: TransactionStatus::Pending,
            processor_response: None,
            original_transaction_id: None,
            var_sheet,
        })
    }

    /// Returns an independent copy that shares no nested data with `self`.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Produces the flat display record. Only masked card data appears in it.
    pub fn to_record(&self) -> TransactionRecord<'_> {
        TransactionRecord {
            timestamp: self.created_at.to_rfc3339(),
            transaction_id: &self.id,
            amount: self.amount,
            currency: &self.currency,
            card_number: &self.card_number_masked,
            expiry_date: &self.expiry_date,
            customer_id: self.customer_id.as_deref(),
            status: self.status,
            processor_response: self.processor_response.as_ref(),
            original_transaction_id: self.original_transaction_id.as_deref(),
            var_sheet: &self.var_sheet,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn card_number_masked(&self) -> &str {
        &self.card_number_masked
    }

    /// Card number with the mask stripped, for building outbound requests only.
    pub fn card_number_unmasked(&self) -> String {
        unmask_card_number(&self.card_number_masked)
    }

    pub fn expiry_date(&self) -> &str {
        &self.expiry_date
    }

    /// Always the redaction placeholder.
    pub fn cvv(&self) -> &'static str {
        REDACTED_CVV
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer_id.as_deref()
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn processor_response(&self) -> Option<&Value> {
        self.processor_response.as_ref()
    }

    /// The `error` string of the last processor response, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.processor_response
            .as_ref()
            .and_then(|r| r.get("error"))
            .and_then(Value::as_str)
    }

    pub fn original_transaction_id(&self) -> Option<&str> {
        self.original_transaction_id.as_deref()
    }

    /// The id backends use to correlate follow-up operations.
    pub fn correlation_id(&self) -> &str {
        self.original_transaction_id.as_deref().unwrap_or(&self.id)
    }

    pub fn var_sheet(&self) -> &VarSheet {
        &self.var_sheet
    }

    pub fn var_sheet_mut(&mut self) -> &mut VarSheet {
        &mut self.var_sheet
    }

    pub(crate) fn record_outcome(&mut self, status: TransactionStatus, response: Value) {
        self.status = status;
        self.processor_response = Some(response);
    }

    pub(crate) fn record_failure(&mut self, status: TransactionStatus, error: impl fmt::Display) {
        self.record_outcome(status, serde_json::json!({ "error": error.to_string() }));
    }

    pub(crate) fn mark_invalid_platform(&mut self, platform: &str) {
        self.record_failure(
            TransactionStatus::InvalidPlatform,
            EdcError::InvalidPlatform(platform.to_string()),
        );
    }

    pub(crate) fn set_amount(&mut self, amount: Amount) {
        self.amount = amount;
    }

    pub(crate) fn link_original(&mut self) {
        if self.original_transaction_id.is_none() {
            self.original_transaction_id = Some(self.id.clone());
        }
    }
}

impl Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_record().serialize(serializer)
    }
}

/// Flat, field-ordered view of a [`Transaction`] for display and logs.
#[derive(Debug, Serialize, PartialEq)]
pub struct TransactionRecord<'a> {
    pub timestamp: String,
    pub transaction_id: &'a str,
    pub amount: Amount,
    pub currency: &'a str,
    pub card_number: &'a str,
    pub expiry_date: &'a str,
    pub customer_id: Option<&'a str>,
    pub status: TransactionStatus,
    pub processor_response: Option<&'a Value>,
    pub original_transaction_id: Option<&'a str>,
    pub var_sheet: &'a VarSheet,
}

fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(EdcError::InvalidInput(format!(
            "currency must be a 3-letter code, got {currency:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> TransactionRequest {
        let mut var_sheet = VarSheet::new();
        var_sheet.insert(var_sheet_keys::MERCHANT_NUMBER.to_string(), "887000003193".to_string());
        var_sheet.insert(var_sheet_keys::MCC.to_string(), "5999".to_string());
        TransactionRequest {
            amount: dec!(100.00),
            currency: "usd".to_string(),
            card_number: "4111111111111111".to_string(),
            expiry_date: "12/28".to_string(),
            cvv: "123".to_string(),
            customer_id: Some("cust-1".to_string()),
            transaction_id: None,
            var_sheet,
        }
    }

    #[test]
    fn test_amount_scaled_rounds_to_cents() {
        let amount = Amount::new(dec!(100.00)).unwrap();
        let scaled = amount.scaled(dec!(1.1)).unwrap();
        assert_eq!(scaled.to_string(), "110.00");

        let amount = Amount::new(dec!(10.01)).unwrap();
        assert_eq!(amount.scaled(dec!(0.5)).unwrap().to_string(), "5.01");
    }

    #[test]
    fn test_amount_scaled_overflow_is_error() {
        let amount = Amount::new(dec!(100000000000000000000000.00)).unwrap();
        assert!(matches!(
            amount.scaled(dec!(1000000)),
            Err(EdcError::InvalidInput(_))
        ));
        assert!(matches!(
            amount.scaled(dec!(-1)),
            Err(EdcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_masks_and_redacts() {
        let tx = Transaction::new(request()).unwrap();
        assert_eq!(tx.card_number_masked(), "XXXXXXXXXXXX1111");
        assert_eq!(tx.cvv(), REDACTED_CVV);
        assert_eq!(tx.status(), TransactionStatus::Pending);
        assert_eq!(tx.currency(), "USD");
        assert!(tx.processor_response().is_none());
        assert!(!tx.id().is_empty());
    }

    #[test]
    fn test_new_keeps_supplied_id() {
        let mut req = request();
        req.transaction_id = Some("tx-42".to_string());
        let tx = Transaction::new(req).unwrap();
        assert_eq!(tx.id(), "tx-42");
        assert_eq!(tx.correlation_id(), "tx-42");
    }

    #[test]
    fn test_new_rejects_negative_amount() {
        let mut req = request();
        req.amount = dec!(-0.01);
        assert!(matches!(
            Transaction::new(req),
            Err(EdcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_accepts_zero_amount() {
        let mut req = request();
        req.amount = dec!(0);
        assert!(Transaction::new(req).is_ok());
    }

    #[test]
    fn test_new_rejects_short_card() {
        let mut req = request();
        req.card_number = "411".to_string();
        assert!(matches!(
            Transaction::new(req),
            Err(EdcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_new_rejects_bad_currency() {
        let mut req = request();
        req.currency = "US1".to_string();
        assert!(matches!(
            Transaction::new(req),
            Err(EdcError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_request_debug_hides_card_data() {
        let rendered = format!("{:?}", request());
        assert!(!rendered.contains("4111111111111111"));
        assert!(!rendered.contains("\"123\""));
    }

    #[test]
    fn test_record_is_flat_and_ordered() {
        let tx = Transaction::new(request()).unwrap();
        let json = serde_json::to_string(&tx).unwrap();

        let keys = [
            "timestamp",
            "transaction_id",
            "amount",
            "currency",
            "card_number",
            "expiry_date",
            "customer_id",
            "status",
            "processor_response",
            "original_transaction_id",
            "var_sheet",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| json.find(&format!("\"{k}\":")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(json.contains("XXXXXXXXXXXX1111"));
        assert!(!json.contains("4111111111111111"));
        assert!(json.contains("\"status\":\"Pending\""));
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut original = Transaction::new(request()).unwrap();
        original.record_outcome(
            TransactionStatus::Approved,
            serde_json::json!({ "result": "Success" }),
        );

        let mut copy = original.duplicate();
        assert_eq!(copy, original);

        copy.var_sheet_mut()
            .insert(var_sheet_keys::MCC.to_string(), "0000".to_string());
        copy.record_outcome(
            TransactionStatus::Captured,
            serde_json::json!({ "result": "Other" }),
        );

        assert_eq!(original.var_sheet()[var_sheet_keys::MCC], "5999");
        assert_eq!(original.processor_response().unwrap()["result"], "Success");
        assert_eq!(original.status(), TransactionStatus::Approved);
        assert_eq!(copy.cvv(), REDACTED_CVV);
    }

    #[test]
    fn test_link_original_only_once() {
        let mut tx = Transaction::new(request()).unwrap();
        let id = tx.id().to_string();
        tx.link_original();
        tx.link_original();
        assert_eq!(tx.original_transaction_id(), Some(id.as_str()));
    }

    #[test]
    fn test_error_message() {
        let mut tx = Transaction::new(request()).unwrap();
        tx.record_failure(TransactionStatus::Failed, "connection refused");
        assert_eq!(tx.error_message(), Some("connection refused"));
    }

    #[test]
    fn test_transition_table() {
        use TransactionStatus::*;
        assert!(Operation::Authorize.permitted_from(Pending));
        assert!(!Operation::Authorize.permitted_from(Approved));
        assert!(Operation::Reauthorize.permitted_from(Approved));
        assert!(!Operation::Reauthorize.permitted_from(ReAuthorized));
        assert!(Operation::Capture.permitted_from(Approved));
        assert!(Operation::Capture.permitted_from(ReAuthorized));
        assert!(!Operation::Capture.permitted_from(Pending));
        assert!(!Operation::Capture.permitted_from(Failed));

        assert_eq!(Operation::Authorize.outcome(true), Approved);
        assert_eq!(Operation::Reauthorize.outcome(false), ReAuthorizationFailed);
        assert_eq!(Operation::Capture.outcome(false), CaptureFailed);
    }

    #[test]
    fn test_status_serializes_display_label() {
        let json = serde_json::to_string(&TransactionStatus::ReAuthorizationFailed).unwrap();
        assert_eq!(json, "\"Re-authorization Failed\"");
        assert_eq!(
            TransactionStatus::InvalidPlatform.to_string(),
            "Error: Invalid Platform"
        );
    }
}
