use crate::domain::transaction::{TransactionRequest, VarSheet, var_sheet_keys};
use crate::error::{EdcError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One CSV row. Not `Debug`: it holds the raw card number.
#[derive(Deserialize)]
struct RequestRow {
    amount: Decimal,
    currency: String,
    card_number: String,
    expiry_date: String,
    #[serde(default)]
    cvv: String,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    merchant_number: Option<String>,
    #[serde(default)]
    acquirer_bin: Option<String>,
    #[serde(default)]
    store_number: Option<String>,
    #[serde(default)]
    terminal_number: Option<String>,
    #[serde(default)]
    mcc: Option<String>,
    #[serde(default)]
    location_number: Option<String>,
    #[serde(default)]
    vital_number: Option<String>,
    #[serde(default)]
    agent_bank: Option<String>,
    #[serde(default)]
    agent_chain: Option<String>,
}

impl From<RequestRow> for TransactionRequest {
    fn from(row: RequestRow) -> Self {
        let fields = [
            (var_sheet_keys::MERCHANT_NUMBER, row.merchant_number),
            (var_sheet_keys::ACQUIRER_BIN, row.acquirer_bin),
            (var_sheet_keys::STORE_NUMBER, row.store_number),
            (var_sheet_keys::TERMINAL_NUMBER, row.terminal_number),
            (var_sheet_keys::MCC, row.mcc),
            (var_sheet_keys::LOCATION_NUMBER, row.location_number),
            (var_sheet_keys::VITAL_NUMBER, row.vital_number),
            (var_sheet_keys::AGENT_BANK, row.agent_bank),
            (var_sheet_keys::AGENT_CHAIN, row.agent_chain),
        ];
        let var_sheet: VarSheet = fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();

        TransactionRequest {
            amount: row.amount,
            currency: row.currency,
            card_number: row.card_number,
            expiry_date: row.expiry_date,
            cvv: row.cvv,
            customer_id: row.customer_id,
            transaction_id: row.transaction_id,
            var_sheet,
        }
    }
}

/// Reads raw transaction requests from a CSV source.
///
/// Columns are matched by header name; the VAR sheet columns and
/// `customer_id`/`transaction_id` are optional.
pub struct RequestReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes each row into a [`TransactionRequest`].
    pub fn requests(self) -> impl Iterator<Item = Result<TransactionRequest>> {
        self.reader
            .into_deserialize::<RequestRow>()
            .map(|result| result.map(TransactionRequest::from).map_err(EdcError::from))
    }
}
