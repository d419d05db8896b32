//! Framing for the payment terminal's serial-style protocol.
//!
//! Every message travels as `STX | payload | ETX | LRC`, where the LRC is
//! the XOR of every byte after STX up to and including ETX.
//!
//! Requests carry a three byte transaction code followed by the amount in
//! minor units as twelve zero-padded ASCII digits. Responses carry a three
//! byte command, a two digit response code (`"00"` approves) and an
//! optional ASCII message.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;

pub const CODE_LEN: usize = 3;
pub const AMOUNT_FIELD_LEN: usize = 12;
pub const RESPONSE_CODE_LEN: usize = 2;
pub const APPROVED_CODE: &str = "00";

const MAX_AMOUNT_MINOR: u64 = 999_999_999_999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("frame does not start with STX")]
    MissingStx,
    #[error("frame has no ETX before the LRC byte")]
    MissingEtx,
    #[error("LRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    LrcMismatch { expected: u8, actual: u8 },
    #[error("malformed frame length: {0} bytes")]
    MalformedLength(usize),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("amount {0} does not fit the 12-digit amount field")]
    AmountOverflow(Decimal),
    #[error("invalid transaction code {0:?}")]
    InvalidCode(String),
}

/// XOR of every byte in `bytes`.
pub fn lrc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Wraps `payload` as `STX | payload | ETX | LRC`.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.push(STX);
    frame.extend_from_slice(payload);
    frame.push(ETX);
    frame.push(lrc(&frame[1..]));
    frame
}

/// Validates the framing of `frame` and returns its payload.
pub fn decode_frame(frame: &[u8]) -> Result<&[u8], ProtocolError> {
    let len = frame.len();
    if len < 3 {
        return Err(ProtocolError::MalformedLength(len));
    }
    if frame[0] != STX {
        return Err(ProtocolError::MissingStx);
    }
    if frame[len - 2] != ETX {
        return Err(ProtocolError::MissingEtx);
    }

    let expected = lrc(&frame[1..len - 1]);
    let actual = frame[len - 1];
    if expected != actual {
        return Err(ProtocolError::LrcMismatch { expected, actual });
    }

    let payload = &frame[1..len - 2];
    if payload.iter().any(|b| *b == STX || *b == ETX) {
        return Err(ProtocolError::MalformedPayload(
            "control byte inside payload".to_string(),
        ));
    }
    Ok(payload)
}

/// Three byte terminal transaction code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionCode([u8; CODE_LEN]);

impl TransactionCode {
    pub const SALE: Self = Self(*b"T00");

    pub fn as_bytes(&self) -> &[u8; CODE_LEN] {
        &self.0
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let code: [u8; CODE_LEN] = bytes
            .try_into()
            .map_err(|_| ProtocolError::InvalidCode(String::from_utf8_lossy(bytes).into_owned()))?;
        if code.iter().all(u8::is_ascii_alphanumeric) {
            Ok(Self(code))
        } else {
            Err(ProtocolError::InvalidCode(
                String::from_utf8_lossy(&code).into_owned(),
            ))
        }
    }
}

impl FromStr for TransactionCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for TransactionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only ASCII alphanumerics get past `from_bytes`.
        f.write_str(std::str::from_utf8(&self.0).unwrap_or("???"))
    }
}

/// Converts a major-unit amount into minor units (two decimal places),
/// rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<u64, ProtocolError> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|minor| minor.to_u64())
        .filter(|minor| *minor <= MAX_AMOUNT_MINOR)
        .ok_or(ProtocolError::AmountOverflow(amount))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalRequest {
    pub code: TransactionCode,
    pub amount_minor: u64,
}

impl TerminalRequest {
    pub fn new(code: TransactionCode, amount: Decimal) -> Result<Self, ProtocolError> {
        Ok(Self {
            code,
            amount_minor: to_minor_units(amount)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(CODE_LEN + AMOUNT_FIELD_LEN);
        payload.extend_from_slice(self.code.as_bytes());
        let amount = format!("{:0width$}", self.amount_minor, width = AMOUNT_FIELD_LEN);
        payload.extend_from_slice(amount.as_bytes());
        encode_frame(&payload)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let payload = decode_frame(frame)?;
        if payload.len() != CODE_LEN + AMOUNT_FIELD_LEN {
            return Err(ProtocolError::MalformedLength(frame.len()));
        }

        let code = TransactionCode::from_bytes(&payload[..CODE_LEN])?;
        let digits = &payload[CODE_LEN..];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(ProtocolError::MalformedPayload(
                "amount field is not numeric".to_string(),
            ));
        }
        let amount_minor = std::str::from_utf8(digits)
            .ok()
            .and_then(|d| d.parse().ok())
            .ok_or_else(|| ProtocolError::MalformedPayload("amount field".to_string()))?;

        Ok(Self { code, amount_minor })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalResponse {
    pub command: TransactionCode,
    pub response_code: String,
    pub message: String,
}

impl TerminalResponse {
    pub fn is_approved(&self) -> bool {
        self.response_code == APPROVED_CODE
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(self.command.as_bytes());
        payload.extend_from_slice(self.response_code.as_bytes());
        payload.extend_from_slice(self.message.as_bytes());
        encode_frame(&payload)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let payload = decode_frame(frame)?;
        if payload.len() < CODE_LEN + RESPONSE_CODE_LEN {
            return Err(ProtocolError::MalformedLength(frame.len()));
        }

        let command = TransactionCode::from_bytes(&payload[..CODE_LEN])?;
        let code = &payload[CODE_LEN..CODE_LEN + RESPONSE_CODE_LEN];
        if !code.iter().all(u8::is_ascii_digit) {
            return Err(ProtocolError::MalformedPayload(format!(
                "response code {:?} is not numeric",
                String::from_utf8_lossy(code)
            )));
        }
        let message = &payload[CODE_LEN + RESPONSE_CODE_LEN..];
        if !message.is_ascii() {
            return Err(ProtocolError::MalformedPayload(
                "message is not ASCII".to_string(),
            ));
        }

        Ok(Self {
            command,
            response_code: String::from_utf8_lossy(code).into_owned(),
            message: String::from_utf8_lossy(message).into_owned(),
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "command": self.command.to_string(),
            "response_code": self.response_code,
            "message": self.message,
        })
    }
}
