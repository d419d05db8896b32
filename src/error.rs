use crate::interfaces::wire::frame::ProtocolError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdcError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EdcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_converts() {
        let err: EdcError = ProtocolError::MissingStx.into();
        assert!(matches!(err, EdcError::Protocol(ProtocolError::MissingStx)));
        assert!(err.to_string().starts_with("Protocol error:"));
    }

    #[test]
    fn test_timeout_message() {
        let err = EdcError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "Timed out after 2s");
    }
}
