use crate::error::{EdcError, Result};
use chrono::{DateTime, Utc};

/// Character substituted for every hidden card digit.
pub const MASK_CHAR: char = 'X';

/// Placeholder stored wherever a CVV would otherwise appear.
pub const REDACTED_CVV: &str = "***";

/// Number of trailing card characters left visible after masking.
pub const VISIBLE_SUFFIX_LEN: usize = 4;

/// Masks a card number, keeping only the last four characters.
///
/// The masked value has the same length as the input. Fails with
/// `InvalidInput` when fewer than four characters are supplied.
pub fn mask_card_number(card_number: &str) -> Result<String> {
    let len = card_number.chars().count();
    if len < VISIBLE_SUFFIX_LEN {
        return Err(EdcError::InvalidInput(format!(
            "card number must have at least {VISIBLE_SUFFIX_LEN} characters, got {len}"
        )));
    }

    let hidden = len - VISIBLE_SUFFIX_LEN;
    let mut masked = String::with_capacity(card_number.len());
    masked.extend(std::iter::repeat_n(MASK_CHAR, hidden));
    masked.extend(card_number.chars().skip(hidden));
    Ok(masked)
}

/// Strips the mask characters from a masked card number.
pub fn unmask_card_number(masked: &str) -> String {
    masked.chars().filter(|c| *c != MASK_CHAR).collect()
}

/// Builds a transaction id from the creation time plus a random suffix.
///
/// The timestamp prefix keeps ids sortable; the suffix keeps two
/// transactions created in the same second apart.
pub fn generate_transaction_id(at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", at.format("%Y%m%d%H%M%S"), &suffix[..8])
}
