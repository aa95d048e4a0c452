//! Transfer types exchanged with the checkout layer.
//!
//! Field names follow the payment request JSON the backend expects
//! (`encryptedCardNumber`, `encryptedSecurityCode`, ...).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Encrypted output
// ---------------------------------------------------------------------------

/// Per-field tokens for one card.
///
/// Each present value is an independent token with its own symmetric key and
/// nonce. Fields the caller did not supply stay `None` and are omitted from
/// the JSON form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedCard {
    /// Token for the card number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_card_number: Option<String>,
    /// Token for the expiry month.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_expiry_month: Option<String>,
    /// Token for the expiry year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_expiry_year: Option<String>,
    /// Token for the security code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_security_code: Option<String>,
}

impl EncryptedCard {
    /// Iterate over the tokens that are present.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        [
            &self.encrypted_card_number,
            &self.encrypted_expiry_month,
            &self.encrypted_expiry_year,
            &self.encrypted_security_code,
        ]
        .into_iter()
        .filter_map(|t| t.as_deref())
    }
}

/// A single token covering a whole card, holder name included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedCardToken {
    /// The token string.
    pub encrypted_data: String,
}

// ---------------------------------------------------------------------------
// Plaintext input
// ---------------------------------------------------------------------------

/// Raw card details as handed over by the input layer.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInput {
    /// Card number, whitespace allowed.
    #[serde(default)]
    pub number: Option<String>,
    /// Expiry month, e.g. `"3"` or `"03"`.
    #[serde(default)]
    pub expiry_month: Option<String>,
    /// Four-digit expiry year.
    #[serde(default)]
    pub expiry_year: Option<String>,
    /// Security code (CVC/CVV).
    #[serde(default, alias = "cvc")]
    pub security_code: Option<String>,
    /// Card holder name.
    #[serde(default)]
    pub holder_name: Option<String>,
    /// Generation time to embed verbatim. Defaults to "now" when absent.
    #[serde(default)]
    pub generation_time: Option<String>,
}

impl std::fmt::Debug for CardInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Card values never reach logs.
        f.debug_struct("CardInput")
            .field("number", &self.number.as_ref().map(|_| "[REDACTED]"))
            .field("expiry_month", &self.expiry_month.as_ref().map(|_| "[REDACTED]"))
            .field("expiry_year", &self.expiry_year.as_ref().map(|_| "[REDACTED]"))
            .field("security_code", &self.security_code.as_ref().map(|_| "[REDACTED]"))
            .field("holder_name", &self.holder_name.as_ref().map(|_| "[REDACTED]"))
            .field("generation_time", &self.generation_time)
            .finish()
    }
}
