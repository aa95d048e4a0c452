//! Parsing of merchant public keys.
//!
//! Merchants publish their RSA key as `"<exponent-hex>|<modulus-hex>"`, e.g.
//! `10001|A5C3948E...` for exponent 65537 and a 2048-bit modulus.

use std::str::FromStr;

use common::CseError;
use rsa::{BigUint, RsaPublicKey};

/// Separator between the exponent and modulus segments.
pub const KEY_SEPARATOR: char = '|';

/// An immutable, parsed merchant RSA public key.
///
/// Parsing only validates the textual format. Whether the RSA engine accepts
/// the numbers (exponent range, modulus size) is checked when a fresh engine
/// is built for each encryption, and is reported as
/// a non-retryable [`CseError::EncryptionFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    exponent: BigUint,
    modulus: BigUint,
}

impl PublicKey {
    /// Parse a `"<exponent-hex>|<modulus-hex>"` key string.
    ///
    /// # Errors
    ///
    /// Returns [`CseError::InvalidKeyFormat`] if the string does not have
    /// exactly two segments, or if either segment is empty, not hexadecimal,
    /// or zero.
    pub fn parse(raw: &str) -> Result<Self, CseError> {
        let segments: Vec<&str> = raw.split(KEY_SEPARATOR).collect();
        if segments.len() != 2 {
            return Err(CseError::InvalidKeyFormat(format!(
                "expected 2 '{KEY_SEPARATOR}'-separated segments, got {}",
                segments.len()
            )));
        }

        let exponent = parse_component(segments[0], "exponent")?;
        let modulus = parse_component(segments[1], "modulus")?;
        Ok(Self { exponent, modulus })
    }

    /// The public exponent.
    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// The modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Bit length of the modulus.
    pub fn modulus_bits(&self) -> usize {
        self.modulus.bits()
    }

    /// Build a fresh RSA engine key for one encryption call.
    pub(crate) fn to_rsa(&self) -> Result<RsaPublicKey, CseError> {
        RsaPublicKey::new(self.modulus.clone(), self.exponent.clone())
            .map_err(|e| CseError::key_rejected("RSA engine rejected the public key", e))
    }
}

/// Classify a key-wrap failure. A modulus too small for the padding is a
/// property of the key and will not go away on retry.
pub(crate) fn key_wrap_error(e: rsa::Error) -> CseError {
    match e {
        rsa::Error::MessageTooLong => CseError::key_rejected("RSA key wrap failed", e),
        e => CseError::encryption("RSA key wrap failed", e),
    }
}

impl FromStr for PublicKey {
    type Err = CseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_component(segment: &str, name: &str) -> Result<BigUint, CseError> {
    if segment.is_empty() {
        return Err(CseError::InvalidKeyFormat(format!("{name} segment is empty")));
    }

    // Exponents are usually published with an odd digit count ("10001").
    let decoded = if segment.len() % 2 == 1 {
        hex::decode(format!("0{segment}"))
    } else {
        hex::decode(segment)
    }
    .map_err(|e| CseError::InvalidKeyFormat(format!("{name} is not hexadecimal: {e}")))?;

    if decoded.iter().all(|b| *b == 0) {
        return Err(CseError::InvalidKeyFormat(format!("{name} must be non-zero")));
    }
    Ok(BigUint::from_bytes_be(&decoded))
}
