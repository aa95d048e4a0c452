//! Token serialization.
//!
//! ```text
//! adyenan0_1_1$<base64(wrapped key)>$<base64(nonce ‖ ciphertext ‖ tag)>
//! ```
//!
//! The prefix and version are agreed with the backend and are part of the
//! wire contract; they are constants, not configuration.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::CseError;

use super::envelope::{Envelope, NONCE_LEN, TAG_LEN};

/// SDK identifier that opens every token.
pub const PREFIX: &str = "adyenan";

/// Token format version.
pub const VERSION: &str = "0_1_1";

/// Separator between the header and the two base64 segments.
pub const SEPARATOR: char = '$';

/// Serialize an [`Envelope`] into its token string.
pub fn encode(envelope: &Envelope) -> String {
    let wrapped_key = STANDARD.encode(envelope.wrapped_key());
    let sealed = STANDARD.encode(envelope.sealed());

    let mut token =
        String::with_capacity(PREFIX.len() + VERSION.len() + wrapped_key.len() + sealed.len() + 2);
    token.push_str(PREFIX);
    token.push_str(VERSION);
    token.push(SEPARATOR);
    token.push_str(&wrapped_key);
    token.push(SEPARATOR);
    token.push_str(&sealed);
    token
}

/// Split a token back into its binary parts.
///
/// This is structural inspection only; nothing is decrypted.
///
/// # Errors
///
/// Returns [`CseError::MalformedToken`] if the header is not
/// `PREFIX VERSION`, the segment count is wrong, a segment is not valid
/// base64, or the sealed part is shorter than a nonce plus a tag.
pub fn decode(token: &str) -> Result<Envelope, CseError> {
    let parts: Vec<&str> = token.split(SEPARATOR).collect();
    if parts.len() != 3 {
        return Err(CseError::MalformedToken(format!(
            "expected 3 '{SEPARATOR}'-separated parts, got {}",
            parts.len()
        )));
    }

    let header = parts[0];
    if header.strip_prefix(PREFIX) != Some(VERSION) {
        return Err(CseError::MalformedToken(format!(
            "unexpected header {header:?}"
        )));
    }

    let wrapped_key = STANDARD
        .decode(parts[1])
        .map_err(|e| CseError::MalformedToken(format!("wrapped key is not base64: {e}")))?;
    let sealed = STANDARD
        .decode(parts[2])
        .map_err(|e| CseError::MalformedToken(format!("envelope is not base64: {e}")))?;

    if wrapped_key.is_empty() {
        return Err(CseError::MalformedToken("wrapped key is empty".into()));
    }
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CseError::MalformedToken(format!(
            "envelope is {} bytes, shorter than nonce and tag",
            sealed.len()
        )));
    }

    Ok(Envelope::from_parts(wrapped_key, sealed))
}
