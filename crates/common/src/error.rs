//! Error taxonomy shared by the encryption library and its callers.

use thiserror::Error;

/// Boxed underlying cause carried by [`CseError::EncryptionFailed`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level client-side encryption error.
///
/// Every variant is surfaced synchronously to the immediate caller. A failed
/// encryption never degrades to sending plaintext:
/// - [`CseError::InvalidKeyFormat`] → caller must supply a corrected key
/// - [`CseError::InvalidFieldName`] → caller must supply a usable field name
/// - [`CseError::EncryptionFailed`] → retryable only when `transient`
/// - [`CseError::RandomSourceUnavailable`] → fatal
/// - [`CseError::MalformedToken`] → the inspected string is not a token
#[derive(Debug, Error)]
pub enum CseError {
    /// The merchant public key is not `"<exponent-hex>|<modulus-hex>"`.
    #[error("invalid public key format: {0}")]
    InvalidKeyFormat(String),

    /// A field name would collide with a reserved payload key or is empty.
    #[error("invalid field name: {0}")]
    InvalidFieldName(String),

    /// The AEAD or RSA engine rejected the operation.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Short description of the failing step.
        message: String,
        /// Error reported by the underlying cipher, if any.
        #[source]
        source: Option<Cause>,
        /// `false` when the inputs themselves were refused (e.g. an RSA key the
        /// engine cannot use); the same call will fail again.
        transient: bool,
    },

    /// The OS CSPRNG could not produce bytes.
    #[error("secure random source unavailable: {0}")]
    RandomSourceUnavailable(String),

    /// A string handed to the token decoder does not match the token layout.
    #[error("malformed token: {0}")]
    MalformedToken(String),
}

impl CseError {
    /// Build an [`CseError::EncryptionFailed`] wrapping the engine's error.
    pub fn encryption<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CseError::EncryptionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
            transient: true,
        }
    }

    /// Build a non-transient [`CseError::EncryptionFailed`] for a key the RSA
    /// engine refuses (exponent out of range, modulus too small for the
    /// padding).
    pub fn key_rejected<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CseError::EncryptionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
            transient: false,
        }
    }

    /// Build an [`CseError::EncryptionFailed`] with no structured cause.
    ///
    /// Used where the engine reports an opaque failure (e.g. `aead::Error`
    /// carries no detail).
    pub fn encryption_opaque(message: impl Into<String>) -> Self {
        CseError::EncryptionFailed {
            message: message.into(),
            source: None,
            transient: true,
        }
    }

    /// Returns `true` if retrying with fresh providers may succeed.
    ///
    /// Only transient engine failures qualify. Rejected keys and malformed
    /// input need new input, and a missing random source is fatal.
    pub fn is_retryable(&self) -> bool {
        match self {
            CseError::EncryptionFailed { transient, .. } => *transient,
            CseError::InvalidKeyFormat(_)
            | CseError::InvalidFieldName(_)
            | CseError::RandomSourceUnavailable(_)
            | CseError::MalformedToken(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn only_transient_encryption_failures_are_retryable() {
        assert!(CseError::encryption_opaque("ccm").is_retryable());
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "join");
        assert!(CseError::encryption("task", cause).is_retryable());
        assert!(!CseError::InvalidKeyFormat("x".into()).is_retryable());
        assert!(!CseError::InvalidFieldName("x".into()).is_retryable());
        assert!(!CseError::RandomSourceUnavailable("x".into()).is_retryable());
        assert!(!CseError::MalformedToken("x".into()).is_retryable());
    }

    #[test]
    fn display_includes_message() {
        let e = CseError::InvalidKeyFormat("expected 2 segments, got 3".into());
        assert!(e.to_string().contains("expected 2 segments"));
    }

    #[test]
    fn encryption_failure_keeps_source() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "engine fault");
        let e = CseError::encryption("rsa wrap", cause);
        assert!(e.to_string().contains("rsa wrap"));
        let source = e.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("engine fault"));
    }

    #[test]
    fn rejected_key_is_permanent() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "message too long");
        let e = CseError::key_rejected("RSA key wrap failed", cause);
        assert!(matches!(e, CseError::EncryptionFailed { transient: false, .. }));
        assert!(!e.is_retryable());
        assert!(e.source().is_some());
    }
}
