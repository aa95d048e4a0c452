//! Client-side encryption of card fields.
//!
//! Card values are sealed on the client before they enter a payment request.
//! Each value is wrapped in a JSON payload with its generation time,
//! encrypted with a one-time AES-256-CCM key, and that key is encrypted with
//! the merchant's RSA public key. The result is an opaque token:
//!
//! ```text
//! adyenan0_1_1$<base64(wrapped key)>$<base64(nonce ‖ ciphertext ‖ tag)>
//! ```
//!
//! [`TokenFormat::Jwe`] switches an encryptor to compact JWE tokens
//! (RSA-OAEP-256, A256CBC-HS512) instead.
//!
//! # Usage
//!
//! ```no_run
//! use cse::{Card, FieldEncryptor, GenerationTime};
//!
//! # fn run(public_key: &str) -> Result<(), cse::CseError> {
//! let encryptor = FieldEncryptor::new();
//! let card = Card {
//!     number: Some("4111 1111 1111 1111".into()),
//!     expiry_month: Some("03".into()),
//!     expiry_year: Some("2030".into()),
//!     security_code: Some("737".into()),
//!     holder_name: None,
//! };
//! let encrypted = encryptor.encrypt_fields(&card, &GenerationTime::now(), public_key)?;
//! # let _ = encrypted;
//! # Ok(())
//! # }
//! ```
//!
//! # Invariants
//!
//! - A fresh AES key and nonce per token; fields of one card never share them.
//! - Card values and key material never appear in logs or `Debug` output.
//! - Failures are returned, never swallowed. There is no plaintext fallback.

pub mod card;
pub mod crypto;
pub mod encryptor;
pub mod key_cache;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use card::{Card, CardField, GenerationTime};
pub use common::{protocol::EncryptedCard, CseError};
pub use crypto::{OsRandom, PublicKey, RandomSource};
pub use encryptor::{FieldEncryptor, TokenFormat};
pub use key_cache::KeyCache;
