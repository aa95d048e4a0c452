//! Cryptographic primitives for client-side encryption.
//!
//! This module knows nothing about cards or payloads. It turns plaintext bytes
//! and a merchant key into a token string.
//!
//! # Token formats
//!
//! ```text
//! adyenan0_1_1$<base64(RSA-PKCS1v15(aes key))>$<base64(nonce ‖ AES-CCM(payload) ‖ tag)>
//! ```
//!
//! The default. [`jwe`] produces the alternative compact JWE
//! (RSA-OAEP-256 / A256CBC-HS512) for backends that accept it.

pub mod envelope;
pub mod jwe;
pub mod public_key;
pub mod random;
pub mod token;

pub use envelope::{seal, Envelope, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use public_key::PublicKey;
pub use random::{OsRandom, RandomSource};
