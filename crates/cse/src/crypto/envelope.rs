//! Hybrid envelope: AES-256-CCM over the payload, RSA over the AES key.
//!
//! **Wire constraints:** the key wrap is RSA PKCS#1 v1.5 and the AEAD is
//! AES-CCM with a 12-byte nonce and a 64-bit tag. Both are pinned by the
//! backend that consumes the token. Do not switch to OAEP or another AEAD
//! without a new token version.
//!
//! Every call draws a new AES key *and* a new nonce, so a (key, nonce) pair is
//! never used twice. Cipher and RSA engine objects are built per call and
//! dropped before returning; nothing is shared between concurrent calls.

use aes::Aes256;
use ccm::{
    aead::{Aead, KeyInit},
    consts::{U12, U8},
    Ccm,
};
use common::CseError;
use rand_core::OsRng;
use rsa::Pkcs1v15Encrypt;
use zeroize::Zeroizing;

use super::public_key::{key_wrap_error, PublicKey};
use super::random::RandomSource;

/// Byte length of the one-time AES-256 key.
pub const KEY_LEN: usize = 32;

/// Byte length of the CCM nonce.
pub const NONCE_LEN: usize = 12;

/// Byte length of the CCM authentication tag.
pub const TAG_LEN: usize = 8;

type Aes256Ccm = Ccm<Aes256, U8, U12>;

/// Output of one [`seal`] call.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    wrapped_key: Vec<u8>,
    sealed: Vec<u8>,
}

impl Envelope {
    pub(crate) fn from_parts(wrapped_key: Vec<u8>, sealed: Vec<u8>) -> Self {
        Self {
            wrapped_key,
            sealed,
        }
    }

    /// The AES key encrypted under the merchant RSA key.
    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }

    /// `nonce ‖ ciphertext ‖ tag`.
    pub fn sealed(&self) -> &[u8] {
        &self.sealed
    }

    /// The nonce prefix of [`Envelope::sealed`].
    pub fn nonce(&self) -> &[u8] {
        &self.sealed[..NONCE_LEN.min(self.sealed.len())]
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("wrapped_key_len", &self.wrapped_key.len())
            .field("sealed_len", &self.sealed.len())
            .finish()
    }
}

/// Encrypt `plaintext` for the holder of `public_key`.
///
/// # Errors
///
/// Returns [`CseError::RandomSourceUnavailable`] if `rng` fails, and
/// [`CseError::EncryptionFailed`] if the RSA engine rejects the key or the
/// AEAD fails. A key the engine cannot use (e.g. a modulus too small for
/// PKCS#1 v1.5 padding of a 32-byte key) is reported as not retryable. No
/// partial envelope is ever returned.
pub fn seal<R: RandomSource + ?Sized>(
    plaintext: &[u8],
    public_key: &PublicKey,
    rng: &R,
) -> Result<Envelope, CseError> {
    let rsa_key = public_key.to_rsa()?;

    let mut content_key = Zeroizing::new([0u8; KEY_LEN]);
    rng.fill_bytes(&mut content_key[..])?;
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce)?;

    let cipher = Aes256Ccm::new((&*content_key).into());
    let ciphertext = cipher
        .encrypt(ccm::aead::Nonce::<Aes256Ccm>::from_slice(&nonce), plaintext)
        .map_err(|_| CseError::encryption_opaque("AES-CCM encryption failed"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);

    // PKCS#1 v1.5 padding bytes come straight from the OS CSPRNG.
    let wrapped_key = rsa_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, &content_key[..])
        .map_err(key_wrap_error)?;

    Ok(Envelope {
        wrapped_key,
        sealed,
    })
}
