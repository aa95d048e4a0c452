//! Compact JWE tokens: RSA-OAEP-256 key wrap, A256CBC-HS512 content
//! encryption.
//!
//! ```text
//! b64u(header).b64u(wrapped key).b64u(iv).b64u(ciphertext).b64u(tag)
//! ```
//!
//! The 64-byte content key splits into a 32-byte HMAC-SHA-512 key followed by
//! a 32-byte AES-256-CBC key. The tag is the first 32 bytes of
//! `HMAC(aad ‖ iv ‖ ciphertext ‖ bit length of aad)`, where the aad is the
//! encoded header. Key and IV come from the caller's [`RandomSource`], fresh
//! for every token.

use aes::Aes256;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use common::CseError;
use hmac::{Hmac, Mac};
use rand_core::OsRng;
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use super::public_key::{key_wrap_error, PublicKey};
use super::random::RandomSource;

/// Key management algorithm named in the header.
pub const ALGORITHM: &str = "RSA-OAEP-256";

/// Content encryption algorithm named in the header.
pub const ENCRYPTION: &str = "A256CBC-HS512";

/// Header `version` value.
pub const VERSION: &str = "1";

/// Byte length of the composite content key.
pub const CONTENT_KEY_LEN: usize = 64;

/// Byte length of the MAC half of the content key.
pub const MAC_KEY_LEN: usize = 32;

/// Byte length of the CBC initialization vector.
pub const IV_LEN: usize = 16;

/// Byte length of the truncated HMAC-SHA-512 tag.
pub const AUTH_TAG_LEN: usize = 32;

/// Separator between the five compact segments.
pub const SEPARATOR: &str = ".";

const BLOCK_LEN: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type HmacSha512 = Hmac<Sha512>;

/// The protected header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweHeader {
    pub alg: String,
    pub enc: String,
    pub version: String,
}

impl Default for JweHeader {
    fn default() -> Self {
        Self {
            alg: ALGORITHM.into(),
            enc: ENCRYPTION.into(),
            version: VERSION.into(),
        }
    }
}

/// Binary parts of a compact JWE, as returned by [`decode`].
#[derive(Clone, PartialEq, Eq)]
pub struct CompactJwe {
    header: JweHeader,
    encoded_header: String,
    encrypted_key: Vec<u8>,
    iv: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

impl CompactJwe {
    pub fn header(&self) -> &JweHeader {
        &self.header
    }

    /// The header exactly as it appears in the token; this is the aad.
    pub fn encoded_header(&self) -> &str {
        &self.encoded_header
    }

    pub fn encrypted_key(&self) -> &[u8] {
        &self.encrypted_key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }
}

impl std::fmt::Debug for CompactJwe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactJwe")
            .field("header", &self.header)
            .field("encrypted_key_len", &self.encrypted_key.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Encrypt `plaintext` for the holder of `public_key` as a compact JWE.
///
/// # Errors
///
/// Same as [`super::seal`]: [`CseError::RandomSourceUnavailable`] if `rng`
/// fails, a non-retryable [`CseError::EncryptionFailed`] if the key cannot
/// wrap 64 bytes under OAEP-SHA-256 (a modulus under 1040 bits), and a
/// transient one for other engine failures.
pub fn encrypt<R: RandomSource + ?Sized>(
    plaintext: &[u8],
    public_key: &PublicKey,
    rng: &R,
) -> Result<String, CseError> {
    let rsa_key = public_key.to_rsa()?;

    let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
    rng.fill_bytes(&mut content_key[..])?;
    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv)?;
    let (mac_key, enc_key) = content_key.split_at(MAC_KEY_LEN);

    let header = serde_json::to_vec(&JweHeader::default())
        .map_err(|e| CseError::encryption("JWE header serialization failed", e))?;
    let encoded_header = URL_SAFE_NO_PAD.encode(header);

    let ciphertext = Aes256CbcEnc::new_from_slices(enc_key, &iv)
        .map_err(|_| CseError::encryption_opaque("AES-CBC key setup failed"))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = auth_tag(mac_key, encoded_header.as_bytes(), &iv, &ciphertext)?;

    let encrypted_key = rsa_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &content_key[..])
        .map_err(key_wrap_error)?;

    Ok([
        encoded_header,
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ]
    .join(SEPARATOR))
}

/// Truncated HMAC-SHA-512 over `aad ‖ iv ‖ ciphertext ‖ be64(aad bits)`.
pub(crate) fn auth_tag(
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<[u8; AUTH_TAG_LEN], CseError> {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(mac_key)
        .map_err(|_| CseError::encryption_opaque("HMAC key setup failed"))?;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&(aad.len() as u64 * 8).to_be_bytes());

    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; AUTH_TAG_LEN];
    tag.copy_from_slice(&full[..AUTH_TAG_LEN]);
    Ok(tag)
}

/// Split a compact JWE into its parts. Nothing is decrypted or verified.
///
/// # Errors
///
/// Returns [`CseError::MalformedToken`] if there are not five segments, a
/// segment is not unpadded base64url, the header names other algorithms, or
/// a part has the wrong length.
pub fn decode(token: &str) -> Result<CompactJwe, CseError> {
    let parts: Vec<&str> = token.split(SEPARATOR).collect();
    if parts.len() != 5 {
        return Err(CseError::MalformedToken(format!(
            "expected 5 '{SEPARATOR}'-separated segments, got {}",
            parts.len()
        )));
    }

    let segment = |i: usize, name: &str| {
        URL_SAFE_NO_PAD
            .decode(parts[i])
            .map_err(|e| CseError::MalformedToken(format!("{name} is not base64url: {e}")))
    };

    let header: JweHeader = serde_json::from_slice(&segment(0, "header")?)
        .map_err(|e| CseError::MalformedToken(format!("header is not JSON: {e}")))?;
    if header.alg != ALGORITHM || header.enc != ENCRYPTION {
        return Err(CseError::MalformedToken(format!(
            "unsupported algorithms {}/{}",
            header.alg, header.enc
        )));
    }

    let encrypted_key = segment(1, "encrypted key")?;
    let iv = segment(2, "iv")?;
    let ciphertext = segment(3, "ciphertext")?;
    let tag = segment(4, "tag")?;

    if encrypted_key.is_empty() {
        return Err(CseError::MalformedToken("encrypted key is empty".into()));
    }
    if iv.len() != IV_LEN {
        return Err(CseError::MalformedToken(format!("iv is {} bytes", iv.len())));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CseError::MalformedToken(format!(
            "ciphertext is {} bytes, not a whole number of blocks",
            ciphertext.len()
        )));
    }
    if tag.len() != AUTH_TAG_LEN {
        return Err(CseError::MalformedToken(format!("tag is {} bytes", tag.len())));
    }

    Ok(CompactJwe {
        header,
        encoded_header: parts[0].to_owned(),
        encrypted_key,
        iv,
        ciphertext,
        tag,
    })
}
