//! [`FieldEncryptor`]: turns card values into tokens.
//!
//! Each call is a one-shot pipeline: payload → cached key lookup → fresh
//! envelope → token. No cipher state outlives a call, so one encryptor can be
//! shared freely between threads.

use std::sync::Arc;

use common::{protocol::EncryptedCard, CseError};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::card::{card_payload, field_payload, Card, CardField, GenerationTime};
use crate::crypto::{jwe, seal, token, OsRandom, PublicKey, RandomSource};
use crate::key_cache::KeyCache;

/// Token layout produced by a [`FieldEncryptor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFormat {
    /// `adyenan0_1_1$…`: RSA PKCS#1 v1.5 and AES-256-CCM.
    #[default]
    Legacy,
    /// Compact JWE: RSA-OAEP-256 and A256CBC-HS512.
    Jwe,
}

/// Facade over key parsing, envelope sealing and token encoding.
///
/// Cloning is cheap; clones share the key cache and random source.
pub struct FieldEncryptor<R = OsRandom> {
    cache: KeyCache,
    rng: Arc<R>,
    format: TokenFormat,
}

impl FieldEncryptor<OsRandom> {
    /// Create an encryptor with an empty key cache and the OS random source.
    pub fn new() -> Self {
        Self::with_cache(KeyCache::new())
    }

    /// Create an encryptor that parses keys through an existing cache.
    pub fn with_cache(cache: KeyCache) -> Self {
        Self::with_random_source(cache, OsRandom)
    }
}

impl<R: RandomSource> FieldEncryptor<R> {
    /// Create an encryptor drawing key and nonce material from `rng`.
    pub fn with_random_source(cache: KeyCache, rng: R) -> Self {
        Self {
            cache,
            rng: Arc::new(rng),
            format: TokenFormat::default(),
        }
    }

    /// Produce tokens in `format` instead of the legacy layout.
    pub fn with_format(mut self, format: TokenFormat) -> Self {
        self.format = format;
        self
    }

    /// The token layout this encryptor produces.
    pub fn format(&self) -> TokenFormat {
        self.format
    }

    /// The key cache used by this encryptor.
    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    /// Encrypt one value under `field` into a token.
    ///
    /// `value` and `generation_time` are embedded verbatim.
    ///
    /// # Errors
    ///
    /// [`CseError::InvalidKeyFormat`] for a malformed key,
    /// [`CseError::InvalidFieldName`] if `field` is empty or `"generationtime"`,
    /// [`CseError::EncryptionFailed`] for engine errors and
    /// [`CseError::RandomSourceUnavailable`] if the CSPRNG fails.
    pub fn encrypt_field(
        &self,
        field: &str,
        value: &str,
        generation_time: &GenerationTime,
        public_key: &str,
    ) -> Result<String, CseError> {
        let key = self.cache.get_or_parse(public_key)?;
        let payload = field_payload(field, value, generation_time)?;
        self.seal_token(&payload, &key, field)
    }

    /// Encrypt number, expiry month, expiry year and security code of `card`
    /// as independent tokens.
    ///
    /// The key is parsed once; every present field gets its own envelope
    /// with its own AES key and nonce. The card is normalized first.
    ///
    /// # Errors
    ///
    /// Fails on the first field that cannot be encrypted; no partial
    /// [`EncryptedCard`] is returned.
    pub fn encrypt_fields(
        &self,
        card: &Card,
        generation_time: &GenerationTime,
        public_key: &str,
    ) -> Result<EncryptedCard, CseError> {
        let card = card.normalized();
        let key = self.cache.get_or_parse(public_key)?;

        let encrypt = |field: CardField| -> Result<Option<String>, CseError> {
            card.get(field)
                .map(|value| {
                    let payload = field_payload(field.key(), value, generation_time)?;
                    self.seal_token(&payload, &key, field.key())
                })
                .transpose()
        };

        Ok(EncryptedCard {
            encrypted_card_number: encrypt(CardField::Number)?,
            encrypted_expiry_month: encrypt(CardField::ExpiryMonth)?,
            encrypted_expiry_year: encrypt(CardField::ExpiryYear)?,
            encrypted_security_code: encrypt(CardField::SecurityCode)?,
        })
    }

    /// Encrypt the whole card, holder name included, into a single token.
    ///
    /// # Errors
    ///
    /// Same as [`FieldEncryptor::encrypt_field`].
    pub fn encrypt_card(
        &self,
        card: &Card,
        generation_time: &GenerationTime,
        public_key: &str,
    ) -> Result<String, CseError> {
        let key = self.cache.get_or_parse(public_key)?;
        let payload = card_payload(&card.normalized(), generation_time)?;
        self.seal_token(&payload, &key, "card")
    }

    fn seal_token(&self, payload: &[u8], key: &PublicKey, label: &str) -> Result<String, CseError> {
        let rng = self.rng.as_ref();
        let sealed = match self.format {
            TokenFormat::Legacy => seal(payload, key, rng).map(|envelope| token::encode(&envelope)),
            TokenFormat::Jwe => jwe::encrypt(payload, key, rng),
        };
        let token = sealed.map_err(|e| {
            warn!(
                field = label,
                format = ?self.format,
                retryable = e.is_retryable(),
                error = %e,
                "encryption failed"
            );
            e
        })?;
        debug!(field = label, format = ?self.format, "field encrypted");
        Ok(token)
    }
}

impl<R: RandomSource + 'static> FieldEncryptor<R> {
    /// [`FieldEncryptor::encrypt_field`] on tokio's blocking pool.
    pub async fn encrypt_field_async(
        &self,
        field: String,
        value: String,
        generation_time: GenerationTime,
        public_key: String,
    ) -> Result<String, CseError> {
        let this = self.clone();
        run_blocking(move || this.encrypt_field(&field, &value, &generation_time, &public_key))
            .await
    }

    /// [`FieldEncryptor::encrypt_fields`] on tokio's blocking pool.
    pub async fn encrypt_fields_async(
        &self,
        card: Card,
        generation_time: GenerationTime,
        public_key: String,
    ) -> Result<EncryptedCard, CseError> {
        let this = self.clone();
        run_blocking(move || this.encrypt_fields(&card, &generation_time, &public_key)).await
    }

    /// [`FieldEncryptor::encrypt_card`] on tokio's blocking pool.
    pub async fn encrypt_card_async(
        &self,
        card: Card,
        generation_time: GenerationTime,
        public_key: String,
    ) -> Result<String, CseError> {
        let this = self.clone();
        run_blocking(move || this.encrypt_card(&card, &generation_time, &public_key)).await
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T, CseError>
where
    F: FnOnce() -> Result<T, CseError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| CseError::encryption("encryption task did not complete", e))?
}

impl<R> Clone for FieldEncryptor<R> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            rng: Arc::clone(&self.rng),
            format: self.format,
        }
    }
}

impl Default for FieldEncryptor<OsRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> std::fmt::Debug for FieldEncryptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldEncryptor")
            .field("cached_keys", &self.cache.len())
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::GENERATION_TIME_KEY;
    use crate::crypto::{random::MockRandomSource, NONCE_LEN, TAG_LEN};
    use crate::test_support::{TEST_PUBLIC_KEY, UNDERSIZED_PUBLIC_KEY};

    fn time() -> GenerationTime {
        GenerationTime::verbatim("2024-05-01T10:15:30.123Z")
    }

    fn full_card() -> Card {
        Card {
            number: Some("4111 1111 1111 1111".into()),
            expiry_month: Some("03".into()),
            expiry_year: Some("2030".into()),
            security_code: Some("737".into()),
            holder_name: Some("Jane Public".into()),
        }
    }

    fn assert_well_formed(token: &str) {
        assert!(token.starts_with("adyenan0_1_1$"), "bad header: {token}");
        let envelope = token::decode(token).unwrap();
        assert_eq!(envelope.wrapped_key().len(), 256);
        assert!(envelope.sealed().len() > NONCE_LEN + TAG_LEN);
    }

    #[test]
    fn security_code_scenario() {
        let enc = FieldEncryptor::new();
        let a = enc.encrypt_field("cvc", "737", &time(), TEST_PUBLIC_KEY).unwrap();
        let b = enc.encrypt_field("cvc", "737", &time(), TEST_PUBLIC_KEY).unwrap();
        assert_well_formed(&a);
        assert_well_formed(&b);
        assert_ne!(a, b);
        assert!(!a.contains("737"));
        assert!(!b.contains("737"));
    }

    #[test]
    fn same_card_number_never_yields_same_token() {
        let enc = FieldEncryptor::new();
        let a = enc
            .encrypt_field("number", "4111111111111111", &time(), TEST_PUBLIC_KEY)
            .unwrap();
        let b = enc
            .encrypt_field("number", "4111111111111111", &time(), TEST_PUBLIC_KEY)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn sealed_length_matches_payload() {
        let enc = FieldEncryptor::new();
        let token = enc
            .encrypt_field("number", "4111111111111111", &time(), TEST_PUBLIC_KEY)
            .unwrap();
        let payload = field_payload("number", "4111111111111111", &time()).unwrap();
        let envelope = token::decode(&token).unwrap();
        assert_eq!(envelope.sealed().len(), NONCE_LEN + payload.len() + TAG_LEN);
    }

    #[test]
    fn card_fields_get_independent_envelopes() {
        let enc = FieldEncryptor::new();
        let encrypted = enc.encrypt_fields(&full_card(), &time(), TEST_PUBLIC_KEY).unwrap();

        let tokens: Vec<&str> = encrypted.tokens().collect();
        assert_eq!(tokens.len(), 4);
        let envelopes: Vec<_> = tokens.iter().map(|t| token::decode(t).unwrap()).collect();
        for (i, a) in envelopes.iter().enumerate() {
            for b in &envelopes[i + 1..] {
                assert_ne!(a.nonce(), b.nonce());
                assert_ne!(a.wrapped_key(), b.wrapped_key());
            }
        }
        assert_eq!(enc.cache().len(), 1);
    }

    #[test]
    fn absent_card_fields_stay_empty() {
        let enc = FieldEncryptor::new();
        let card = Card {
            number: Some("4111111111111111".into()),
            security_code: Some("  ".into()),
            ..Default::default()
        };
        let encrypted = enc.encrypt_fields(&card, &time(), TEST_PUBLIC_KEY).unwrap();
        assert!(encrypted.encrypted_card_number.is_some());
        assert!(encrypted.encrypted_expiry_month.is_none());
        assert!(encrypted.encrypted_expiry_year.is_none());
        assert!(encrypted.encrypted_security_code.is_none());
    }

    #[test]
    fn combined_card_token() {
        let enc = FieldEncryptor::new();
        let card = full_card();
        let token = enc.encrypt_card(&card, &time(), TEST_PUBLIC_KEY).unwrap();
        assert_well_formed(&token);
        assert!(!token.contains("Jane"));

        let payload = card_payload(&card.normalized(), &time()).unwrap();
        let envelope = token::decode(&token).unwrap();
        assert_eq!(envelope.sealed().len(), NONCE_LEN + payload.len() + TAG_LEN);
    }

    #[test]
    fn invalid_key_is_reported() {
        let enc = FieldEncryptor::new();
        for key in ["", "only-one-segment", "nonhex|nonhex", "abc|def|ghi"] {
            let err = enc.encrypt_field("cvc", "737", &time(), key).unwrap_err();
            assert!(matches!(err, CseError::InvalidKeyFormat(_)), "{key:?}: {err}");
        }
        assert!(enc.cache().is_empty());
    }

    #[test]
    fn undersized_key_fails_whole_card() {
        let enc = FieldEncryptor::new();
        let err = enc
            .encrypt_fields(&full_card(), &time(), UNDERSIZED_PUBLIC_KEY)
            .unwrap_err();
        assert!(matches!(err, CseError::EncryptionFailed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn reserved_field_name_is_refused() {
        let enc = FieldEncryptor::new();
        for field in [GENERATION_TIME_KEY, ""] {
            let err = enc
                .encrypt_field(field, "SECRET-VALUE-12345", &time(), TEST_PUBLIC_KEY)
                .unwrap_err();
            assert!(matches!(err, CseError::InvalidFieldName(_)), "{field:?}: {err}");
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn legacy_is_the_default_format() {
        assert_eq!(FieldEncryptor::new().format(), TokenFormat::Legacy);
    }

    #[test]
    fn jwe_format_fields() {
        let enc = FieldEncryptor::new().with_format(TokenFormat::Jwe);
        let encrypted = enc.encrypt_fields(&full_card(), &time(), TEST_PUBLIC_KEY).unwrap();
        assert_eq!(encrypted.tokens().count(), 4);
        for t in encrypted.tokens() {
            let parts = jwe::decode(t).unwrap();
            assert_eq!(parts.encrypted_key().len(), 256);
            assert_eq!(parts.tag().len(), jwe::AUTH_TAG_LEN);
            assert!(!t.contains("737"));
        }
    }

    #[test]
    fn jwe_format_card_uses_shared_cache_and_random_source() {
        let mut rng = MockRandomSource::new();
        rng.expect_fill_bytes().times(2).returning(|dest| {
            dest.fill(0x5A);
            Ok(())
        });
        let cache = KeyCache::new();
        let enc = FieldEncryptor::with_random_source(cache.clone(), rng).with_format(TokenFormat::Jwe);
        let token = enc.encrypt_card(&full_card(), &time(), TEST_PUBLIC_KEY).unwrap();
        assert_eq!(jwe::decode(&token).unwrap().iv(), &[0x5A; jwe::IV_LEN]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn random_source_failure_is_fatal() {
        let mut rng = MockRandomSource::new();
        rng.expect_fill_bytes()
            .returning(|_| Err(CseError::RandomSourceUnavailable("no entropy".into())));
        let enc = FieldEncryptor::with_random_source(KeyCache::new(), rng);
        let err = enc
            .encrypt_field("number", "4111111111111111", &time(), TEST_PUBLIC_KEY)
            .unwrap_err();
        assert!(matches!(err, CseError::RandomSourceUnavailable(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn shared_cache_between_encryptors() {
        let cache = KeyCache::new();
        let a = FieldEncryptor::with_cache(cache.clone());
        let b = FieldEncryptor::with_cache(cache.clone());
        a.encrypt_field("cvc", "737", &time(), TEST_PUBLIC_KEY).unwrap();
        b.encrypt_field("cvc", "737", &time(), TEST_PUBLIC_KEY).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn async_fields_run_off_thread() {
        let enc = FieldEncryptor::new();
        let encrypted = enc
            .encrypt_fields_async(full_card(), time(), TEST_PUBLIC_KEY.to_owned())
            .await
            .unwrap();
        assert_eq!(encrypted.tokens().count(), 4);
        encrypted.tokens().for_each(assert_well_formed);
    }

    #[tokio::test]
    async fn async_errors_propagate() {
        let enc = FieldEncryptor::new();
        let err = enc
            .encrypt_card_async(full_card(), time(), "abc|def|ghi".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, CseError::InvalidKeyFormat(_)));
    }
}
