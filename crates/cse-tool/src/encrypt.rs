//! Turns one JSON card document into its encrypted JSON form.
//!
//! Input is a [`CardInput`]; output is either an [`EncryptedCard`] (one token
//! per field) or a [`CombinedCardToken`] when `COMBINED=true`.

use anyhow::{Context, Result};
use common::protocol::{CardInput, CombinedCardToken};
use cse::{Card, FieldEncryptor, GenerationTime};
use tracing::info;

use crate::config::Config;

/// Encrypt the card described by `raw_input` and return the output JSON.
///
/// # Errors
///
/// Returns an error if the input is not a valid card document or encryption
/// fails. Nothing is written in either case.
pub async fn run(cfg: &Config, encryptor: &FieldEncryptor, raw_input: &str) -> Result<String> {
    let mut input: CardInput =
        serde_json::from_str(raw_input).context("stdin is not a valid card JSON document")?;

    let generation_time = input
        .generation_time
        .take()
        .map(GenerationTime::verbatim)
        .unwrap_or_else(GenerationTime::now);
    let card = Card::from(input);

    let output = if cfg.combined {
        let encrypted_data = encryptor
            .encrypt_card_async(card, generation_time, cfg.public_key.clone())
            .await
            .context("failed to encrypt card")?;
        info!("card encrypted into a combined token");
        serde_json::to_string(&CombinedCardToken { encrypted_data })
    } else {
        let encrypted = encryptor
            .encrypt_fields_async(card, generation_time, cfg.public_key.clone())
            .await
            .context("failed to encrypt card fields")?;
        info!(fields = encrypted.tokens().count(), "card fields encrypted");
        serde_json::to_string(&encrypted)
    };

    output.context("failed to serialise encrypted output")
}
