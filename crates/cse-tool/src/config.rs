//! Configuration loading and validation for `cse-tool`.
//!
//! Only the token layout is selectable. Prefixes, versions and cipher
//! parameters within a layout are wire constants.

use anyhow::{Context, Result};
use cse::TokenFormat;
use serde::Deserialize;

/// Validated tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Merchant public key, `"<exponent-hex>|<modulus-hex>"`. **Required.**
    pub public_key: String,

    /// Emit one combined token for the whole card instead of per-field tokens.
    #[serde(default)]
    pub combined: bool,

    /// Token layout, `legacy` (default) or `jwe`.
    #[serde(default)]
    pub format: TokenFormat,

    /// Tracing log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build cse-tool configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise cse-tool configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> Result<()> {
        if self.public_key.trim().is_empty() {
            anyhow::bail!("PUBLIC_KEY is required and must not be empty");
        }
        cse::PublicKey::parse(&self.public_key).context("PUBLIC_KEY is not a valid merchant key")?;
        Ok(())
    }
}
