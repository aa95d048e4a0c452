//! `cse-tool` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`config::Config`] from environment variables.
//! 2. Initialise structured JSON logging on stderr.
//! 3. Read one card JSON document from stdin, encrypt it, print the result.

mod config;
mod encrypt;
mod telemetry;

use anyhow::{Context, Result};
use cse::FieldEncryptor;
use tokio::io::AsyncReadExt;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = config::Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: cse-tool configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        combined = cfg.combined,
        format = ?cfg.format,
        "cse-tool starting"
    );

    // -----------------------------------------------------------------------
    // 3. Encrypt
    // -----------------------------------------------------------------------
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("failed to read card JSON from stdin")?;

    let encryptor = FieldEncryptor::new().with_format(cfg.format);
    let output = encrypt::run(&cfg, &encryptor, &input).await?;
    println!("{output}");

    Ok(())
}
