//! Cryptographically secure random bytes for one-time keys and nonces.

use common::CseError;
use rand_core::{OsRng, RngCore};

/// Source of key and nonce material.
///
/// Implementations must draw from a CSPRNG. A failure is reported as
/// [`CseError::RandomSourceUnavailable`] and must never be papered over with a
/// weaker generator.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), CseError>;
}

/// [`RandomSource`] backed by the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), CseError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| CseError::RandomSourceUnavailable(e.to_string()))
    }
}

/// Return `len` fresh random bytes from `rng`.
pub fn next_bytes<R: RandomSource + ?Sized>(rng: &R, len: usize) -> Result<Vec<u8>, CseError> {
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf)?;
    Ok(buf)
}
