//! Session-scoped cache of parsed merchant keys, keyed by the raw key string.
//!
//! Reads go through `arc-swap` and never block; a miss parses the key and
//! swaps in a copied map with the new entry. Keys are immutable once parsed,
//! so cached entries are shared across threads without locking.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use common::CseError;
use tracing::debug;

use crate::crypto::PublicKey;

/// Cache of parsed [`PublicKey`]s.
///
/// Cloning is cheap and clones share the same entries. Owned by whatever
/// represents a checkout session; there is no process-wide instance.
#[derive(Clone, Debug)]
pub struct KeyCache {
    inner: Arc<ArcSwap<HashMap<String, Arc<PublicKey>>>>,
}

impl KeyCache {
    /// Create a new, empty [`KeyCache`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::new(Arc::new(HashMap::new()))),
        }
    }

    /// Return the number of cached keys.
    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    /// Return `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }

    /// Look up an already parsed key.
    pub fn get(&self, raw: &str) -> Option<Arc<PublicKey>> {
        self.inner.load().get(raw).cloned()
    }

    /// Return the cached key for `raw`, parsing and caching it on a miss.
    ///
    /// Parse failures are returned and not cached.
    ///
    /// # Errors
    ///
    /// Returns [`CseError::InvalidKeyFormat`] if `raw` cannot be parsed.
    pub fn get_or_parse(&self, raw: &str) -> Result<Arc<PublicKey>, CseError> {
        if let Some(key) = self.get(raw) {
            return Ok(key);
        }

        let parsed = Arc::new(PublicKey::parse(raw)?);
        self.inner.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.entry(raw.to_owned())
                .or_insert_with(|| Arc::clone(&parsed));
            next
        });
        debug!(
            modulus_bits = parsed.modulus_bits(),
            cached = self.len(),
            "merchant public key parsed"
        );

        // Hand out the entry that won a concurrent insert, if any.
        Ok(self.get(raw).unwrap_or(parsed))
    }

    /// Drop every cached key, e.g. when the checkout session ends.
    pub fn clear(&self) {
        self.inner.store(Arc::new(HashMap::new()));
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
