use std::{collections::HashMap, sync::Arc};

use jsonwebtoken::{
    jwk::{Jwk, JwkSet},
    DecodingKey,
};
use tracing::*;

/// A single verification key published by the identity provider.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    decoding_key: DecodingKey,
}

impl SigningKey {
    pub(crate) fn new(kid: impl Into<String>, decoding_key: DecodingKey) -> SigningKey {
        SigningKey {
            kid: kid.into(),
            decoding_key,
        }
    }

    /// Key id the provider published this key under.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Verification key material.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("kid", &self.kid).finish_non_exhaustive()
    }
}

/// Immutable snapshot of the provider's key set, indexed by `kid`.
///
/// A refresh never mutates a snapshot; it builds a new one and swaps it in.
#[derive(Debug, Default)]
pub struct SigningKeySet {
    keys: HashMap<String, Arc<SigningKey>>,
}

impl SigningKeySet {
    /// Indexes `keys` by `kid`. A later key replaces an earlier one with the
    /// same id.
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> SigningKeySet {
        SigningKeySet {
            keys: keys
                .into_iter()
                .map(|key| (key.kid.clone(), Arc::new(key)))
                .collect(),
        }
    }

    /// Builds a snapshot from a parsed JWKS document.
    ///
    /// Keys without a `kid` cannot be selected by any token and are skipped.
    /// A key whose material cannot be turned into a verification key fails
    /// the whole set, so a refresh is never applied partially.
    pub fn from_jwk_set(set: &JwkSet) -> Result<SigningKeySet, String> {
        let mut keys = Vec::with_capacity(set.keys.len());
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.as_deref() else {
                debug!("Skipping JWK without 'kid'");
                continue;
            };
            keys.push(SigningKey::new(kid, Self::decoding_key(kid, jwk)?));
        }
        Ok(Self::new(keys))
    }

    fn decoding_key(kid: &str, jwk: &Jwk) -> Result<DecodingKey, String> {
        DecodingKey::from_jwk(jwk).map_err(|e| format!("key '{kid}' is unusable: {e}"))
    }

    /// The key published under `kid`, if any.
    pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.get(kid).cloned()
    }

    /// Whether a key is published under `kid`.
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    /// All key ids in this snapshot, in no particular order.
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the snapshot holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
