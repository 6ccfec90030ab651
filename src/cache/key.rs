//! Cache key generation.

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Derives fingerprints from request content plus canonicalized options.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyGenerator {
    salt: Option<String>,
}

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self { salt: None }
    }

    /// Mix a namespace into every key, e.g. the model identifier, so that
    /// results from different models never collide.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// SHA-256 over `content || 0x00 || canonical-json(options) [|| 0x00 || salt]`.
    ///
    /// Fails only when `options` cannot be represented as JSON.
    pub fn fingerprint<O: Serialize + ?Sized>(&self, content: &str, options: &O) -> Result<CacheKey> {
        let canonical = canonical_json(&serde_json::to_value(options)?)?;
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.as_bytes());
        if let Some(ref s) = self.salt {
            hasher.update([0u8]);
            hasher.update(s.as_bytes());
        }
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Ok(CacheKey::new(hash))
    }
}

/// Serialize with object keys sorted at every depth.
fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&sorted(value))?)
}

fn sorted(value: &Value) -> SortedValue<'_> {
    match value {
        Value::Object(map) => SortedValue::Object(
            map.iter()
                .map(|(k, v)| (k.as_str(), sorted(v)))
                .collect(),
        ),
        Value::Array(items) => SortedValue::Array(items.iter().map(sorted).collect()),
        other => SortedValue::Leaf(other),
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum SortedValue<'a> {
    Object(BTreeMap<&'a str, SortedValue<'a>>),
    Array(Vec<SortedValue<'a>>),
    Leaf(&'a Value),
}
