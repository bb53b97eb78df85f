//! Secret reader seam.
//!
//! Credentials (chat bot tokens, provider API keys) live in an external
//! parameter store; the engine only ever reads them by name. Results may be
//! cached for the process lifetime via [`CachedSecretReader`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

/// Secret lookup failure.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// No secret with that name.
    #[error("secret not found: {0}")]
    NotFound(String),
    /// The backing store failed.
    #[error("secret store error: {0}")]
    Store(String),
}

/// Reads named secrets from an external parameter store.
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// Fetch a secret value by parameter name.
    async fn get(&self, parameter_name: &str) -> Result<String, SecretError>;
}

/// In-memory reader for tests and embedding.
#[derive(Debug, Default)]
pub struct StaticSecretReader {
    values: HashMap<String, String>,
}

impl StaticSecretReader {
    /// Create a reader over the given name→value pairs.
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Insert one secret.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let _ = self.values.insert(name.into(), value.into());
    }
}

#[async_trait]
impl SecretReader for StaticSecretReader {
    async fn get(&self, parameter_name: &str) -> Result<String, SecretError> {
        self.values
            .get(parameter_name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(parameter_name.to_owned()))
    }
}

/// Caches successful lookups for the process lifetime.
pub struct CachedSecretReader<R> {
    inner: R,
    cache: RwLock<HashMap<String, String>>,
}

impl<R: SecretReader> CachedSecretReader<R> {
    /// Wrap a reader with a process-lifetime cache.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<R: SecretReader> SecretReader for CachedSecretReader<R> {
    async fn get(&self, parameter_name: &str) -> Result<String, SecretError> {
        if let Some(hit) = self.cache.read().get(parameter_name) {
            return Ok(hit.clone());
        }
        let value = self.inner.get(parameter_name).await?;
        let _ = self
            .cache
            .write()
            .insert(parameter_name.to_owned(), value.clone());
        Ok(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
