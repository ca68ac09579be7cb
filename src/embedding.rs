//! Embedding client for semantic similarity.
//!
//! Wraps a remote embedding endpoint behind the [`Embedder`] trait.
//! Failures degrade to `None` so callers silently fall back to
//! token-overlap scoring; the client never returns an error.

use std::collections::HashMap;
use std::sync::Arc;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Produces fixed-length vectors for text.
///
/// Implementations must not fail: any transport or parse problem is
/// reported as `None`, which callers treat as "no embedding available".
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `text`, returning an L2-normalized vector or `None`.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

/// Remote embedder over an OpenAI-compatible embeddings endpoint.
///
/// Vectors are cached in memory keyed by content hash, so repeated
/// lookups for the same chunk within a process cost one round-trip.
pub struct RemoteEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    cache: RwLock<HashMap<String, Arc<Vec<f32>>>>,
}

impl RemoteEmbedder {
    /// Creates a remote embedder for the given model.
    #[must_use]
    pub fn new(api_key: &str, base_url: Option<&str>, model: impl Into<String>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        Self {
            client: Client::with_config(config),
            model: model.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_key(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn fetch(&self, text: &str) -> Option<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(text)
            .build()
            .ok()?;

        match self.client.embeddings().create(request).await {
            Ok(response) => response
                .data
                .into_iter()
                .next()
                .map(|d| l2_normalize(d.embedding)),
            Err(e) => {
                tracing::debug!(model = %self.model, error = %e, "embedding request failed");
                None
            }
        }
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }

        let key = Self::cache_key(text);
        if let Some(cached) = self.cache.read().await.get(&key) {
            return Some(cached.as_ref().clone());
        }

        let vec = self.fetch(text).await?;
        self.cache
            .write()
            .await
            .insert(key, Arc::new(vec.clone()));
        Some(vec)
    }
}

impl std::fmt::Debug for RemoteEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEmbedder")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Embedder for offline operation: always reports no embedding, so every
/// caller falls back to token-overlap scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmbedder;

#[async_trait]
impl Embedder for NullEmbedder {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}

/// L2-normalizes a vector in place. Zero vectors are returned unchanged.
#[must_use]
pub fn l2_normalize(mut vec: Vec<f32>) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vec {
            *x /= norm;
        }
    }
    vec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize_unit_length() {
        let v = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = l2_normalize(vec![0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_null_embedder_returns_none() {
        assert!(NullEmbedder.embed("anything").await.is_none());
    }

    #[test]
    fn test_cache_key_is_stable() {
        assert_eq!(
            RemoteEmbedder::cache_key("hello"),
            RemoteEmbedder::cache_key("hello")
        );
        assert_ne!(
            RemoteEmbedder::cache_key("hello"),
            RemoteEmbedder::cache_key("world")
        );
    }
}
