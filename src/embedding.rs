//! Vehicle text embeddings.
//!
//! With `[embedding] provider = "disabled"` every call fails with
//! [`ShowroomError::EmbeddingsDisabled`] and retrieval runs on metadata
//! filters alone. `"openai"` batches texts through `/v1/embeddings`.
//!
//! ```rust
//! # use showroom::config::EmbeddingConfig;
//! # use showroom::embedding::create_provider;
//! let provider = create_provider(&EmbeddingConfig::default()).unwrap();
//! assert!(!provider.is_enabled());
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::ShowroomError;
use crate::openai::OpenAIClient;

/// A text embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier stored next to each vector (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// False for the disabled provider.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Embed a batch of texts, one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = provider.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| ShowroomError::Upstream("empty embedding response".to_string()).into())
}

pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn is_enabled(&self) -> bool {
        false
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ShowroomError::EmbeddingsDisabled(
            "set [embedding] provider in config".to_string(),
        )
        .into())
    }
}

/// `POST /v1/embeddings`; needs `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    client: OpenAIClient,
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (Some(model), Some(dims)) = (config.model.clone(), config.dims) else {
            bail!("openai embeddings need embedding.model and embedding.dims");
        };
        Ok(Self {
            client: OpenAIClient::from_env(config.timeout_secs, config.max_retries)?,
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self.client.post_json("/embeddings", &body).await?;
        let embeddings = parse_openai_response(&json)?;

        if embeddings.len() != texts.len() {
            return Err(ShowroomError::Upstream(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            ))
            .into());
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dims) {
            return Err(ShowroomError::Upstream(format!(
                "embedding has {} dims, configured {}",
                bad.len(),
                self.dims
            ))
            .into());
        }

        Ok(embeddings)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ShowroomError::Upstream("missing data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| ShowroomError::Upstream("missing embedding".to_string()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        other => bail!("unknown embedding provider '{}'", other),
    }
}

/// Little-endian `f32` bytes, the `vehicle_embeddings.embedding` format.
///
/// ```rust
/// use showroom::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]; a trailing partial value is dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .filter_map(|chunk| chunk.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Cosine of the angle between `a` and `b`.
///
/// Mismatched lengths, empty input and zero vectors score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let (dot, sq_a, sq_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, sq_a, sq_b), (x, y)| {
            (dot + x * y, sq_a + x * x, sq_b + y * y)
        });
    let magnitude = (sq_a * sq_b).sqrt();
    if magnitude <= f32::EPSILON {
        0.0
    } else {
        dot / magnitude
    }
}
