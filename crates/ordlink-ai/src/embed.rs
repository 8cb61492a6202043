//! Embedding providers conformed to one canonical dimension.
//!
//! Two wire flavours (OpenAI `/v1/embeddings`, Gemini `batchEmbedContents`)
//! sit behind one capability trait. Native dimensions differ per provider;
//! every vector leaving this module has exactly the configured canonical
//! length, truncated or zero-padded as needed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ordlink_core::text::{chunk, ChunkConfig};

use crate::config::AiConfig;

#[derive(Debug, Error)]
pub enum EmbedError {
    /// Empty or blank input; rejected before any network call.
    #[error("cannot embed empty text")]
    EmptyInput,
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),
}

/// Capability seam over embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text into exactly [`dim`](Self::dim) floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed many texts, preserving input order. Large inputs go upstream in
    /// sub-batches with a pause in between; any failing item fails the whole
    /// call, and the caller decides whether to retry at finer granularity.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Canonical output dimension.
    fn dim(&self) -> usize;
}

/// Truncate or zero-pad `vector` to exactly `dim` floats.
pub fn conform_dimension(mut vector: Vec<f32>, dim: usize) -> Vec<f32> {
    vector.resize(dim, 0.0);
    vector
}

/// Element-wise arithmetic mean of equal-length vectors. An empty slice
/// yields an empty vector.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0f32; first.len()];
    for vector in vectors {
        for (slot, value) in mean.iter_mut().zip(vector) {
            *slot += value;
        }
    }
    let count = vectors.len() as f32;
    for slot in &mut mean {
        *slot /= count;
    }
    mean
}

/// Embed a document of arbitrary length.
///
/// Text that fits one chunk goes straight to the provider; longer text is
/// chunked and the chunk vectors mean-pooled into a single document vector
/// of the same dimension.
pub async fn embed_document(
    provider: &dyn EmbeddingProvider,
    text: &str,
    chunking: &ChunkConfig,
) -> Result<Vec<f32>, EmbedError> {
    let chunks = chunk(text, chunking.max_tokens);
    if chunks.len() == 1 {
        return provider.embed(&chunks[0]).await;
    }
    debug!(chunks = chunks.len(), "pooling chunked document embedding");
    let refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
    let vectors = provider.embed_batch(&refs).await?;
    Ok(mean_pool(&vectors))
}

fn reject_blank(texts: &[&str]) -> Result<(), EmbedError> {
    if texts.is_empty() || texts.iter().any(|t| t.trim().is_empty()) {
        return Err(EmbedError::EmptyInput);
    }
    Ok(())
}

async fn read_success_body(response: reqwest::Response) -> Result<String, EmbedError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(EmbedError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

// ── OpenAI ─────────────────────────────────────────────────────────────

/// OpenAI-flavoured embedding backend (`POST /v1/embeddings`).
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    config: AiConfig,
}

#[derive(Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedDatum>,
}

#[derive(Deserialize)]
struct OpenAiEmbedDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedding {
    pub fn new(config: &AiConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let mut config = config.clone();
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, config })
    }

    async fn request_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!("{}/v1/embeddings", self.config.base_url);
        let request = OpenAiEmbedRequest {
            model: &self.config.embed_model,
            input: texts,
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let body = read_success_body(response).await?;
        let parsed: OpenAiEmbedResponse = serde_json::from_str(&body)
            .map_err(|e| EmbedError::MalformedResponse(e.to_string()))?;
        if parsed.data.len() != texts.len() {
            return Err(EmbedError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data
            .into_iter()
            .map(|d| conform_dimension(d.embedding, self.config.canonical_dim))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let vectors = self.embed_batch(&[text]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::MalformedResponse("empty embedding batch".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        reject_blank(texts)?;
        let batch_size = self.config.embed_batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_no, sub) in texts.chunks(batch_size).enumerate() {
            if batch_no > 0 && !self.config.call_delay.is_zero() {
                tokio::time::sleep(self.config.call_delay).await;
            }
            debug!(batch = batch_no, size = sub.len(), "requesting embeddings");
            vectors.extend(self.request_embeddings(sub).await?);
        }
        Ok(vectors)
    }

    fn dim(&self) -> usize {
        self.config.canonical_dim
    }
}

// ── Gemini ─────────────────────────────────────────────────────────────

/// Gemini-flavoured embedding backend (`:batchEmbedContents`). The native
/// dimension is 768, so vectors are zero-padded up to the canonical length.
pub struct GeminiEmbedding {
    client: reqwest::Client,
    config: AiConfig,
}

#[derive(Serialize)]
struct GeminiBatchRequest<'a> {
    requests: Vec<GeminiEmbedRequest<'a>>,
}

#[derive(Serialize)]
struct GeminiEmbedRequest<'a> {
    model: String,
    content: GeminiContent<'a>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiBatchResponse {
    embeddings: Vec<GeminiVector>,
}

#[derive(Deserialize)]
struct GeminiVector {
    values: Vec<f32>,
}

impl GeminiEmbedding {
    pub fn new(config: &AiConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let mut config = config.clone();
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, config })
    }

    async fn request_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.config.base_url, self.config.embed_model
        );
        let request = GeminiBatchRequest {
            requests: texts
                .iter()
                .map(|text| GeminiEmbedRequest {
                    model: format!("models/{}", self.config.embed_model),
                    content: GeminiContent {
                        parts: vec![GeminiPart { text }],
                    },
                })
                .collect(),
        };
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let body = read_success_body(response).await?;
        let parsed: GeminiBatchResponse = serde_json::from_str(&body)
            .map_err(|e| EmbedError::MalformedResponse(e.to_string()))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed
            .embeddings
            .into_iter()
            .map(|e| conform_dimension(e.values, self.config.canonical_dim))
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let vectors = self.embed_batch(&[text]).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::MalformedResponse("empty embedding batch".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        reject_blank(texts)?;
        let batch_size = self.config.embed_batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_no, sub) in texts.chunks(batch_size).enumerate() {
            if batch_no > 0 && !self.config.call_delay.is_zero() {
                tokio::time::sleep(self.config.call_delay).await;
            }
            debug!(batch = batch_no, size = sub.len(), "requesting embeddings");
            vectors.extend(self.request_embeddings(sub).await?);
        }
        Ok(vectors)
    }

    fn dim(&self) -> usize {
        self.config.canonical_dim
    }
}
