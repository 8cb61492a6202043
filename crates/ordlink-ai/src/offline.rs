//! Deterministic offline providers for tests and credential-less dry runs.
//!
//! The embedding hashes character trigrams into a fixed-dimension bag and
//! L2-normalises it, so texts sharing vocabulary land near each other under
//! cosine similarity. The model answers with the real verdict schema, keyed
//! off the same prompt markers the analyzer writes. No network, no keys,
//! stable output for a given input.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::analyzer::{NO_PRIOR_VERSION, REPEALED};
use crate::embed::{EmbedError, EmbeddingProvider};
use crate::generate::{AnalyzeError, GenerativeModel};

/// Hash-bag embedding provider.
pub struct OfflineEmbedding {
    dim: usize,
}

impl OfflineEmbedding {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl EmbeddingProvider for OfflineEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let chars: Vec<char> = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let mut vector = vec![0.0f32; self.dim];
        if chars.len() < 3 {
            vector[bucket(&chars, self.dim)] += 1.0;
        } else {
            for window in chars.windows(3) {
                vector[bucket(window, self.dim)] += 1.0;
            }
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

fn bucket(window: &[char], dim: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    window.hash(&mut hasher);
    (hasher.finish() % dim as u64) as usize
}

/// Rule-driven stand-in for a generative model.
pub struct OfflineModel;

#[async_trait]
impl GenerativeModel for OfflineModel {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, AnalyzeError> {
        let (level, impact_type, summary) = if user.contains(REPEALED) {
            (
                "HIGH",
                "required-amendment",
                "The statutory article this regulation relies on was repealed.",
            )
        } else if user.contains(NO_PRIOR_VERSION) {
            (
                "MEDIUM",
                "review-needed",
                "A newly added statutory article may bear on this regulation.",
            )
        } else {
            (
                "LOW",
                "review-needed",
                "Statutory wording changed; no direct conflict detected offline.",
            )
        };
        Ok(serde_json::json!({
            "impact_level": level,
            "impact_type": impact_type,
            "change_summary": summary,
            "ai_recommendation": "Have a reviewing official confirm this offline verdict.",
            "confidence_score": 0.5,
            "reasoning": "offline heuristic verdict",
        })
        .to_string())
    }

    fn model_name(&self) -> &str {
        "offline"
    }
}
