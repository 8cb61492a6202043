//! Cosine similarity and exact top-K vector matching.
//!
//! Pure synchronous primitives behind the linkage engine. Production-sized
//! corpora are expected to sit behind an index-accelerated store instead;
//! whichever backend answers, the ranking contract here is the one to
//! preserve: threshold inclusive, scores descending, first-seen wins ties,
//! at most k results.

use std::cmp::Ordering;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("vector dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Cosine similarity of two equal-length vectors, clamped into [-1, 1].
///
/// A zero-magnitude input compares as exactly 0 so downstream ranking stays
/// defined. Mismatched lengths are a data-integrity bug upstream and fail
/// rather than coercing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, MatchError> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// An item paired with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f32,
}

/// Exact brute-force vector index.
#[derive(Debug)]
pub struct VectorIndex<T> {
    entries: Vec<(T, Vec<f32>)>,
}

impl<T> VectorIndex<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, item: T, vector: Vec<f32>) {
        self.entries.push((item, vector));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank every entry against `query`, keep scores at or above
    /// `threshold`, and return at most `k` results in descending score
    /// order. The sort is stable, so entries pushed earlier win ties. A
    /// dimension mismatch anywhere in the corpus fails the whole query.
    pub fn top_matches(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Scored<&T>>, MatchError> {
        let mut matches = Vec::new();
        for (item, vector) in &self.entries {
            let score = cosine_similarity(query, vector)?;
            if score >= threshold {
                matches.push(Scored { item, score });
            }
        }
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        matches.truncate(k);
        Ok(matches)
    }
}

impl<T> Default for VectorIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
