//! Provider configuration.
//!
//! All tunables live on an explicit config handed to each provider
//! constructor; there are no ambient globals. Defaults follow the hosted
//! providers' published endpoints, and the canonical embedding dimension is
//! fixed system-wide so vectors from different providers stay comparable.

use std::fmt;
use std::time::Duration;

/// Canonical embedding dimension every stored vector is conformed to.
pub const CANONICAL_DIM: usize = 1536;

/// Which provider family backs embeddings and completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    /// Deterministic in-process providers; no network, no credentials.
    Offline,
}

/// Connection and batching parameters shared by the providers.
#[derive(Clone)]
pub struct AiConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub base_url: String,
    pub embed_model: String,
    pub analysis_model: String,
    /// Every embedding is truncated or zero-padded to this length.
    pub canonical_dim: usize,
    /// Texts per upstream embedding request; larger inputs are sub-batched.
    pub embed_batch_size: usize,
    /// Pause between consecutive upstream calls.
    pub call_delay: Duration,
    /// Hard per-call timeout; a hung provider surfaces as an error.
    pub timeout: Duration,
}

impl AiConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_key: api_key.into(),
            base_url: "https://api.openai.com".into(),
            embed_model: "text-embedding-3-small".into(),
            analysis_model: "gpt-4o-mini".into(),
            canonical_dim: CANONICAL_DIM,
            embed_batch_size: 100,
            call_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Gemini,
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            embed_model: "text-embedding-004".into(),
            analysis_model: "gemini-2.0-flash".into(),
            canonical_dim: CANONICAL_DIM,
            embed_batch_size: 100,
            call_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn offline() -> Self {
        Self {
            provider: ProviderKind::Offline,
            api_key: String::new(),
            base_url: String::new(),
            embed_model: "offline".into(),
            analysis_model: "offline".into(),
            canonical_dim: CANONICAL_DIM,
            embed_batch_size: 100,
            call_delay: Duration::ZERO,
            timeout: Duration::from_secs(30),
        }
    }

    /// Point at a different endpoint (self-hosted gateway, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

// Keys must never reach logs; Debug prints everything else.
impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("embed_model", &self.embed_model)
            .field("analysis_model", &self.analysis_model)
            .field("canonical_dim", &self.canonical_dim)
            .field("embed_batch_size", &self.embed_batch_size)
            .field("call_delay", &self.call_delay)
            .field("timeout", &self.timeout)
            .finish()
    }
}
