//! AI provider layer: embedding backends, generative completion backends,
//! and the impact analyzer's prompt/verdict contract.
//!
//! Both capabilities are trait seams with interchangeable hosted
//! implementations selected by configuration, plus deterministic offline
//! stand-ins for tests and credential-less dry runs.

pub mod analyzer;
pub mod config;
pub mod embed;
pub mod generate;
pub mod offline;

pub use analyzer::{AnalysisBatch, AnalysisRequest, ImpactAnalyzer};
pub use config::{AiConfig, ProviderKind, CANONICAL_DIM};
pub use embed::{
    conform_dimension, embed_document, mean_pool, EmbedError, EmbeddingProvider, GeminiEmbedding,
    OpenAiEmbedding,
};
pub use generate::{AnalyzeError, GeminiModel, GenerativeModel, OpenAiModel};
pub use offline::{OfflineEmbedding, OfflineModel};
