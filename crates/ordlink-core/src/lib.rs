//! Core domain model and pure computation for ordlink.
//!
//! Everything in this crate is synchronous and free of I/O: the entities
//! shared across the workspace, text normalisation and chunking, article
//! number sort keys, revision diffing, and the heuristic screen that decides
//! which statute/regulation pairs deserve deep analysis.

pub mod article_no;
pub mod cancel;
pub mod diff;
pub mod model;
pub mod screen;
pub mod text;

pub use cancel::CancelFlag;
pub use diff::diff_articles;
pub use model::{
    ArticleKind, ChangeKind, ImpactAnalysisResult, ImpactLevel, ImpactType, Link, LinkKey,
    LinkKind, Regulation, RegulationArticle, RegulationKind, RevisionDelta, Statute,
    StatuteArticle, StatuteKind, StatuteRevision,
};
pub use screen::{should_analyze, ScreenConfig, ScreenDecision, ScreenReason};
pub use text::{chunk, estimate_tokens, normalize, ChunkConfig};
