//! Trait seams the pipeline crates program against. Backends only need to
//! honour these contracts; the engine never sees a concrete store type.

use async_trait::async_trait;

use ordlink_core::model::{
    ImpactAnalysisResult, Link, Regulation, RegulationArticle, Statute, StatuteArticle,
};
use ordlink_match::Scored;

use crate::StoreError;

/// Whether an upsert created a new row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted(i64),
    Updated(i64),
}

impl Upserted {
    pub fn id(self) -> i64 {
        match self {
            Upserted::Inserted(id) | Upserted::Updated(id) => id,
        }
    }
}

/// Read and embedding-write access to the statute/regulation corpus.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn statutes(&self) -> Result<Vec<Statute>, StoreError>;

    async fn regulations(&self) -> Result<Vec<Regulation>, StoreError>;

    /// Articles of one statute revision.
    async fn statute_articles(
        &self,
        statute_id: i64,
        revision_id: i64,
    ) -> Result<Vec<StatuteArticle>, StoreError>;

    async fn regulation_articles(
        &self,
        regulation_id: i64,
    ) -> Result<Vec<RegulationArticle>, StoreError>;

    async fn save_statute_article_embedding(
        &self,
        article_id: i64,
        embedding: Vec<f32>,
    ) -> Result<(), StoreError>;

    async fn save_regulation_article_embedding(
        &self,
        article_id: i64,
        embedding: Vec<f32>,
    ) -> Result<(), StoreError>;

    /// Store a regulation's document-level vector.
    async fn save_regulation_embedding(
        &self,
        regulation_id: i64,
        embedding: Vec<f32>,
    ) -> Result<(), StoreError>;

    /// Statute articles most similar to `query`, best first. Only articles of
    /// each statute's current revision participate; articles without a stored
    /// vector are skipped.
    async fn find_similar_articles(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Scored<StatuteArticle>>, StoreError>;
}

/// Persistence for statute-regulation links.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert the link, or refresh the confidence of the row sharing its
    /// upsert key. An update never touches kind or verification state.
    async fn upsert_link(&self, link: Link) -> Result<Upserted, StoreError>;

    async fn links_for_statute(&self, statute_id: i64) -> Result<Vec<Link>, StoreError>;

    async fn links_for_regulation(&self, regulation_id: i64) -> Result<Vec<Link>, StoreError>;

    /// Mark a link human-confirmed.
    async fn verify_link(&self, link_id: i64, verifier: &str) -> Result<(), StoreError>;
}

/// Append-only history of impact verdicts.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert_analysis(&self, result: ImpactAnalysisResult) -> Result<i64, StoreError>;

    async fn analyses_for_revision(
        &self,
        revision_id: i64,
    ) -> Result<Vec<ImpactAnalysisResult>, StoreError>;
}
