//! In-memory reference store. Backs the CLI, which loads a JSON corpus into
//! it at startup, and the engine tests.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use ordlink_core::model::{
    ImpactAnalysisResult, Link, Regulation, RegulationArticle, Statute, StatuteArticle,
    StatuteRevision,
};
use ordlink_match::{Scored, VectorIndex};

use crate::traits::{AnalysisStore, ArticleStore, LinkStore, Upserted};
use crate::StoreError;

struct Inner {
    statutes: Vec<Statute>,
    revisions: Vec<StatuteRevision>,
    statute_articles: Vec<StatuteArticle>,
    regulations: Vec<Regulation>,
    regulation_articles: Vec<RegulationArticle>,
    links: Vec<Link>,
    analyses: Vec<(i64, ImpactAnalysisResult)>,
    next_link_id: i64,
    next_analysis_id: i64,
}

// Generated row ids count from 1, matching database sequences.
impl Default for Inner {
    fn default() -> Self {
        Self {
            statutes: Vec::new(),
            revisions: Vec::new(),
            statute_articles: Vec::new(),
            regulations: Vec::new(),
            regulation_articles: Vec::new(),
            links: Vec::new(),
            analyses: Vec::new(),
            next_link_id: 1,
            next_analysis_id: 1,
        }
    }
}

/// Store backed by process memory behind a single lock.
///
/// Rows are seeded through the `insert_*` methods, which preserve the caller's
/// ids; rows created by the store itself (links, analyses) get sequential ids
/// starting after the highest seeded one.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Other("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Other("store lock poisoned".into()))
    }

    // ── Seeding ──

    pub fn insert_statute(&self, statute: Statute) -> Result<(), StoreError> {
        self.write()?.statutes.push(statute);
        Ok(())
    }

    pub fn insert_revision(&self, revision: StatuteRevision) -> Result<(), StoreError> {
        self.write()?.revisions.push(revision);
        Ok(())
    }

    pub fn insert_statute_article(&self, article: StatuteArticle) -> Result<(), StoreError> {
        self.write()?.statute_articles.push(article);
        Ok(())
    }

    pub fn insert_regulation(&self, regulation: Regulation) -> Result<(), StoreError> {
        self.write()?.regulations.push(regulation);
        Ok(())
    }

    pub fn insert_regulation_article(&self, article: RegulationArticle) -> Result<(), StoreError> {
        self.write()?.regulation_articles.push(article);
        Ok(())
    }

    /// Seed a link keeping its id; the next generated link id stays above it.
    pub fn insert_link(&self, link: Link) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.next_link_id = inner.next_link_id.max(link.id + 1);
        inner.links.push(link);
        Ok(())
    }

    // ── Lookups outside the trait seams ──

    pub fn find_revision(&self, revision_id: i64) -> Result<Option<StatuteRevision>, StoreError> {
        Ok(self
            .read()?
            .revisions
            .iter()
            .find(|r| r.id == revision_id)
            .cloned())
    }

    // ── Snapshots for persisting back to disk ──

    pub fn export_statute_articles(&self) -> Result<Vec<StatuteArticle>, StoreError> {
        Ok(self.read()?.statute_articles.clone())
    }

    pub fn export_regulation_articles(&self) -> Result<Vec<RegulationArticle>, StoreError> {
        Ok(self.read()?.regulation_articles.clone())
    }

    pub fn export_regulations(&self) -> Result<Vec<Regulation>, StoreError> {
        Ok(self.read()?.regulations.clone())
    }

    pub fn export_links(&self) -> Result<Vec<Link>, StoreError> {
        Ok(self.read()?.links.clone())
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn statutes(&self) -> Result<Vec<Statute>, StoreError> {
        Ok(self.read()?.statutes.clone())
    }

    async fn regulations(&self) -> Result<Vec<Regulation>, StoreError> {
        Ok(self.read()?.regulations.clone())
    }

    async fn statute_articles(
        &self,
        statute_id: i64,
        revision_id: i64,
    ) -> Result<Vec<StatuteArticle>, StoreError> {
        Ok(self
            .read()?
            .statute_articles
            .iter()
            .filter(|a| a.statute_id == statute_id && a.revision_id == revision_id)
            .cloned()
            .collect())
    }

    async fn regulation_articles(
        &self,
        regulation_id: i64,
    ) -> Result<Vec<RegulationArticle>, StoreError> {
        Ok(self
            .read()?
            .regulation_articles
            .iter()
            .filter(|a| a.regulation_id == regulation_id)
            .cloned()
            .collect())
    }

    async fn save_statute_article_embedding(
        &self,
        article_id: i64,
        embedding: Vec<f32>,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let article = inner
            .statute_articles
            .iter_mut()
            .find(|a| a.id == article_id)
            .ok_or(StoreError::NotFound {
                entity: "statute article",
                id: article_id,
            })?;
        article.embedding = Some(embedding);
        Ok(())
    }

    async fn save_regulation_article_embedding(
        &self,
        article_id: i64,
        embedding: Vec<f32>,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let article = inner
            .regulation_articles
            .iter_mut()
            .find(|a| a.id == article_id)
            .ok_or(StoreError::NotFound {
                entity: "regulation article",
                id: article_id,
            })?;
        article.embedding = Some(embedding);
        Ok(())
    }

    async fn save_regulation_embedding(
        &self,
        regulation_id: i64,
        embedding: Vec<f32>,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let regulation = inner
            .regulations
            .iter_mut()
            .find(|r| r.id == regulation_id)
            .ok_or(StoreError::NotFound {
                entity: "regulation",
                id: regulation_id,
            })?;
        regulation.embedding = Some(embedding);
        Ok(())
    }

    async fn find_similar_articles(
        &self,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<Scored<StatuteArticle>>, StoreError> {
        let inner = self.read()?;
        // Only current revisions participate; superseded article rows stay
        // around for diffing but must not match.
        let current: HashSet<(i64, i64)> = inner
            .statutes
            .iter()
            .filter_map(|s| s.current_revision_id.map(|rev| (s.id, rev)))
            .collect();
        let mut index = VectorIndex::new();
        for article in &inner.statute_articles {
            if !current.contains(&(article.statute_id, article.revision_id)) {
                continue;
            }
            let Some(vector) = &article.embedding else {
                continue;
            };
            index.push(article, vector.clone());
        }
        let matches = index.top_matches(query, k, threshold)?;
        Ok(matches
            .into_iter()
            .map(|m| Scored {
                item: (*m.item).clone(),
                score: m.score,
            })
            .collect())
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn upsert_link(&self, link: Link) -> Result<Upserted, StoreError> {
        let mut inner = self.write()?;
        let key = link.key();
        if let Some(existing) = inner.links.iter_mut().find(|l| l.key() == key) {
            existing.confidence = link.confidence;
            return Ok(Upserted::Updated(existing.id));
        }
        let id = inner.next_link_id;
        inner.next_link_id += 1;
        inner.links.push(Link { id, ..link });
        Ok(Upserted::Inserted(id))
    }

    async fn links_for_statute(&self, statute_id: i64) -> Result<Vec<Link>, StoreError> {
        Ok(self
            .read()?
            .links
            .iter()
            .filter(|l| l.statute_id == statute_id)
            .cloned()
            .collect())
    }

    async fn links_for_regulation(&self, regulation_id: i64) -> Result<Vec<Link>, StoreError> {
        Ok(self
            .read()?
            .links
            .iter()
            .filter(|l| l.regulation_id == regulation_id)
            .cloned()
            .collect())
    }

    async fn verify_link(&self, link_id: i64, verifier: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let link = inner
            .links
            .iter_mut()
            .find(|l| l.id == link_id)
            .ok_or(StoreError::NotFound {
                entity: "link",
                id: link_id,
            })?;
        link.verified = true;
        link.verified_by = Some(verifier.to_string());
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn insert_analysis(&self, result: ImpactAnalysisResult) -> Result<i64, StoreError> {
        let mut inner = self.write()?;
        let id = inner.next_analysis_id;
        inner.next_analysis_id += 1;
        inner.analyses.push((id, result));
        Ok(id)
    }

    async fn analyses_for_revision(
        &self,
        revision_id: i64,
    ) -> Result<Vec<ImpactAnalysisResult>, StoreError> {
        Ok(self
            .read()?
            .analyses
            .iter()
            .filter(|(_, r)| r.revision_id == revision_id)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
