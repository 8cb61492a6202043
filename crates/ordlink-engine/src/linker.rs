//! Linkage builder: connect each regulation to the statute articles it is
//! most similar to.

use anyhow::Result;
use tracing::{debug, info, warn};

use ordlink_core::model::{Link, LinkKind, Regulation};
use ordlink_core::CancelFlag;
use ordlink_store::{ArticleStore, LinkStore, Upserted};

/// Candidate selection knobs.
#[derive(Debug, Clone)]
pub struct LinkerConfig {
    /// Candidates kept per regulation.
    pub top_k: usize,
    /// Minimum similarity for a link to be written.
    pub threshold: f32,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.65,
        }
    }
}

/// Counters from one linkage run.
#[derive(Debug, Default, Clone)]
pub struct LinkRunSummary {
    pub regulations: usize,
    pub skipped_no_embedding: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Ranks statute articles against each regulation's document vector and
/// upserts a `basis` link for every candidate at or above the threshold.
/// Re-running refreshes confidences without duplicating rows or touching
/// verification state.
pub struct LinkageBuilder {
    config: LinkerConfig,
}

impl LinkageBuilder {
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    pub async fn run(
        &self,
        store: &(impl ArticleStore + LinkStore + ?Sized),
        cancel: &CancelFlag,
    ) -> Result<LinkRunSummary> {
        let mut summary = LinkRunSummary::default();
        for regulation in store.regulations().await? {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.regulations += 1;
            let Some(embedding) = &regulation.embedding else {
                debug!(regulation = %regulation.name, "no document vector, skipping");
                summary.skipped_no_embedding += 1;
                continue;
            };
            match self.link_regulation(store, &regulation, embedding).await {
                Ok((inserted, updated)) => {
                    summary.inserted += inserted;
                    summary.updated += updated;
                }
                Err(err) => {
                    warn!(regulation = %regulation.name, error = %err, "linkage failed");
                    summary.failed += 1;
                }
            }
        }
        info!(
            regulations = summary.regulations,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped_no_embedding,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "linkage build finished"
        );
        Ok(summary)
    }

    async fn link_regulation(
        &self,
        store: &(impl ArticleStore + LinkStore + ?Sized),
        regulation: &Regulation,
        embedding: &[f32],
    ) -> Result<(usize, usize)> {
        // Candidates come back unfiltered so near misses show up in logs;
        // the threshold is applied here.
        let candidates = store
            .find_similar_articles(embedding, self.config.top_k, 0.0)
            .await?;
        let mut inserted = 0;
        let mut updated = 0;
        for candidate in candidates {
            if candidate.score < self.config.threshold {
                debug!(
                    regulation = %regulation.name,
                    article = %candidate.item.number,
                    score = candidate.score,
                    "below link threshold"
                );
                continue;
            }
            let link = Link {
                id: 0,
                statute_id: candidate.item.statute_id,
                regulation_id: regulation.id,
                statute_article_id: Some(candidate.item.id),
                regulation_article_id: None,
                kind: LinkKind::Basis,
                confidence: candidate.score,
                verified: false,
                verified_by: None,
            };
            match store.upsert_link(link).await? {
                Upserted::Inserted(_) => inserted += 1,
                Upserted::Updated(_) => updated += 1,
            }
        }
        Ok((inserted, updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ordlink_core::model::{
        ArticleKind, RegulationArticle, RegulationKind, Statute, StatuteArticle, StatuteKind,
    };
    use ordlink_match::Scored;
    use ordlink_store::{MemoryStore, StoreError};

    fn statute(id: i64, current_revision_id: Option<i64>) -> Statute {
        Statute {
            id,
            name: format!("Statute {id}"),
            kind: StatuteKind::Law,
            current_revision_id,
        }
    }

    fn article(id: i64, statute_id: i64, revision_id: i64, embedding: Vec<f32>) -> StatuteArticle {
        StatuteArticle {
            id,
            statute_id,
            revision_id,
            number: id.to_string(),
            title: None,
            content: "All operators shall hold a permit.".to_string(),
            kind: ArticleKind::Main,
            parent_number: None,
            embedding: Some(embedding),
        }
    }

    fn regulation(id: i64, embedding: Option<Vec<f32>>) -> ordlink_core::model::Regulation {
        ordlink_core::model::Regulation {
            id,
            name: format!("Ordinance {id}"),
            kind: RegulationKind::Ordinance,
            embedding,
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_statute(statute(1, Some(1))).unwrap();
        // Scores against the [1, 0] document vector: 1.0, 0.8, 0.6.
        store
            .insert_statute_article(article(11, 1, 1, vec![1.0, 0.0]))
            .unwrap();
        store
            .insert_statute_article(article(12, 1, 1, vec![4.0, 3.0]))
            .unwrap();
        store
            .insert_statute_article(article(13, 1, 1, vec![3.0, 4.0]))
            .unwrap();
        store
            .insert_regulation(regulation(1, Some(vec![1.0, 0.0])))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn links_only_candidates_at_or_above_threshold() {
        let store = seeded_store().await;
        let builder = LinkageBuilder::new(LinkerConfig::default());

        let summary = builder.run(&store, &CancelFlag::default()).await.unwrap();
        assert_eq!(summary.regulations, 1);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.updated, 0);

        let links = store.links_for_regulation(1).await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.kind == LinkKind::Basis));
        assert!(links.iter().all(|l| l.confidence >= 0.65));
        assert!(links.iter().all(|l| l.regulation_article_id.is_none()));
    }

    #[tokio::test]
    async fn rerun_updates_in_place_and_keeps_verification() {
        let store = seeded_store().await;
        let builder = LinkageBuilder::new(LinkerConfig::default());

        let first = builder.run(&store, &CancelFlag::default()).await.unwrap();
        assert_eq!(first.inserted, 2);

        let links = store.links_for_regulation(1).await.unwrap();
        store.verify_link(links[0].id, "legal team").await.unwrap();

        let second = builder.run(&store, &CancelFlag::default()).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);

        let links = store.links_for_regulation(1).await.unwrap();
        assert_eq!(links.len(), 2);
        let verified = links.iter().find(|l| l.verified).unwrap();
        assert_eq!(verified.verified_by.as_deref(), Some("legal team"));
    }

    #[tokio::test]
    async fn skips_regulation_without_document_vector() {
        let store = MemoryStore::new();
        store.insert_regulation(regulation(1, None)).unwrap();

        let builder = LinkageBuilder::new(LinkerConfig::default());
        let summary = builder.run(&store, &CancelFlag::default()).await.unwrap();
        assert_eq!(summary.regulations, 1);
        assert_eq!(summary.skipped_no_embedding, 1);
        assert_eq!(summary.inserted, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_before_work() {
        let store = seeded_store().await;
        let builder = LinkageBuilder::new(LinkerConfig::default());

        let cancel = CancelFlag::default();
        cancel.cancel();
        let summary = builder.run(&store, &cancel).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.regulations, 0);
        assert!(store.links_for_regulation(1).await.unwrap().is_empty());
    }

    // Store stub returning fixed scores so the inclusive threshold boundary
    // is observable without floating-point drift from a real cosine.
    struct FixedScoreStore {
        scores: Vec<f32>,
        links: Mutex<Vec<Link>>,
        fail_on: Option<i64>,
    }

    impl FixedScoreStore {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                links: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl ArticleStore for FixedScoreStore {
        async fn statutes(&self) -> Result<Vec<Statute>, StoreError> {
            unimplemented!()
        }

        async fn regulations(&self) -> Result<Vec<ordlink_core::model::Regulation>, StoreError> {
            Ok(vec![
                regulation(1, Some(vec![1.0, 0.0])),
                regulation(2, Some(vec![0.0, 1.0])),
            ])
        }

        async fn statute_articles(
            &self,
            _statute_id: i64,
            _revision_id: i64,
        ) -> Result<Vec<StatuteArticle>, StoreError> {
            unimplemented!()
        }

        async fn regulation_articles(
            &self,
            _regulation_id: i64,
        ) -> Result<Vec<RegulationArticle>, StoreError> {
            unimplemented!()
        }

        async fn save_statute_article_embedding(
            &self,
            _article_id: i64,
            _embedding: Vec<f32>,
        ) -> Result<(), StoreError> {
            unimplemented!()
        }

        async fn save_regulation_article_embedding(
            &self,
            _article_id: i64,
            _embedding: Vec<f32>,
        ) -> Result<(), StoreError> {
            unimplemented!()
        }

        async fn save_regulation_embedding(
            &self,
            _regulation_id: i64,
            _embedding: Vec<f32>,
        ) -> Result<(), StoreError> {
            unimplemented!()
        }

        async fn find_similar_articles(
            &self,
            query: &[f32],
            _k: usize,
            _threshold: f32,
        ) -> Result<Vec<Scored<StatuteArticle>>, StoreError> {
            // The second regulation's query vector starts with 0.0.
            if self.fail_on == Some(2) && query.first() == Some(&0.0) {
                return Err(StoreError::Other("index offline".into()));
            }
            Ok(self
                .scores
                .iter()
                .enumerate()
                .map(|(i, &score)| Scored {
                    item: article(10 + i as i64, 1, 1, vec![1.0, 0.0]),
                    score,
                })
                .collect())
        }
    }

    #[async_trait]
    impl LinkStore for FixedScoreStore {
        async fn upsert_link(&self, link: Link) -> Result<Upserted, StoreError> {
            let mut links = self.links.lock().unwrap();
            links.push(link);
            Ok(Upserted::Inserted(links.len() as i64))
        }

        async fn links_for_statute(&self, _statute_id: i64) -> Result<Vec<Link>, StoreError> {
            unimplemented!()
        }

        async fn links_for_regulation(&self, _regulation_id: i64) -> Result<Vec<Link>, StoreError> {
            unimplemented!()
        }

        async fn verify_link(&self, _link_id: i64, _verifier: &str) -> Result<(), StoreError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn threshold_is_inclusive_at_the_boundary() {
        let store = FixedScoreStore::new(vec![0.65, 0.649]);
        let builder = LinkageBuilder::new(LinkerConfig::default());

        let summary = builder.run(&store, &CancelFlag::default()).await.unwrap();
        assert_eq!(summary.inserted, 2);

        let links = store.links.lock().unwrap();
        // Two regulations, each keeping only the 0.65 candidate.
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.confidence == 0.65));
    }

    #[tokio::test]
    async fn one_regulation_failing_does_not_stop_the_run() {
        let mut store = FixedScoreStore::new(vec![0.9]);
        store.fail_on = Some(2);
        let builder = LinkageBuilder::new(LinkerConfig::default());

        let summary = builder.run(&store, &CancelFlag::default()).await.unwrap();
        assert_eq!(summary.regulations, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.inserted, 1);
    }
}
