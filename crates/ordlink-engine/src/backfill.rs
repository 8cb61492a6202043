//! Embedding backfill over the loaded corpus.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use ordlink_ai::embed::{embed_document, mean_pool, EmbedError, EmbeddingProvider};
use ordlink_core::text::ChunkConfig;
use ordlink_core::CancelFlag;
use ordlink_store::ArticleStore;

/// Counters from one backfill run.
#[derive(Debug, Default, Clone)]
pub struct EmbedStats {
    /// Statute article vectors written.
    pub statute_articles: usize,
    /// Regulation article vectors written.
    pub regulation_articles: usize,
    /// Regulation document vectors written.
    pub regulations: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

/// Fills missing vectors across the corpus: statute articles of each
/// statute's current revision, regulation articles, and regulation document
/// vectors pooled from the article vectors.
///
/// Articles that already carry a vector are left alone, so an interrupted
/// run picks up where it stopped. A failed embed is logged and counted; the
/// run continues.
pub struct EmbedBackfill {
    provider: Arc<dyn EmbeddingProvider>,
    chunking: ChunkConfig,
    delay: Duration,
}

impl EmbedBackfill {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            chunking: ChunkConfig::default(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkConfig) -> Self {
        self.chunking = chunking;
        self
    }

    /// Pause before each upstream embed call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn run(
        &self,
        store: &(impl ArticleStore + ?Sized),
        cancel: &CancelFlag,
    ) -> Result<EmbedStats> {
        let started = Instant::now();
        let mut stats = EmbedStats::default();

        'statutes: for statute in store.statutes().await? {
            let Some(revision_id) = statute.current_revision_id else {
                debug!(statute = %statute.name, "no current revision, skipping");
                continue;
            };
            for article in store.statute_articles(statute.id, revision_id).await? {
                if cancel.is_cancelled() {
                    stats.cancelled = true;
                    break 'statutes;
                }
                if article.embedding.is_some() {
                    continue;
                }
                match self.embed_text(&article.content).await {
                    Ok(vector) => {
                        store
                            .save_statute_article_embedding(article.id, vector)
                            .await?;
                        stats.statute_articles += 1;
                    }
                    Err(err) => {
                        warn!(
                            statute = %statute.name,
                            article = %article.number,
                            error = %err,
                            "failed to embed statute article"
                        );
                        stats.failed += 1;
                    }
                }
            }
        }

        if !stats.cancelled {
            'regulations: for regulation in store.regulations().await? {
                let mut vectors = Vec::new();
                let mut touched = false;
                for article in store.regulation_articles(regulation.id).await? {
                    if cancel.is_cancelled() {
                        stats.cancelled = true;
                        break 'regulations;
                    }
                    if let Some(vector) = article.embedding {
                        vectors.push(vector);
                        continue;
                    }
                    match self.embed_text(&article.content).await {
                        Ok(vector) => {
                            store
                                .save_regulation_article_embedding(article.id, vector.clone())
                                .await?;
                            vectors.push(vector);
                            stats.regulation_articles += 1;
                            touched = true;
                        }
                        Err(err) => {
                            warn!(
                                regulation = %regulation.name,
                                article = %article.number,
                                error = %err,
                                "failed to embed regulation article"
                            );
                            stats.failed += 1;
                        }
                    }
                }
                // The document vector is the mean of the article vectors;
                // recompute when an article vector changed or it was never set.
                if !vectors.is_empty() && (touched || regulation.embedding.is_none()) {
                    store
                        .save_regulation_embedding(regulation.id, mean_pool(&vectors))
                        .await?;
                    stats.regulations += 1;
                }
            }
        }

        stats.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            statute_articles = stats.statute_articles,
            regulation_articles = stats.regulation_articles,
            regulations = stats.regulations,
            failed = stats.failed,
            cancelled = stats.cancelled,
            "embedding backfill finished"
        );
        Ok(stats)
    }

    async fn embed_text(&self, content: &str) -> Result<Vec<f32>, EmbedError> {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        embed_document(self.provider.as_ref(), content, &self.chunking).await
    }
}
