//! Revision impact pipeline: diff one statute revision, fan the changed
//! articles out to the regulation articles linked to that statute, screen
//! each pair, send the survivors through the analyzer, and persist the
//! verdicts.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info};

use ordlink_ai::analyzer::{AnalysisRequest, ImpactAnalyzer};
use ordlink_core::model::{ImpactAnalysisResult, Link, RegulationArticle, StatuteArticle};
use ordlink_core::screen::{should_analyze, ScreenConfig};
use ordlink_core::{diff_articles, CancelFlag};
use ordlink_store::{AnalysisStore, ArticleStore, LinkStore};

/// One statute revision event: the statute plus its article sets on either
/// side of the revision.
#[derive(Debug, Clone)]
pub struct RevisionTrigger {
    pub statute_id: i64,
    pub revision_id: i64,
    pub revision_date: NaiveDate,
    pub old_articles: Vec<StatuteArticle>,
    pub new_articles: Vec<StatuteArticle>,
}

#[derive(Debug, Clone)]
pub struct ImpactJobConfig {
    pub screen: ScreenConfig,
    /// Pause between model calls.
    pub delay: Duration,
}

impl Default for ImpactJobConfig {
    fn default() -> Self {
        Self {
            screen: ScreenConfig::default(),
            delay: Duration::from_millis(1000),
        }
    }
}

/// Outcome of one pipeline run; `results` feeds the reviewer report.
#[derive(Debug, Default)]
pub struct ImpactRunSummary {
    pub deltas: usize,
    pub pairs_considered: usize,
    pub pairs_screened_out: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// Verdicts produced and persisted, in analysis order.
    pub results: Vec<ImpactAnalysisResult>,
}

pub struct RevisionImpactJob {
    analyzer: ImpactAnalyzer,
    config: ImpactJobConfig,
}

impl RevisionImpactJob {
    pub fn new(analyzer: ImpactAnalyzer, config: ImpactJobConfig) -> Self {
        Self { analyzer, config }
    }

    pub async fn run(
        &self,
        store: &(impl ArticleStore + LinkStore + AnalysisStore + ?Sized),
        trigger: &RevisionTrigger,
        cancel: &CancelFlag,
        progress: impl FnMut(usize, usize),
    ) -> Result<ImpactRunSummary> {
        let mut summary = ImpactRunSummary::default();

        let deltas = diff_articles(&trigger.old_articles, &trigger.new_articles);
        summary.deltas = deltas.len();
        if deltas.is_empty() {
            info!(statute_id = trigger.statute_id, "revision changed no articles");
            return Ok(summary);
        }

        let statute_name = store
            .statutes()
            .await?
            .into_iter()
            .find(|s| s.id == trigger.statute_id)
            .map(|s| s.name)
            .with_context(|| format!("statute {} not in store", trigger.statute_id))?;

        let links = store.links_for_statute(trigger.statute_id).await?;
        if links.is_empty() {
            info!(
                statute = %statute_name,
                deltas = summary.deltas,
                "no regulations linked to revised statute"
            );
            return Ok(summary);
        }

        let regulation_names: HashMap<i64, String> = store
            .regulations()
            .await?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();

        // Article-specific links point at old-side article ids.
        let old_ids: HashMap<&str, i64> = trigger
            .old_articles
            .iter()
            .map(|a| (a.number.as_str(), a.id))
            .collect();

        let mut articles_by_regulation: HashMap<i64, Vec<RegulationArticle>> = HashMap::new();
        let mut seen: HashSet<(String, i64)> = HashSet::new();
        let mut requests = Vec::new();

        for delta in &deltas {
            let old_article_id = old_ids.get(delta.article_number.as_str()).copied();
            for link in &links {
                if !link_applies(link, old_article_id) {
                    continue;
                }
                if !articles_by_regulation.contains_key(&link.regulation_id) {
                    let articles = store.regulation_articles(link.regulation_id).await?;
                    articles_by_regulation.insert(link.regulation_id, articles);
                }
                let articles = &articles_by_regulation[&link.regulation_id];
                let targets: Vec<&RegulationArticle> = match link.regulation_article_id {
                    Some(id) => articles.iter().filter(|a| a.id == id).collect(),
                    None => articles.iter().collect(),
                };
                for article in targets {
                    if !seen.insert((delta.article_number.clone(), article.id)) {
                        continue;
                    }
                    summary.pairs_considered += 1;
                    let decision = should_analyze(delta, &article.content, &self.config.screen);
                    if !decision.analyze {
                        debug!(
                            article = %delta.article_number,
                            regulation_article = article.id,
                            reason = decision.reason.as_str(),
                            "screened out"
                        );
                        summary.pairs_screened_out += 1;
                        continue;
                    }
                    let regulation_name = regulation_names
                        .get(&link.regulation_id)
                        .cloned()
                        .unwrap_or_else(|| format!("regulation {}", link.regulation_id));
                    requests.push(AnalysisRequest {
                        revision_id: trigger.revision_id,
                        regulation_id: link.regulation_id,
                        regulation_article_id: article.id,
                        statute_name: statute_name.clone(),
                        revision_date: trigger.revision_date,
                        article_number: delta.article_number.clone(),
                        old_content: delta.old_content.clone(),
                        new_content: delta.new_content.clone(),
                        regulation_name,
                        regulation_article_number: article.number.clone(),
                        regulation_article_content: article.content.clone(),
                    });
                }
            }
        }

        info!(
            statute = %statute_name,
            deltas = summary.deltas,
            pairs = summary.pairs_considered,
            screened_out = summary.pairs_screened_out,
            queued = requests.len(),
            "screening complete"
        );

        let batch = self
            .analyzer
            .analyze_batch(&requests, self.config.delay, cancel, progress)
            .await;
        summary.analyzed = batch.succeeded;
        summary.failed = batch.failed;
        summary.cancelled = batch.cancelled;

        for verdict in batch.results.into_iter().flatten() {
            store.insert_analysis(verdict.clone()).await?;
            summary.results.push(verdict);
        }

        info!(
            analyzed = summary.analyzed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "impact analysis finished"
        );
        Ok(summary)
    }
}

/// Whether a persisted link routes this delta to its regulation.
///
/// Statute-level links follow every delta. Article-specific links follow the
/// delta for their target article; an added article has no old-side id, so
/// every link to the statute fans out to it.
fn link_applies(link: &Link, old_article_id: Option<i64>) -> bool {
    match (link.statute_article_id, old_article_id) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(target), Some(old)) => target == old,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ordlink_ai::offline::OfflineModel;
    use ordlink_core::model::{
        ArticleKind, ImpactLevel, ImpactType, LinkKind, Regulation, RegulationKind, Statute,
        StatuteKind,
    };
    use ordlink_store::MemoryStore;

    fn statute_article(id: i64, number: &str, content: &str) -> StatuteArticle {
        StatuteArticle {
            id,
            statute_id: 1,
            revision_id: 0,
            number: number.to_string(),
            title: None,
            content: content.to_string(),
            kind: ArticleKind::Main,
            parent_number: None,
            embedding: None,
        }
    }

    fn regulation_article(id: i64, number: &str, content: &str) -> RegulationArticle {
        RegulationArticle {
            id,
            regulation_id: 1,
            number: number.to_string(),
            title: None,
            content: content.to_string(),
            kind: ArticleKind::Main,
            parent_number: None,
            embedding: None,
        }
    }

    fn link(id: i64, statute_article_id: Option<i64>) -> Link {
        Link {
            id,
            statute_id: 1,
            regulation_id: 1,
            statute_article_id,
            regulation_article_id: None,
            kind: LinkKind::Basis,
            confidence: 0.8,
            verified: false,
            verified_by: None,
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_statute(Statute {
                id: 1,
                name: "Waste Management Act".to_string(),
                kind: StatuteKind::Law,
                current_revision_id: Some(2),
            })
            .unwrap();
        store
            .insert_regulation(Regulation {
                id: 1,
                name: "City Waste Ordinance".to_string(),
                kind: RegulationKind::Ordinance,
                embedding: None,
            })
            .unwrap();
        store
    }

    fn job() -> RevisionImpactJob {
        let analyzer = ImpactAnalyzer::new(Arc::new(OfflineModel));
        let config = ImpactJobConfig {
            screen: ScreenConfig::default(),
            delay: Duration::ZERO,
        };
        RevisionImpactJob::new(analyzer, config)
    }

    fn trigger(old: Vec<StatuteArticle>, new: Vec<StatuteArticle>) -> RevisionTrigger {
        RevisionTrigger {
            statute_id: 1,
            revision_id: 2,
            revision_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            old_articles: old,
            new_articles: new,
        }
    }

    #[tokio::test]
    async fn modified_article_reaches_referencing_regulation_article() {
        let store = seeded_store();
        store.insert_link(link(1, Some(31))).unwrap();
        store
            .insert_regulation_article(regulation_article(
                10,
                "5",
                "Collection fees follow article 3 of the Act.",
            ))
            .unwrap();
        store
            .insert_regulation_article(regulation_article(11, "7", "Unrelated parking rules."))
            .unwrap();

        let trigger = trigger(
            vec![statute_article(
                31,
                "3",
                "Operators get a permit valid for three years.",
            )],
            vec![statute_article(
                41,
                "3",
                "Operators get a permit valid for two years.",
            )],
        );

        let summary = job()
            .run(&store, &trigger, &CancelFlag::default(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(summary.deltas, 1);
        assert_eq!(summary.pairs_considered, 2);
        assert_eq!(summary.pairs_screened_out, 1);
        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.failed, 0);

        assert_eq!(summary.results.len(), 1);
        let verdict = &summary.results[0];
        assert_eq!(verdict.regulation_article_id, 10);
        assert_eq!(verdict.statute_article_number, "3");
        assert_eq!(verdict.impact_level, ImpactLevel::Low);
        assert_eq!(verdict.model, "offline");

        let persisted = store.analyses_for_revision(2).await.unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn deleted_article_is_flagged_for_required_amendment() {
        let store = seeded_store();
        store.insert_link(link(1, None)).unwrap();
        store
            .insert_regulation_article(regulation_article(
                10,
                "2",
                "Permit revocation follows article 9 of the Act.",
            ))
            .unwrap();

        let trigger = trigger(
            vec![statute_article(
                32,
                "9",
                "Revoked permits may be appealed within 14 days.",
            )],
            vec![],
        );

        let summary = job()
            .run(&store, &trigger, &CancelFlag::default(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(summary.analyzed, 1);
        let verdict = &summary.results[0];
        assert_eq!(verdict.impact_level, ImpactLevel::High);
        assert_eq!(verdict.impact_type, ImpactType::RequiredAmendment);
    }

    #[tokio::test]
    async fn added_article_fans_out_through_article_specific_links() {
        let store = seeded_store();
        store.insert_link(link(1, Some(31))).unwrap();
        store
            .insert_regulation_article(regulation_article(10, "4", "Anything at all."))
            .unwrap();

        let old = vec![statute_article(31, "3", "Existing rules stay.")];
        let mut new = old.clone();
        new.push(statute_article(
            42,
            "12",
            "Operators must file an annual report.",
        ));

        let summary = job()
            .run(&store, &trigger(old, new), &CancelFlag::default(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(summary.deltas, 1);
        assert_eq!(summary.pairs_considered, 1);
        assert_eq!(summary.pairs_screened_out, 0);
        assert_eq!(summary.analyzed, 1);
        let verdict = &summary.results[0];
        assert_eq!(verdict.impact_level, ImpactLevel::Medium);
        assert_eq!(verdict.impact_type, ImpactType::ReviewNeeded);
    }

    #[tokio::test]
    async fn identical_revisions_short_circuit() {
        let store = seeded_store();
        let articles = vec![statute_article(31, "3", "Nothing changes.")];

        let summary = job()
            .run(
                &store,
                &trigger(articles.clone(), articles),
                &CancelFlag::default(),
                |_, _| {},
            )
            .await
            .unwrap();

        assert_eq!(summary.deltas, 0);
        assert_eq!(summary.pairs_considered, 0);
        assert!(summary.results.is_empty());
    }

    #[tokio::test]
    async fn unlinked_statute_queues_nothing() {
        let store = seeded_store();
        store
            .insert_regulation_article(regulation_article(10, "1", "Some text."))
            .unwrap();

        let trigger = trigger(
            vec![statute_article(31, "3", "Before.")],
            vec![statute_article(41, "3", "After.")],
        );

        let mut calls = 0;
        let summary = job()
            .run(&store, &trigger, &CancelFlag::default(), |_, _| calls += 1)
            .await
            .unwrap();

        assert_eq!(summary.deltas, 1);
        assert_eq!(summary.pairs_considered, 0);
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn missing_statute_is_an_error() {
        let store = MemoryStore::new();
        let trigger = trigger(
            vec![statute_article(31, "3", "Before.")],
            vec![statute_article(41, "3", "After.")],
        );

        let err = job()
            .run(&store, &trigger, &CancelFlag::default(), |_, _| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("statute 1 not in store"));
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_first_model_call() {
        let store = seeded_store();
        store.insert_link(link(1, None)).unwrap();
        store
            .insert_regulation_article(regulation_article(
                10,
                "5",
                "Fees follow article 3 of the Act.",
            ))
            .unwrap();

        let trigger = trigger(
            vec![statute_article(31, "3", "Before.")],
            vec![statute_article(41, "3", "After the permit change.")],
        );

        let cancel = CancelFlag::default();
        cancel.cancel();
        let summary = job()
            .run(&store, &trigger, &cancel, |_, _| {})
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.analyzed, 0);
        assert!(summary.results.is_empty());
        assert!(store.analyses_for_revision(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_reports_done_and_total_monotonically() {
        let store = seeded_store();
        store.insert_link(link(1, None)).unwrap();
        store
            .insert_regulation_article(regulation_article(
                10,
                "5",
                "Fees follow article 3 of the Act.",
            ))
            .unwrap();
        store
            .insert_regulation_article(regulation_article(
                11,
                "6",
                "Permits under article 3 of the Act.",
            ))
            .unwrap();

        let trigger = trigger(
            vec![statute_article(31, "3", "Before.")],
            vec![statute_article(41, "3", "After.")],
        );

        let mut seen = Vec::new();
        let summary = job()
            .run(&store, &trigger, &CancelFlag::default(), |done, total| {
                seen.push((done, total))
            })
            .await
            .unwrap();

        assert_eq!(summary.analyzed, 2);
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }
}
