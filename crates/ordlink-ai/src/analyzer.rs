//! Impact analysis: fixed prompt contract, strict JSON verdict parsing, and
//! sequential batch processing with cancellation.
//!
//! The verdict parse never defaults a missing field into a usable result; a
//! reply that does not satisfy the contract fails that pair. The only
//! tolerated deviations are a Markdown code fence around the JSON and an
//! out-of-range confidence, which is clamped with a warning.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use ordlink_core::model::{ImpactAnalysisResult, ImpactLevel, ImpactType};
use ordlink_core::CancelFlag;

use crate::generate::{AnalyzeError, GenerativeModel};

/// Decision rubric and output schema handed to the model on every call.
const SYSTEM_PROMPT: &str = "\
You are a legal analyst reviewing how a revision of a superior statute affects a subordinate local regulation.

Respond with a single JSON object and nothing else, using exactly these fields:
  \"impact_level\": \"HIGH\" | \"MEDIUM\" | \"LOW\"
  \"impact_type\": \"required-amendment\" | \"recommended-amendment\" | \"review-needed\" | \"no-impact\"
  \"change_summary\": one or two sentences describing what changed in the statute
  \"ai_recommendation\": the concrete action the reviewing official should take
  \"confidence_score\": a number between 0 and 1
  \"reasoning\": a brief justification (optional)

Decision rubric:
  HIGH means the regulation now contradicts the revised statute and requires immediate amendment.
  MEDIUM means an amendment is recommended to keep the regulation consistent with the statute.
  LOW means the change is minor or merely informational for this regulation.";

// Placeholder markers for the absent side of a delta; the offline model
// keys off these, keep them in sync.
pub(crate) const NO_PRIOR_VERSION: &str = "(no previous version: newly added article)";
pub(crate) const REPEALED: &str = "(repealed: article removed by this revision)";

/// One (statute delta, regulation article) pair queued for deep analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub revision_id: i64,
    pub regulation_id: i64,
    pub regulation_article_id: i64,
    pub statute_name: String,
    pub revision_date: NaiveDate,
    pub article_number: String,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub regulation_name: String,
    pub regulation_article_number: String,
    pub regulation_article_content: String,
}

/// Outcome of a batch run: one slot per processed request, in order.
#[derive(Debug)]
pub struct AnalysisBatch {
    pub results: Vec<Result<ImpactAnalysisResult, AnalyzeError>>,
    pub succeeded: usize,
    pub failed: usize,
    /// True when the run stopped at the between-item cancellation check;
    /// unprocessed requests have no slot.
    pub cancelled: bool,
}

/// Drives a generative model through the prompt/verdict contract.
pub struct ImpactAnalyzer {
    model: Arc<dyn GenerativeModel>,
}

impl ImpactAnalyzer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Model identifier stamped onto produced results.
    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Analyze one pair.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<ImpactAnalysisResult, AnalyzeError> {
        let prompt = build_user_prompt(request);
        let reply = self.model.complete(SYSTEM_PROMPT, &prompt).await?;
        debug!(
            article = %request.article_number,
            regulation = %request.regulation_name,
            "received impact verdict"
        );
        let verdict = parse_verdict(&reply)?;
        Ok(ImpactAnalysisResult {
            revision_id: request.revision_id,
            regulation_id: request.regulation_id,
            statute_article_number: request.article_number.clone(),
            regulation_article_id: request.regulation_article_id,
            impact_level: verdict.level,
            impact_type: verdict.impact_type,
            change_summary: verdict.change_summary,
            recommendation: verdict.recommendation,
            confidence: verdict.confidence,
            reasoning: verdict.reasoning,
            analyzed_at: Utc::now(),
            model: self.model.model_name().to_string(),
        })
    }

    /// Sequential batch with a fixed pause between calls. One pair's failure
    /// never aborts the rest; cancellation is honoured between items, and
    /// `progress` is called with (done, total) after each item.
    pub async fn analyze_batch<F>(
        &self,
        requests: &[AnalysisRequest],
        delay: Duration,
        cancel: &CancelFlag,
        mut progress: F,
    ) -> AnalysisBatch
    where
        F: FnMut(usize, usize),
    {
        let total = requests.len();
        let mut results = Vec::with_capacity(total);
        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = false;

        for (done, request) in requests.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if done > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.analyze(request).await {
                Ok(result) => {
                    succeeded += 1;
                    results.push(Ok(result));
                }
                Err(err) => {
                    warn!(
                        article = %request.article_number,
                        regulation = %request.regulation_name,
                        error = %err,
                        "impact analysis failed for pair"
                    );
                    failed += 1;
                    results.push(Err(err));
                }
            }
            progress(done + 1, total);
        }

        AnalysisBatch {
            results,
            succeeded,
            failed,
            cancelled,
        }
    }
}

pub(crate) fn build_user_prompt(request: &AnalysisRequest) -> String {
    let old = request.old_content.as_deref().unwrap_or(NO_PRIOR_VERSION);
    let new = request.new_content.as_deref().unwrap_or(REPEALED);
    format!(
        "## Revised statute\n\
         Name: {statute}\n\
         Revision date: {date}\n\
         Article: {article}\n\n\
         ### Previous version\n{old}\n\n\
         ### Revised version\n{new}\n\n\
         ## Local regulation under review\n\
         Name: {regulation}\n\
         Article: {regulation_article}\n\n\
         ### Regulation article text\n{regulation_text}\n\n\
         Assess the impact of this statute revision on the regulation article.",
        statute = request.statute_name,
        date = request.revision_date,
        article = request.article_number,
        old = old,
        new = new,
        regulation = request.regulation_name,
        regulation_article = request.regulation_article_number,
        regulation_text = request.regulation_article_content,
    )
}

#[derive(Debug)]
struct Verdict {
    level: ImpactLevel,
    impact_type: ImpactType,
    change_summary: String,
    recommendation: String,
    confidence: f32,
    reasoning: Option<String>,
}

#[derive(Deserialize)]
struct RawVerdict {
    impact_level: Option<String>,
    impact_type: Option<String>,
    change_summary: Option<String>,
    ai_recommendation: Option<String>,
    confidence_score: Option<f32>,
    reasoning: Option<String>,
}

/// Strip a surrounding Markdown code fence, with or without a `json` tag.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn parse_verdict(reply: &str) -> Result<Verdict, AnalyzeError> {
    let raw: RawVerdict = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| AnalyzeError::Parse(e.to_string()))?;

    let level_token = raw
        .impact_level
        .ok_or(AnalyzeError::MissingField("impact_level"))?;
    let level = ImpactLevel::from_token(&level_token).ok_or(AnalyzeError::InvalidField {
        field: "impact_level",
        value: level_token,
    })?;

    let type_token = raw
        .impact_type
        .ok_or(AnalyzeError::MissingField("impact_type"))?;
    let impact_type = ImpactType::from_token(&type_token).ok_or(AnalyzeError::InvalidField {
        field: "impact_type",
        value: type_token,
    })?;

    let change_summary = raw
        .change_summary
        .ok_or(AnalyzeError::MissingField("change_summary"))?;
    let recommendation = raw
        .ai_recommendation
        .ok_or(AnalyzeError::MissingField("ai_recommendation"))?;
    let mut confidence = raw
        .confidence_score
        .ok_or(AnalyzeError::MissingField("confidence_score"))?;

    if !(0.0..=1.0).contains(&confidence) {
        warn!(confidence, "model confidence out of range, clamping");
        confidence = confidence.clamp(0.0, 1.0);
    }

    Ok(Verdict {
        level,
        impact_type,
        change_summary,
        recommendation,
        confidence,
        reasoning: raw.reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn request(article: &str) -> AnalysisRequest {
        AnalysisRequest {
            revision_id: 1,
            regulation_id: 2,
            regulation_article_id: 3,
            statute_name: "Framework Act on Waste".into(),
            revision_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            article_number: article.into(),
            old_content: Some("Old statutory wording.".into()),
            new_content: Some("New statutory wording.".into()),
            regulation_name: "City Waste Ordinance".into(),
            regulation_article_number: "12".into(),
            regulation_article_content: "Collection fees shall be set by the mayor.".into(),
        }
    }

    fn verdict_json(level: &str) -> String {
        format!(
            "{{\"impact_level\":\"{level}\",\"impact_type\":\"review-needed\",\
             \"change_summary\":\"Wording changed.\",\"ai_recommendation\":\"Review fees.\",\
             \"confidence_score\":0.8,\"reasoning\":\"fee basis moved\"}}"
        )
    }

    #[test]
    fn prompt_carries_every_section() {
        let prompt = build_user_prompt(&request("5-2"));
        assert!(prompt.contains("Framework Act on Waste"));
        assert!(prompt.contains("2026-03-01"));
        assert!(prompt.contains("Article: 5-2"));
        assert!(prompt.contains("Old statutory wording."));
        assert!(prompt.contains("New statutory wording."));
        assert!(prompt.contains("City Waste Ordinance"));
        assert!(prompt.contains("Collection fees shall be set by the mayor."));
    }

    #[test]
    fn prompt_marks_added_and_repealed_articles() {
        let mut added = request("9");
        added.old_content = None;
        assert!(build_user_prompt(&added).contains(NO_PRIOR_VERSION));

        let mut deleted = request("4");
        deleted.new_content = None;
        assert!(build_user_prompt(&deleted).contains(REPEALED));
    }

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = parse_verdict(&verdict_json("HIGH")).unwrap();
        assert_eq!(plain.level, ImpactLevel::High);
        assert_eq!(plain.impact_type, ImpactType::ReviewNeeded);
        assert_eq!(plain.confidence, 0.8);
        assert_eq!(plain.reasoning.as_deref(), Some("fee basis moved"));

        let fenced = format!("```json\n{}\n```", verdict_json("LOW"));
        let parsed = parse_verdict(&fenced).unwrap();
        assert_eq!(parsed.level, ImpactLevel::Low);

        let bare_fence = format!("```\n{}\n```", verdict_json("MEDIUM"));
        assert_eq!(parse_verdict(&bare_fence).unwrap().level, ImpactLevel::Medium);
    }

    #[test]
    fn missing_field_is_an_error() {
        let reply = "{\"impact_type\":\"no-impact\",\"change_summary\":\"x\",\
                     \"ai_recommendation\":\"y\",\"confidence_score\":0.5}";
        match parse_verdict(reply) {
            Err(AnalyzeError::MissingField(field)) => assert_eq!(field, "impact_level"),
            other => panic!("expected missing field, got {other:?}"),
        }
    }

    #[test]
    fn invalid_enum_token_is_an_error() {
        let reply = "{\"impact_level\":\"SEVERE\",\"impact_type\":\"review-needed\",\
                     \"change_summary\":\"x\",\"ai_recommendation\":\"y\",\"confidence_score\":0.5}";
        match parse_verdict(reply) {
            Err(AnalyzeError::InvalidField { field, value }) => {
                assert_eq!(field, "impact_level");
                assert_eq!(value, "SEVERE");
            }
            other => panic!("expected invalid field, got {other:?}"),
        }
    }

    #[test]
    fn non_json_reply_is_a_parse_error() {
        assert!(matches!(
            parse_verdict("the impact is probably low"),
            Err(AnalyzeError::Parse(_))
        ));
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let reply = "{\"impact_level\":\"LOW\",\"impact_type\":\"no-impact\",\
                     \"change_summary\":\"x\",\"ai_recommendation\":\"y\",\"confidence_score\":1.7}";
        assert_eq!(parse_verdict(reply).unwrap().confidence, 1.0);

        let reply = "{\"impact_level\":\"LOW\",\"impact_type\":\"no-impact\",\
                     \"change_summary\":\"x\",\"ai_recommendation\":\"y\",\"confidence_score\":-0.2}";
        assert_eq!(parse_verdict(reply).unwrap().confidence, 0.0);
    }

    #[test]
    fn reasoning_is_optional() {
        let reply = "{\"impact_level\":\"LOW\",\"impact_type\":\"no-impact\",\
                     \"change_summary\":\"x\",\"ai_recommendation\":\"y\",\"confidence_score\":0.4}";
        assert_eq!(parse_verdict(reply).unwrap().reasoning, None);
    }

    /// Scripted model: pops one canned reply per call.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, AnalyzeError>>>,
    }

    impl ScriptedModel {
        fn new(mut replies: Vec<Result<String, AnalyzeError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, AnalyzeError> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AnalyzeError::MalformedResponse("script exhausted".into())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn batch_keeps_a_slot_per_request() {
        let analyzer = ImpactAnalyzer::new(Arc::new(ScriptedModel::new(vec![
            Ok(verdict_json("HIGH")),
            Err(AnalyzeError::Api {
                status: 500,
                body: "boom".into(),
            }),
            Ok(verdict_json("LOW")),
        ])));
        let requests = vec![request("1"), request("2"), request("3")];
        let batch = analyzer
            .analyze_batch(&requests, Duration::ZERO, &CancelFlag::new(), |_, _| {})
            .await;

        assert_eq!(batch.results.len(), 3);
        assert_eq!(batch.succeeded, 2);
        assert_eq!(batch.failed, 1);
        assert!(!batch.cancelled);
        assert!(batch.results[0].is_ok());
        assert!(batch.results[1].is_err());
        assert!(batch.results[2].is_ok());
        assert_eq!(
            batch.results[2].as_ref().unwrap().statute_article_number,
            "3"
        );
        assert_eq!(batch.results[0].as_ref().unwrap().model, "scripted");
    }

    #[tokio::test]
    async fn batch_progress_is_monotonic() {
        let analyzer = ImpactAnalyzer::new(Arc::new(ScriptedModel::new(vec![
            Ok(verdict_json("LOW")),
            Ok(verdict_json("LOW")),
        ])));
        let requests = vec![request("1"), request("2")];
        let mut seen = Vec::new();
        analyzer
            .analyze_batch(&requests, Duration::ZERO, &CancelFlag::new(), |done, total| {
                seen.push((done, total))
            })
            .await;
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn cancellation_stops_between_items() {
        let analyzer = ImpactAnalyzer::new(Arc::new(ScriptedModel::new(vec![
            Ok(verdict_json("LOW")),
            Ok(verdict_json("LOW")),
            Ok(verdict_json("LOW")),
        ])));
        let requests = vec![request("1"), request("2"), request("3")];
        let cancel = CancelFlag::new();
        let cancel_after_first = cancel.clone();
        let batch = analyzer
            .analyze_batch(&requests, Duration::ZERO, &cancel, move |done, _| {
                if done == 1 {
                    cancel_after_first.cancel();
                }
            })
            .await;

        assert!(batch.cancelled);
        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.succeeded, 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let analyzer = ImpactAnalyzer::new(Arc::new(ScriptedModel::new(Vec::new())));
        let batch = analyzer
            .analyze_batch(&[], Duration::ZERO, &CancelFlag::new(), |_, _| {})
            .await;
        assert!(batch.results.is_empty());
        assert_eq!(batch.succeeded, 0);
        assert_eq!(batch.failed, 0);
        assert!(!batch.cancelled);
    }
}
