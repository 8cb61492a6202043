//! Shared entities for the statute/ordinance linkage and impact pipeline.
//!
//! Row identifiers are assigned by the persistence collaborator; nothing in
//! the core invents them. Embeddings travel alongside the text they were
//! computed from and must be recomputed whenever that text changes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of superior statute in the national hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatuteKind {
    Law,
    Decree,
    Rule,
}

/// A superior statute: national law, implementing decree, or rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statute {
    pub id: i64,
    pub name: String,
    pub kind: StatuteKind,
    /// Revision currently in force; `None` until the first revision lands.
    pub current_revision_id: Option<i64>,
}

/// One detected revision of a statute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteRevision {
    pub id: i64,
    pub statute_id: i64,
    pub revision_date: NaiveDate,
    pub note: Option<String>,
}

/// Structural position of an article within a statute or regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleKind {
    Main,
    Addendum,
    Appendix,
}

/// One article of a statute revision.
///
/// `number` is unique within a (statute, revision) pair and may carry dash
/// sub-numbering ("5-2" is the second article inserted after article 5).
/// `parent_number` is a lookup-only back-reference for display; articles
/// never own their parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatuteArticle {
    pub id: i64,
    pub statute_id: i64,
    pub revision_id: i64,
    pub number: String,
    pub title: Option<String>,
    pub content: String,
    pub kind: ArticleKind,
    pub parent_number: Option<String>,
    /// Article-level vector, conformed to the canonical dimension. Stale the
    /// moment `content` changes.
    pub embedding: Option<Vec<f32>>,
}

/// Kind of local regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegulationKind {
    Ordinance,
    Rule,
}

/// A local regulation subordinate to one or more statutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regulation {
    pub id: i64,
    pub name: String,
    pub kind: RegulationKind,
    /// Document-level vector pooled from the article vectors.
    pub embedding: Option<Vec<f32>>,
}

/// One article of a local regulation. Same numbering invariants as
/// [`StatuteArticle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulationArticle {
    pub id: i64,
    pub regulation_id: i64,
    pub number: String,
    pub title: Option<String>,
    pub content: String,
    pub kind: ArticleKind,
    pub parent_number: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// How a regulation is grounded in a statute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// The statute is the regulation's legal basis.
    Basis,
    /// The regulation applies the statute by explicit reference.
    AppliedByReference,
    /// Informational cross-reference.
    Reference,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::Basis => "basis",
            LinkKind::AppliedByReference => "applied-by-reference",
            LinkKind::Reference => "reference",
        }
    }
}

/// A scored association from a local regulation to a statute.
///
/// The automated linkage pass only ever writes `basis` links; `verified`,
/// `verified_by`, and any reclassified `kind` are human-review state and
/// survive re-runs untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub statute_id: i64,
    pub regulation_id: i64,
    pub statute_article_id: Option<i64>,
    pub regulation_article_id: Option<i64>,
    pub kind: LinkKind,
    /// Similarity score in [0, 1]; candidates below the linker threshold are
    /// never written.
    pub confidence: f32,
    pub verified: bool,
    pub verified_by: Option<String>,
}

/// Stable upsert key for a [`Link`]: re-running the linkage builder updates
/// the row with the same key instead of inserting a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub regulation_id: i64,
    pub statute_article_id: Option<i64>,
}

impl Link {
    pub fn key(&self) -> LinkKey {
        LinkKey {
            regulation_id: self.regulation_id,
            statute_article_id: self.statute_article_id,
        }
    }
}

/// Per-article classification of change between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// One changed article between two revisions of a statute.
///
/// `old_content` is present for `modified` and `deleted`, `new_content` for
/// `added` and `modified`. Titles ride along for display but never trigger a
/// delta on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionDelta {
    pub article_number: String,
    pub change: ChangeKind,
    pub old_title: Option<String>,
    pub new_title: Option<String>,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
}

/// Severity of a detected impact. Ordering follows declaration, so sorting
/// ascending puts the most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::High => "HIGH",
            ImpactLevel::Medium => "MEDIUM",
            ImpactLevel::Low => "LOW",
        }
    }

    /// Parse the wire token; `None` for anything else.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "HIGH" => Some(ImpactLevel::High),
            "MEDIUM" => Some(ImpactLevel::Medium),
            "LOW" => Some(ImpactLevel::Low),
            _ => None,
        }
    }
}

/// Recommended follow-up action for a reviewed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactType {
    RequiredAmendment,
    RecommendedAmendment,
    ReviewNeeded,
    NoImpact,
}

impl ImpactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactType::RequiredAmendment => "required-amendment",
            ImpactType::RecommendedAmendment => "recommended-amendment",
            ImpactType::ReviewNeeded => "review-needed",
            ImpactType::NoImpact => "no-impact",
        }
    }

    /// Parse the wire token; `None` for anything else.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "required-amendment" => Some(ImpactType::RequiredAmendment),
            "recommended-amendment" => Some(ImpactType::RecommendedAmendment),
            "review-needed" => Some(ImpactType::ReviewNeeded),
            "no-impact" => Some(ImpactType::NoImpact),
            _ => None,
        }
    }
}

/// One impact verdict for a (revision, regulation, statute article,
/// regulation article) tuple.
///
/// Immutable once created: re-analysis appends a new result rather than
/// mutating history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysisResult {
    pub revision_id: i64,
    pub regulation_id: i64,
    pub statute_article_number: String,
    pub regulation_article_id: i64,
    pub impact_level: ImpactLevel,
    pub impact_type: ImpactType,
    pub change_summary: String,
    pub recommendation: String,
    /// Model confidence in [0, 1].
    pub confidence: f32,
    /// Free-text audit trail from the model, when it offered one.
    pub reasoning: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    /// Provider model that produced this verdict.
    pub model: String,
}
