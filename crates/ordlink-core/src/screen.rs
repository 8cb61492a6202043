//! Heuristic screen for (statute delta, regulation article) pairs.
//!
//! A deterministic gate of substring and keyword scans that bounds how many
//! pairs reach the generative analyzer. It errs towards letting pairs
//! through: a missed impact costs more than a wasted model call, and false
//! negatives are the accepted tradeoff only for pairs with no textual
//! overlap at all.

use crate::model::{ChangeKind, RevisionDelta};

/// Legally significant keyword classes scanned for overlap between statute
/// and regulation text. Grouped for curation; matching is per keyword,
/// case-insensitive, lowercase entries only.
pub const SIGNIFICANT_KEYWORDS: &[&str] = &[
    // Obligation
    "shall",
    "must",
    "obligation",
    "duty",
    "required",
    // Prohibition
    "prohibit",
    "shall not",
    "restrict",
    "forbidden",
    // Penalty
    "penalty",
    "fine",
    "sanction",
    "punishable",
    // Deadline
    "deadline",
    "no later than",
    "within",
    "time limit",
    // Procedure
    "procedure",
    "application",
    "submit",
    "notify",
    "report",
    // Approval
    "approval",
    "permit",
    "licen",
    "authoriz",
    "consent",
    // Scope
    "applies to",
    "scope",
    "exclude",
    "include",
    "exempt",
];

/// Tunable screen configuration.
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    /// Keywords scanned for shared use; must be lowercase.
    pub keywords: Vec<String>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            keywords: SIGNIFICANT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Why the screen let a pair through or dropped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenReason {
    NewArticle,
    NoContentChange,
    DirectReference,
    SharedKeyword,
    NoOverlap,
}

impl ScreenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenReason::NewArticle => "new article",
            ScreenReason::NoContentChange => "no content change",
            ScreenReason::DirectReference => "direct reference",
            ScreenReason::SharedKeyword => "shared significant keyword",
            ScreenReason::NoOverlap => "no direct reference or shared keywords",
        }
    }
}

/// Outcome of screening one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDecision {
    pub analyze: bool,
    pub reason: ScreenReason,
}

impl ScreenDecision {
    fn analyze(reason: ScreenReason) -> Self {
        Self {
            analyze: true,
            reason,
        }
    }

    fn skip(reason: ScreenReason) -> Self {
        Self {
            analyze: false,
            reason,
        }
    }
}

/// Decide whether `delta` warrants deep analysis against one regulation
/// article, in priority order: a newly added article always passes, a
/// modification with byte-identical content never does, a direct reference
/// to the changed article number passes, and otherwise a shared significant
/// keyword between the regulation text and either side of the statute change
/// passes. Constant work per pair apart from the bounded text scans.
pub fn should_analyze(
    delta: &RevisionDelta,
    regulation_text: &str,
    config: &ScreenConfig,
) -> ScreenDecision {
    if delta.change == ChangeKind::Added {
        return ScreenDecision::analyze(ScreenReason::NewArticle);
    }

    if delta.change == ChangeKind::Modified && delta.old_content == delta.new_content {
        return ScreenDecision::skip(ScreenReason::NoContentChange);
    }

    let regulation_lower = regulation_text.to_lowercase();
    if references_article(&regulation_lower, &delta.article_number) {
        return ScreenDecision::analyze(ScreenReason::DirectReference);
    }

    let mut statute_lower = String::new();
    if let Some(old) = &delta.old_content {
        statute_lower.push_str(&old.to_lowercase());
        statute_lower.push('\n');
    }
    if let Some(new) = &delta.new_content {
        statute_lower.push_str(&new.to_lowercase());
    }

    for keyword in &config.keywords {
        if regulation_lower.contains(keyword.as_str()) && statute_lower.contains(keyword.as_str()) {
            return ScreenDecision::analyze(ScreenReason::SharedKeyword);
        }
    }

    ScreenDecision::skip(ScreenReason::NoOverlap)
}

/// True when the lowercased text contains "article <number>" as a whole
/// reference: "article 5" must not match inside "article 5-2" or
/// "article 52".
fn references_article(text_lower: &str, number: &str) -> bool {
    let token = format!("article {}", number.trim().to_lowercase());
    let mut from = 0usize;
    while let Some(pos) = text_lower[from..].find(&token) {
        let end = from + pos + token.len();
        let is_boundary = text_lower[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_digit() && c != '-');
        if is_boundary {
            return true;
        }
        from = end;
    }
    false
}
