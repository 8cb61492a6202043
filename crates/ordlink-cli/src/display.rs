//! Terminal rendering for deltas, links, and impact reports.
//!
//! Tables list one row per record; impact verdicts render as vertical cards
//! grouped per pair, most severe first.

use std::cmp::Ordering;
use std::collections::HashMap;

use ordlink_core::model::{ImpactAnalysisResult, ImpactLevel, Link, RevisionDelta};

const SNIPPET_LEN: usize = 60;

// ── Revision deltas ──

pub fn print_deltas(deltas: &[RevisionDelta]) {
    if deltas.is_empty() {
        println!("No changed articles.");
        return;
    }
    println!("Changed articles ({})", deltas.len());
    println!();
    println!("  {:<10} {:<10} {}", "article", "change", "text");
    for delta in deltas {
        let text = delta
            .new_content
            .as_deref()
            .or(delta.old_content.as_deref())
            .unwrap_or_default();
        println!(
            "  {:<10} {:<10} {}",
            delta.article_number,
            delta.change.as_str(),
            snippet(text)
        );
    }
}

// ── Link table ──

pub fn print_links(
    links: &[Link],
    statute_names: &HashMap<i64, String>,
    regulation_names: &HashMap<i64, String>,
    article_numbers: &HashMap<i64, String>,
) {
    if links.is_empty() {
        println!("No links.");
        return;
    }
    println!("Links ({})", links.len());
    println!();
    for link in links {
        let regulation = name_or_id(regulation_names, link.regulation_id);
        let mut target = name_or_id(statute_names, link.statute_id);
        if let Some(article_id) = link.statute_article_id {
            if let Some(number) = article_numbers.get(&article_id) {
                target = format!("{target} art. {number}");
            }
        }
        let review = if link.verified {
            format!("verified by {}", link.verified_by.as_deref().unwrap_or("?"))
        } else {
            "unverified".to_string()
        };
        println!(
            "  {:<30} -> {:<36} {:<22} {:>5.2}  {}",
            snippet_width(&regulation, 30),
            snippet_width(&target, 36),
            link.kind.as_str(),
            link.confidence,
            review
        );
    }
}

// ── Impact report ──

pub fn print_impact_report(
    results: &[ImpactAnalysisResult],
    regulation_names: &HashMap<i64, String>,
    regulation_article_numbers: &HashMap<i64, String>,
) {
    if results.is_empty() {
        println!("No impact verdicts.");
        return;
    }

    let mut ordered: Vec<&ImpactAnalysisResult> = results.iter().collect();
    ordered.sort_by(|a, b| {
        a.impact_level.cmp(&b.impact_level).then(
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal),
        )
    });

    for result in &ordered {
        let regulation = name_or_id(regulation_names, result.regulation_id);
        let article = regulation_article_numbers
            .get(&result.regulation_article_id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", result.regulation_article_id));
        println!();
        println!(
            "=== {} | statute art. {} -> {} art. {} ===",
            result.impact_level.as_str(),
            result.statute_article_number,
            regulation,
            article
        );
        print_field("impact type", result.impact_type.as_str());
        print_field("confidence", &format!("{:.2}", result.confidence));
        print_field("summary", &result.change_summary);
        print_field("recommendation", &result.recommendation);
        if let Some(reasoning) = &result.reasoning {
            print_field("reasoning", reasoning);
        }
        print_field("model", &result.model);
    }

    let count = |level: ImpactLevel| {
        ordered
            .iter()
            .filter(|r| r.impact_level == level)
            .count()
    };
    println!();
    println!(
        "{} high, {} medium, {} low",
        count(ImpactLevel::High),
        count(ImpactLevel::Medium),
        count(ImpactLevel::Low)
    );
}

fn print_field(name: &str, value: &str) {
    println!("  {:<16} {}", name, value);
}

fn name_or_id(names: &HashMap<i64, String>, id: i64) -> String {
    names.get(&id).cloned().unwrap_or_else(|| format!("#{id}"))
}

/// One-line excerpt: whitespace collapsed, cut at a char boundary.
fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    snippet_width(&flat, SNIPPET_LEN)
}

fn snippet_width(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
