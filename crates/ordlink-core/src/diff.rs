//! Revision diffing: classify per-article change between two article sets.

use std::collections::HashMap;

use crate::article_no::sort_key;
use crate::model::{ChangeKind, RevisionDelta, StatuteArticle};

/// Compare two article sets of the same statute, old revision against new.
///
/// Articles are matched by `number`. Present only in `new` is `added`, only
/// in `old` is `deleted`, present in both with content differing by exact
/// string inequality is `modified`. Identical content produces no delta, and
/// a title-only change produces no delta either. Every changed number
/// appears exactly once, ordered by [`sort_key`] so downstream reports are
/// deterministic.
pub fn diff_articles(old: &[StatuteArticle], new: &[StatuteArticle]) -> Vec<RevisionDelta> {
    let old_by_number: HashMap<&str, &StatuteArticle> =
        old.iter().map(|a| (a.number.as_str(), a)).collect();
    let new_by_number: HashMap<&str, &StatuteArticle> =
        new.iter().map(|a| (a.number.as_str(), a)).collect();

    let mut deltas = Vec::new();

    for article in new {
        match old_by_number.get(article.number.as_str()) {
            None => deltas.push(RevisionDelta {
                article_number: article.number.clone(),
                change: ChangeKind::Added,
                old_title: None,
                new_title: article.title.clone(),
                old_content: None,
                new_content: Some(article.content.clone()),
            }),
            Some(prev) if prev.content != article.content => deltas.push(RevisionDelta {
                article_number: article.number.clone(),
                change: ChangeKind::Modified,
                old_title: prev.title.clone(),
                new_title: article.title.clone(),
                old_content: Some(prev.content.clone()),
                new_content: Some(article.content.clone()),
            }),
            Some(_) => {}
        }
    }

    for article in old {
        if !new_by_number.contains_key(article.number.as_str()) {
            deltas.push(RevisionDelta {
                article_number: article.number.clone(),
                change: ChangeKind::Deleted,
                old_title: article.title.clone(),
                new_title: None,
                old_content: Some(article.content.clone()),
                new_content: None,
            });
        }
    }

    deltas.sort_by_key(|d| sort_key(&d.article_number));
    deltas
}
