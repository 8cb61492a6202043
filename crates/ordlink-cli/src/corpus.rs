//! JSON corpus files on disk.
//!
//! A corpus directory holds one JSON array per entity: `statutes.json`,
//! `statute_articles.json`, `regulations.json` and `regulation_articles.json`
//! are required; `statute_revisions.json` and `links.json` are optional.
//! Embeddings and links computed by a run are written back to the same files
//! so the next run starts where this one finished.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use ordlink_core::model::{
    Link, Regulation, RegulationArticle, Statute, StatuteArticle, StatuteRevision,
};
use ordlink_store::MemoryStore;

#[derive(Debug, Default)]
pub struct CorpusStats {
    pub statutes: usize,
    pub statute_articles: usize,
    pub regulations: usize,
    pub regulation_articles: usize,
    pub links: usize,
}

/// Load a corpus directory into the store.
pub fn load(dir: &Path, store: &MemoryStore) -> Result<CorpusStats> {
    let mut stats = CorpusStats::default();

    let statutes: Vec<Statute> = read_json(&dir.join("statutes.json"))?;
    stats.statutes = statutes.len();
    for statute in statutes {
        store.insert_statute(statute)?;
    }

    let revisions: Vec<StatuteRevision> = read_optional(&dir.join("statute_revisions.json"))?;
    for revision in revisions {
        store.insert_revision(revision)?;
    }

    let articles: Vec<StatuteArticle> = read_json(&dir.join("statute_articles.json"))?;
    stats.statute_articles = articles.len();
    for article in articles {
        store.insert_statute_article(article)?;
    }

    let regulations: Vec<Regulation> = read_json(&dir.join("regulations.json"))?;
    stats.regulations = regulations.len();
    for regulation in regulations {
        store.insert_regulation(regulation)?;
    }

    let articles: Vec<RegulationArticle> = read_json(&dir.join("regulation_articles.json"))?;
    stats.regulation_articles = articles.len();
    for article in articles {
        store.insert_regulation_article(article)?;
    }

    let links: Vec<Link> = read_optional(&dir.join("links.json"))?;
    stats.links = links.len();
    for link in links {
        store.insert_link(link)?;
    }

    info!(
        statutes = stats.statutes,
        statute_articles = stats.statute_articles,
        regulations = stats.regulations,
        regulation_articles = stats.regulation_articles,
        links = stats.links,
        "corpus loaded"
    );
    Ok(stats)
}

/// Write computed vectors back so later runs skip the embedding work.
pub fn save_embeddings(dir: &Path, store: &MemoryStore) -> Result<()> {
    write_json(
        &dir.join("statute_articles.json"),
        &store.export_statute_articles()?,
    )?;
    write_json(
        &dir.join("regulation_articles.json"),
        &store.export_regulation_articles()?,
    )?;
    write_json(&dir.join("regulations.json"), &store.export_regulations()?)?;
    Ok(())
}

pub fn save_links(dir: &Path, store: &MemoryStore) -> Result<()> {
    write_json(&dir.join("links.json"), &store.export_links()?)
}

/// One side of a revision, as passed to `--old`/`--new`.
pub fn read_articles(path: &Path) -> Result<Vec<StatuteArticle>> {
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_json(path)
}

fn write_json<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let raw = serde_json::to_string_pretty(rows)?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordlink_core::model::{ArticleKind, RegulationKind, StatuteKind};

    fn sample_statute() -> Statute {
        Statute {
            id: 1,
            name: "Waste Management Act".into(),
            kind: StatuteKind::Law,
            current_revision_id: Some(1),
        }
    }

    fn sample_statute_article() -> StatuteArticle {
        StatuteArticle {
            id: 11,
            statute_id: 1,
            revision_id: 1,
            number: "3".into(),
            title: Some("Permits".into()),
            content: "Operators shall hold a valid permit.".into(),
            kind: ArticleKind::Main,
            parent_number: None,
            embedding: None,
        }
    }

    fn sample_regulation() -> Regulation {
        Regulation {
            id: 2,
            name: "City Waste Ordinance".into(),
            kind: RegulationKind::Ordinance,
            embedding: None,
        }
    }

    fn sample_regulation_article() -> RegulationArticle {
        RegulationArticle {
            id: 21,
            regulation_id: 2,
            number: "5".into(),
            title: None,
            content: "Collection fees follow article 3 of the Act.".into(),
            kind: ArticleKind::Main,
            parent_number: None,
            embedding: None,
        }
    }

    #[test]
    fn corpus_roundtrips_through_the_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path();
        write_json(&dir.join("statutes.json"), &[sample_statute()]).unwrap();
        write_json(&dir.join("statute_articles.json"), &[sample_statute_article()]).unwrap();
        write_json(&dir.join("regulations.json"), &[sample_regulation()]).unwrap();
        write_json(
            &dir.join("regulation_articles.json"),
            &[sample_regulation_article()],
        )
        .unwrap();

        let store = MemoryStore::new();
        let stats = load(dir, &store).unwrap();
        assert_eq!(stats.statutes, 1);
        assert_eq!(stats.statute_articles, 1);
        assert_eq!(stats.regulations, 1);
        assert_eq!(stats.regulation_articles, 1);
        assert_eq!(stats.links, 0);

        save_embeddings(dir, &store).unwrap();
        save_links(dir, &store).unwrap();

        let reloaded = MemoryStore::new();
        let stats = load(dir, &reloaded).unwrap();
        assert_eq!(stats.statute_articles, 1);
        assert_eq!(
            reloaded.export_statute_articles().unwrap(),
            store.export_statute_articles().unwrap()
        );
    }

    #[test]
    fn missing_required_file_names_the_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = MemoryStore::new();
        let err = load(tmp.path(), &store).unwrap_err();
        assert!(err.to_string().contains("statutes.json"));
    }

    #[test]
    fn optional_files_may_be_absent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path();
        write_json(&dir.join("statutes.json"), &[sample_statute()]).unwrap();
        write_json(
            &dir.join("statute_articles.json"),
            &[sample_statute_article()],
        )
        .unwrap();
        write_json(&dir.join("regulations.json"), &[sample_regulation()]).unwrap();
        write_json(
            &dir.join("regulation_articles.json"),
            &[sample_regulation_article()],
        )
        .unwrap();

        let store = MemoryStore::new();
        let stats = load(dir, &store).unwrap();
        assert_eq!(stats.links, 0);
        assert!(store.find_revision(1).unwrap().is_none());
    }
}
