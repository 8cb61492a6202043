//! ordlink command line.
//!
//! Loads a JSON corpus into the in-memory store, runs the embedding,
//! linkage, and impact pipelines against it, and writes computed state back
//! to the corpus directory.

mod corpus;
mod display;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use ordlink_ai::{
    AiConfig, EmbeddingProvider, GeminiEmbedding, GeminiModel, GenerativeModel, ImpactAnalyzer,
    OfflineEmbedding, OfflineModel, OpenAiEmbedding, OpenAiModel,
};
use ordlink_core::text::ChunkConfig;
use ordlink_core::{diff_articles, CancelFlag};
use ordlink_engine::{
    EmbedBackfill, ImpactJobConfig, LinkageBuilder, LinkerConfig, RevisionImpactJob,
    RevisionTrigger,
};
use ordlink_store::{ArticleStore, MemoryStore};

#[derive(Parser)]
#[command(name = "ordlink", version, about = "Statute to ordinance impact analysis")]
struct Cli {
    /// Provider backing embeddings and analysis.
    #[arg(long, global = true, value_enum, default_value_t = Provider::Mock)]
    provider: Provider,

    /// API key for the hosted providers.
    #[arg(long, global = true, env = "ORDLINK_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the provider base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Openai,
    Gemini,
    /// Deterministic offline providers; no credentials, no network.
    Mock,
}

#[derive(Subcommand)]
enum Command {
    /// Fill missing embeddings across the corpus and save them back.
    Embed(EmbedArgs),
    /// Build regulation-to-statute links from document vectors.
    Link(LinkArgs),
    /// Analyze the impact of a statute revision on linked regulations.
    Impact(ImpactArgs),
    /// Diff two article sets; no provider involved.
    Diff(DiffArgs),
}

#[derive(Args)]
struct EmbedArgs {
    /// Corpus directory of JSON entity files.
    #[arg(long)]
    corpus: PathBuf,
    /// Chunk budget per embedding call, in estimated tokens.
    #[arg(long, default_value_t = 500)]
    max_tokens: usize,
}

#[derive(Args)]
struct LinkArgs {
    #[arg(long)]
    corpus: PathBuf,
    /// Candidate articles ranked per regulation.
    #[arg(long, default_value_t = 5)]
    top_k: usize,
    /// Minimum similarity for a link.
    #[arg(long, default_value_t = 0.65)]
    threshold: f32,
}

#[derive(Args)]
struct ImpactArgs {
    #[arg(long)]
    corpus: PathBuf,
    /// Id of the revised statute.
    #[arg(long)]
    statute: i64,
    /// JSON article set before the revision.
    #[arg(long)]
    old: PathBuf,
    /// JSON article set after the revision.
    #[arg(long)]
    new: PathBuf,
    /// Id recorded on the produced analyses.
    #[arg(long, default_value_t = 0)]
    revision_id: i64,
    /// Revision date; falls back to the corpus revision row, then today.
    #[arg(long)]
    revision_date: Option<NaiveDate>,
    /// Pause between model calls, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,
}

#[derive(Args)]
struct DiffArgs {
    #[arg(long)]
    old: PathBuf,
    #[arg(long)]
    new: PathBuf,
}

struct ProviderOpts {
    provider: Provider,
    api_key: Option<String>,
    base_url: Option<String>,
}

impl ProviderOpts {
    fn ai_config(&self) -> Result<AiConfig> {
        let mut config = match self.provider {
            Provider::Openai => AiConfig::openai(self.key()?),
            Provider::Gemini => AiConfig::gemini(self.key()?),
            Provider::Mock => AiConfig::offline(),
        };
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        Ok(config)
    }

    fn key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .context("hosted providers need an API key (--api-key or ORDLINK_API_KEY)")
    }

    fn embedding_provider(&self, config: &AiConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(match self.provider {
            Provider::Openai => Arc::new(OpenAiEmbedding::new(config)?),
            Provider::Gemini => Arc::new(GeminiEmbedding::new(config)?),
            Provider::Mock => Arc::new(OfflineEmbedding::new(config.canonical_dim)),
        })
    }

    fn generative_model(&self, config: &AiConfig) -> Result<Arc<dyn GenerativeModel>> {
        Ok(match self.provider {
            Provider::Openai => Arc::new(OpenAiModel::new(config)?),
            Provider::Gemini => Arc::new(GeminiModel::new(config)?),
            Provider::Mock => Arc::new(OfflineModel),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    info!("ordlink v{}", env!("CARGO_PKG_VERSION"));

    let Cli {
        provider,
        api_key,
        base_url,
        command,
    } = Cli::parse();
    let opts = ProviderOpts {
        provider,
        api_key,
        base_url,
    };

    match command {
        Command::Embed(args) => run_embed(&opts, &args).await,
        Command::Link(args) => run_link(&opts, &args).await,
        Command::Impact(args) => run_impact(&opts, &args).await,
        Command::Diff(args) => run_diff(&args),
    }
}

async fn run_embed(opts: &ProviderOpts, args: &EmbedArgs) -> Result<()> {
    let store = MemoryStore::new();
    corpus::load(&args.corpus, &store)?;

    let config = opts.ai_config()?;
    let backfill = EmbedBackfill::new(opts.embedding_provider(&config)?)
        .with_chunking(ChunkConfig {
            max_tokens: args.max_tokens,
        })
        .with_delay(config.call_delay);

    let stats = backfill.run(&store, &CancelFlag::default()).await?;
    corpus::save_embeddings(&args.corpus, &store)?;

    println!(
        "Embedded {} statute articles, {} regulation articles, {} document vectors in {:.1}s ({} failed)",
        stats.statute_articles,
        stats.regulation_articles,
        stats.regulations,
        stats.elapsed_secs,
        stats.failed
    );
    Ok(())
}

async fn run_link(opts: &ProviderOpts, args: &LinkArgs) -> Result<()> {
    let store = MemoryStore::new();
    corpus::load(&args.corpus, &store)?;

    // Fill any missing vectors first so every regulation can be ranked.
    let config = opts.ai_config()?;
    EmbedBackfill::new(opts.embedding_provider(&config)?)
        .with_delay(config.call_delay)
        .run(&store, &CancelFlag::default())
        .await?;

    let builder = LinkageBuilder::new(LinkerConfig {
        top_k: args.top_k,
        threshold: args.threshold,
    });
    let summary = builder.run(&store, &CancelFlag::default()).await?;

    corpus::save_embeddings(&args.corpus, &store)?;
    corpus::save_links(&args.corpus, &store)?;

    display::print_links(
        &store.export_links()?,
        &statute_names(&store).await?,
        &regulation_names(&store).await?,
        &statute_article_numbers(&store)?,
    );
    println!(
        "{} inserted, {} updated, {} skipped without a vector, {} failed",
        summary.inserted, summary.updated, summary.skipped_no_embedding, summary.failed
    );
    Ok(())
}

async fn run_impact(opts: &ProviderOpts, args: &ImpactArgs) -> Result<()> {
    let store = MemoryStore::new();
    corpus::load(&args.corpus, &store)?;

    let old_articles = corpus::read_articles(&args.old)?;
    let new_articles = corpus::read_articles(&args.new)?;

    let config = opts.ai_config()?;

    // A corpus without links gets an automatic linkage pass first.
    if store.export_links()?.is_empty() {
        info!("no links in corpus, building linkage first");
        EmbedBackfill::new(opts.embedding_provider(&config)?)
            .with_delay(config.call_delay)
            .run(&store, &CancelFlag::default())
            .await?;
        LinkageBuilder::new(LinkerConfig::default())
            .run(&store, &CancelFlag::default())
            .await?;
        corpus::save_embeddings(&args.corpus, &store)?;
        corpus::save_links(&args.corpus, &store)?;
    }

    let revision_date = match args.revision_date {
        Some(date) => date,
        None => store
            .find_revision(args.revision_id)?
            .map(|revision| revision.revision_date)
            .unwrap_or_else(|| Utc::now().date_naive()),
    };

    let analyzer = ImpactAnalyzer::new(opts.generative_model(&config)?);
    let job = RevisionImpactJob::new(
        analyzer,
        ImpactJobConfig {
            delay: Duration::from_millis(args.delay_ms),
            ..ImpactJobConfig::default()
        },
    );
    let trigger = RevisionTrigger {
        statute_id: args.statute,
        revision_id: args.revision_id,
        revision_date,
        old_articles,
        new_articles,
    };

    let summary = job
        .run(&store, &trigger, &CancelFlag::default(), |done, total| {
            eprint!("\r  Analyzed {done}/{total}");
        })
        .await?;
    if summary.analyzed + summary.failed > 0 {
        eprintln!();
    }

    let statute_name = statute_names(&store)
        .await?
        .remove(&args.statute)
        .unwrap_or_else(|| format!("statute #{}", args.statute));
    println!("Impact of {} revision dated {}", statute_name, revision_date);
    println!(
        "{} changed articles, {} pairs, {} screened out, {} analyzed, {} failed",
        summary.deltas,
        summary.pairs_considered,
        summary.pairs_screened_out,
        summary.analyzed,
        summary.failed
    );
    display::print_impact_report(
        &summary.results,
        &regulation_names(&store).await?,
        &regulation_article_numbers(&store)?,
    );
    Ok(())
}

fn run_diff(args: &DiffArgs) -> Result<()> {
    let old_articles = corpus::read_articles(&args.old)?;
    let new_articles = corpus::read_articles(&args.new)?;
    display::print_deltas(&diff_articles(&old_articles, &new_articles));
    Ok(())
}

async fn statute_names(store: &MemoryStore) -> Result<HashMap<i64, String>> {
    Ok(store
        .statutes()
        .await?
        .into_iter()
        .map(|statute| (statute.id, statute.name))
        .collect())
}

async fn regulation_names(store: &MemoryStore) -> Result<HashMap<i64, String>> {
    Ok(store
        .regulations()
        .await?
        .into_iter()
        .map(|regulation| (regulation.id, regulation.name))
        .collect())
}

fn statute_article_numbers(store: &MemoryStore) -> Result<HashMap<i64, String>> {
    Ok(store
        .export_statute_articles()?
        .into_iter()
        .map(|article| (article.id, article.number))
        .collect())
}

fn regulation_article_numbers(store: &MemoryStore) -> Result<HashMap<i64, String>> {
    Ok(store
        .export_regulation_articles()?
        .into_iter()
        .map(|article| (article.id, article.number))
        .collect())
}
