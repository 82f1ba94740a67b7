use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use search_core::keywords::classify;
use search_core::{
    Engine, EngineConfig, JsonPaperSource, KeywordOptions, PaperId, PaperSource, SearchOptions, SledStore, TermStore,
};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the BM25 paper index", long_about = None)]
struct Cli {
    /// Engine configuration (JSON); defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index papers from a JSON/JSONL file or directory and persist every document
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Term-score database directory
        #[arg(long, default_value = "./index")]
        db: String,
    },
    /// Rank papers against a query
    Search {
        #[arg(long)]
        input: String,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,
        /// Attach paper records to the hits
        #[arg(long, default_value_t = false)]
        metadata: bool,
        /// Show the per-term score breakdown
        #[arg(long, default_value_t = false)]
        explain: bool,
    },
    /// Extract keywords and a category from text, or from every paper in an input
    Keywords {
        #[arg(long, conflicts_with = "input")]
        text: Option<String>,
        #[arg(long)]
        input: Option<String>,
        #[arg(long, default_value_t = 8)]
        max: usize,
    },
    /// Corpus statistics, plus the persisted global stats when a database is given
    Stats {
        #[arg(long)]
        input: String,
        #[arg(long)]
        db: Option<String>,
    },
    /// Print the persisted term scores and posting of one paper
    Show {
        #[arg(long, default_value = "./index")]
        db: String,
        #[arg(long)]
        paper_id: PaperId,
    },
    /// Delete the persisted rows of one paper
    Purge {
        #[arg(long, default_value = "./index")]
        db: String,
        #[arg(long)]
        paper_id: PaperId,
    },
}

#[derive(Serialize)]
struct TaggedText {
    key: Option<String>,
    category: &'static str,
    keywords: Vec<search_core::ScoredKeyword>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Build { input, db } => build_index(config, &input, &db),
        Commands::Search { input, query, limit, min_score, metadata, explain } => {
            let source = JsonPaperSource::new(&input);
            let mut engine = Engine::new(config);
            engine.load_from_source(&source)?;
            let opts = SearchOptions { limit, min_score, include_metadata: metadata, explain };
            let hits = engine.search_with_source(&query, &opts, &source)?;
            print_json(&hits)
        }
        Commands::Keywords { text, input, max } => extract_keywords(config, text, input, max),
        Commands::Stats { input, db } => {
            let mut engine = Engine::new(config);
            engine.load_from_source(&JsonPaperSource::new(&input))?;
            let persisted = match db {
                Some(db) => SledStore::open(db)?.global_stats()?,
                None => None,
            };
            print_json(&serde_json::json!({ "corpus": engine.stats(), "persisted": persisted }))
        }
        Commands::Show { db, paper_id } => {
            let store = SledStore::open(db)?;
            let Some(posting) = store.posting(paper_id)? else {
                bail!("paper {paper_id} has no persisted rows");
            };
            print_json(&serde_json::json!({ "terms": store.term_scores(paper_id)?, "posting": posting }))
        }
        Commands::Purge { db, paper_id } => {
            let store = SledStore::open(db)?;
            let removed = store.purge(paper_id)?;
            store.flush()?;
            tracing::info!(paper_id, removed, "purged persisted rows");
            Ok(())
        }
    }
}

fn build_index(config: EngineConfig, input: &str, db: &str) -> Result<()> {
    let source = JsonPaperSource::new(input);
    let store = SledStore::open(db)?;
    let mut engine = Engine::new(config);
    let summary = engine.reindex_all(&source, &store, None)?;
    store.flush()?;
    tracing::info!(db, successful = summary.successful, failed = summary.failed, "index build complete");
    print_json(&summary)?;
    if summary.failed > 0 {
        bail!("{} of {} documents failed to persist", summary.failed, summary.total_processed);
    }
    Ok(())
}

fn extract_keywords(config: EngineConfig, text: Option<String>, input: Option<String>, max: usize) -> Result<()> {
    let engine = Engine::new(config);
    let mut tagger = engine.keyword_extractor();
    let opts = KeywordOptions { max_keywords: max, ..Default::default() };
    let tag = |key: Option<String>, keywords: Vec<search_core::ScoredKeyword>| {
        let names: Vec<&str> = keywords.iter().map(|k| k.keyword.as_str()).collect();
        TaggedText { key, category: classify(&names), keywords }
    };

    let tagged: Vec<TaggedText> = match (text, input) {
        (Some(text), _) => vec![tag(None, tagger.extract(&text, &opts))],
        (None, Some(input)) => JsonPaperSource::new(input)
            .fetch_all()?
            .iter()
            .map(|paper| tag(Some(paper.key()), tagger.extract_for_paper(paper, &opts)))
            .collect(),
        (None, None) => bail!("either --text or --input is required"),
    };
    print_json(&tagged)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
