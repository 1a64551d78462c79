use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use pill_search::catalog::PillDocument;
use pill_search::config::{load_config, SearchSettings, DEFAULT_TOP_K};
use pill_search::index::CatalogIndex;
use pill_search::normalize::{ColorClasses, RawFeatures};
use pill_search::pipeline::{plan_search, rank_outcome, SearchOutcome};

/// Offline tool for the pill catalog index
#[derive(Parser)]
#[command(name = "pill-catalog")]
#[command(about = "Index, search and inspect a local pill catalog")]
struct Cli {
    /// Service config file supplying boosts and rank thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Attributes describing the pill being looked for
#[derive(Args, Debug, Clone, Default)]
struct FeatureArgs {
    /// Printed or embossed imprint
    #[arg(short, long)]
    imprint: Option<String>,
    /// Shape, e.g. 원형
    #[arg(short, long)]
    shape: Option<String>,
    /// Comma separated colors, primary first
    #[arg(short, long)]
    color: Option<String>,
    /// Maximum results
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,
}

impl FeatureArgs {
    fn raw(&self) -> RawFeatures {
        RawFeatures {
            drug_shape: self.shape.clone(),
            color_classes: self.color.clone().map(ColorClasses::One),
            imprint: self.imprint.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Index catalog entries from stdin (JSON lines)
    Index {
        /// Path to the index directory
        #[arg(short = 'p', long)]
        index_path: PathBuf,
        /// Remove all entries before indexing
        #[arg(long)]
        clear: bool,
    },
    /// Search the index
    Search {
        /// Path to the index directory
        #[arg(short = 'p', long)]
        index_path: PathBuf,
        #[command(flatten)]
        features: FeatureArgs,
    },
    /// Print the query that would be sent to the search engine
    Query {
        #[command(flatten)]
        features: FeatureArgs,
    },
    /// Delete an entry by item_seq
    Delete {
        /// Path to the index directory
        #[arg(short = 'p', long)]
        index_path: PathBuf,
        #[arg(long)]
        item_seq: String,
    },
    /// Get index statistics
    Stats {
        /// Path to the index directory
        #[arg(short = 'p', long)]
        index_path: PathBuf,
    },
}

/// Outcome of indexing a stream of JSON lines
#[derive(Debug, Default, Serialize, PartialEq)]
struct IndexReport {
    indexed: usize,
    errors: usize,
}

fn open_index(index_path: &Path) -> Result<CatalogIndex> {
    CatalogIndex::new(&index_path.to_string_lossy())
        .with_context(|| format!("Failed to open index at {}", index_path.display()))
}

fn search_settings(config: Option<&Path>) -> Result<SearchSettings> {
    match config {
        Some(path) => Ok(load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .search),
        None => Ok(SearchSettings::default()),
    }
}

/// Index every JSON line of `input`; malformed lines are reported and skipped
fn index_lines(index: &mut CatalogIndex, input: impl BufRead) -> Result<IndexReport> {
    let mut report = IndexReport::default();

    for (n, line) in input.lines().enumerate() {
        let line = line.context("Failed to read line from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed = serde_json::from_str(&line)
            .map_err(anyhow::Error::from)
            .and_then(|value| PillDocument::from_value(value).map_err(anyhow::Error::from));
        match parsed {
            Ok(pill) => {
                index.add_document(&pill)?;
                report.indexed += 1;
            }
            Err(e) => {
                eprintln!("Error parsing entry on line {}: {}", n + 1, e);
                report.errors += 1;
            }
        }
    }

    index.commit()?;
    Ok(report)
}

fn search_index(
    index: &CatalogIndex,
    features: &FeatureArgs,
    settings: &SearchSettings,
) -> Result<SearchOutcome> {
    let (normalized, query) = plan_search(&features.raw(), features.top_k, settings);
    let hits = index.search(&query).context("Search failed")?;
    Ok(rank_outcome(normalized, hits, features.top_k, settings))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = search_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Index { index_path, clear } => {
            let mut index = open_index(&index_path)?;
            if clear {
                index.clear()?;
            }
            let report = index_lines(&mut index, io::stdin().lock())?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Commands::Search { index_path, features } => {
            let index = open_index(&index_path)?;
            let report = search_index(&index, &features, &settings)?;
            println!("{}", serde_json::to_string(&report)?);
        }
        Commands::Query { features } => {
            let (_, query) = plan_search(&features.raw(), features.top_k, &settings);
            println!("{}", serde_json::to_string_pretty(&query.to_json())?);
        }
        Commands::Delete { index_path, item_seq } => {
            let mut index = open_index(&index_path)?;
            let existed = index.get(&item_seq)?.is_some();
            index.delete_document(&item_seq)?;
            index.commit()?;
            let result = serde_json::json!({
                "deleted": usize::from(existed),
                "item_seq": item_seq
            });
            println!("{}", serde_json::to_string(&result)?);
        }
        Commands::Stats { index_path } => {
            let index = open_index(&index_path)?;
            println!("{}", serde_json::to_string(&index.stats()?)?);
        }
    }

    Ok(())
}
