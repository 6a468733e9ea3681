use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use folio::persist::{load_meta, save_meta, IndexPaths, MetaFile};
use folio::{EngineConfig, SearchEngine, VocabularySuggester};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Separator between pages in text extracted from paginated documents.
const FORM_FEED: char = '\x0c';

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputPage {
    Text(String),
    Object { text: String },
}

impl InputPage {
    fn into_text(self) -> String {
        match self {
            InputPage::Text(text) | InputPage::Object { text } => text,
        }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, inspect and query a paginated full-text index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a text file, a directory of pages, or JSON/JSONL
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// JSON engine config; flags below override it
        #[arg(long)]
        config: Option<String>,
        /// Authority iterations
        #[arg(long)]
        iterations: Option<usize>,
        /// Authority damping factor
        #[arg(long)]
        damping: Option<f64>,
    },
    /// Print index statistics and vocabulary
    Inspect {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Only list words starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
        /// Maximum words to list
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Run one query against a saved index
    Query {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Query text; AND/OR/NOT switch to boolean mode
        #[arg(long, short)]
        q: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        size: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, iterations, damping } => {
            let mut config = match config {
                Some(path) => EngineConfig::from_json_file(&path).with_context(|| format!("reading config {path}"))?,
                None => EngineConfig::default(),
            };
            if let Some(iterations) = iterations {
                config.iterations = iterations;
            }
            if let Some(damping) = damping {
                config.damping = damping;
            }
            build_index(&input, &output, config)
        }
        Commands::Inspect { index, prefix, limit } => inspect(&index, prefix.as_deref(), limit),
        Commands::Query { index, q, page, size } => query(&index, &q, page, size),
    }
}

fn build_index(input: &str, output: &str, config: EngineConfig) -> Result<()> {
    let pages = load_pages(Path::new(input))?;
    if pages.is_empty() {
        bail!("no pages found in {input}");
    }
    tracing::info!(num_pages = pages.len(), input, "ingested pages");

    let mut engine = SearchEngine::new(config);
    let stats = engine.build_index(pages);

    let out_paths = IndexPaths::new(output);
    engine.save(&out_paths)?;
    let meta = MetaFile {
        num_pages: stats.pages as u32,
        num_terms: stats.terms as u32,
        created_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into()),
        version: folio::persist::FORMAT_VERSION,
    };
    save_meta(&out_paths, &meta)?;

    tracing::info!(output, terms = stats.terms, edges = stats.graph_edges, "index build complete");
    Ok(())
}

/// Read the corpus as an ordered list of page texts.
fn load_pages(input: &Path) -> Result<Vec<String>> {
    if input.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(input)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("txt"))
            .collect();
        files.sort();
        return files
            .iter()
            .map(|p| fs::read_to_string(p).with_context(|| format!("reading {}", p.display())))
            .collect();
    }
    match input.extension().and_then(|s| s.to_str()) {
        Some("jsonl") => pages_from_jsonl(input),
        Some("json") => pages_from_json(input),
        _ => pages_from_text(input),
    }
}

fn pages_from_text(file: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let mut pages: Vec<String> = text.split(FORM_FEED).map(str::to_string).collect();
    // Extractors terminate the last page with a form feed too.
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    Ok(pages)
}

fn pages_from_jsonl(file: &Path) -> Result<Vec<String>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let mut pages = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let page: InputPage = serde_json::from_str(&line)?;
        pages.push(page.into_text());
    }
    Ok(pages)
}

fn pages_from_json(file: &Path) -> Result<Vec<String>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let pages: Vec<InputPage> = serde_json::from_reader(reader)?;
    Ok(pages.into_iter().map(InputPage::into_text).collect())
}

fn inspect(index: &str, prefix: Option<&str>, limit: usize) -> Result<()> {
    let paths = IndexPaths::new(index);
    let engine = SearchEngine::load(&paths)?;
    if let Ok(meta) = load_meta(&paths) {
        println!("created: {} (format v{})", meta.created_at, meta.version);
    }
    let stats = engine.stats()?;
    println!(
        "pages: {}  terms: {}  trie nodes: {}  graph: {} nodes / {} edges",
        stats.pages, stats.terms, stats.trie_nodes, stats.graph_nodes, stats.graph_edges
    );
    let index = engine.index()?;
    let words = match prefix {
        Some(prefix) => index.walk_prefix(prefix),
        None => index.walk(),
    };
    for term in words.filter_map(|e| e.term).take(limit) {
        let pages: Vec<String> = term.pages.iter().map(|p| (p + 1).to_string()).collect();
        println!("{:<24} x{:<5} pages {}", term.text, term.occurrences, pages.join(","));
    }
    Ok(())
}

fn query(index: &str, q: &str, page: usize, size: usize) -> Result<()> {
    let engine = SearchEngine::load(&IndexPaths::new(index))?;
    let results = engine.search(q, page, size)?;
    for hit in &results.hits {
        println!("Result {}: Page {} ({} matches, authority {:.4})", hit.rank, hit.page_number, hit.match_count, hit.authority);
        println!("Context: {}", hit.snippet.render("[", "]", &engine.config().snippet_separator));
        println!("{}", "-".repeat(80));
    }
    if results.weak_match {
        let suggester = VocabularySuggester::new(engine.index()?);
        for correction in engine.suggest_corrections(q, &suggester, 3)? {
            let terms: Vec<&str> = correction.suggestions.iter().map(|s| s.term.as_str()).collect();
            println!("No strong match for '{}'. Did you mean: {}?", correction.term, terms.join(", "));
        }
    }
    println!("{} of {} hits", results.hits.len(), results.total_hits);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn form_feed_text_splits_into_pages() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("book.txt");
        fs::write(&file, "first page\x0csecond page\x0c").unwrap();
        assert_eq!(load_pages(&file).unwrap(), vec!["first page", "second page"]);
    }

    #[test]
    fn directory_pages_are_ordered_by_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("002.txt"), "two").unwrap();
        fs::write(dir.path().join("001.txt"), "one").unwrap();
        fs::write(dir.path().join("notes.md"), "skip").unwrap();
        assert_eq!(load_pages(dir.path()).unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn json_and_jsonl_accept_strings_and_objects() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("pages.json");
        fs::write(&json, r#"["alpha", {"text": "beta"}]"#).unwrap();
        assert_eq!(load_pages(&json).unwrap(), vec!["alpha", "beta"]);

        let jsonl = dir.path().join("pages.jsonl");
        fs::write(&jsonl, "{\"text\": \"gamma\"}\n\n\"delta\"\n").unwrap();
        assert_eq!(load_pages(&jsonl).unwrap(), vec!["gamma", "delta"]);
    }
}
