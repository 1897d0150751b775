use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use extract::{ExtractionMode, Extractor, LanguageModel};
use index::{GraphStore, MemoryGraphStore, Neo4jStore, RelationshipVocabulary, graph_stats};
use ingest::DocumentClass;
use pipeline::{AppConfig, LogFormat, Pipeline};
use query::GraphQuestionAnswerer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Instrument, info, info_span};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docgraph")]
#[command(author, version, about = "Build and query a knowledge graph from documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use the NEO4J_*_<N> variables of database instance N
    #[arg(long, global = true)]
    instance: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a file or directory of documents into the graph
    Ingest {
        /// File, or directory of .pdf/.txt/.md files
        path: PathBuf,
        /// resume, science_article or technical_document
        class: DocumentClass,
        /// Extraction mode (edges or categories)
        #[arg(long)]
        mode: Option<ExtractionMode>,
        /// Write to an in-memory graph instead of Neo4j
        #[arg(long)]
        dry_run: bool,
        /// Only reuse relationship names reachable from these File nodes
        #[arg(long = "vocabulary-from")]
        vocabulary_from: Vec<String>,
    },

    /// Ask a question against the graph
    Ask {
        question: String,
        /// Restrict the answer to documents of one class
        #[arg(long)]
        class: Option<DocumentClass>,
    },

    /// Print the relationship vocabulary
    Vocab,

    /// Print node and relationship counts
    Stats,
}

impl Commands {
    /// Only a live ingestion writes, so only it needs the schema DDL
    fn writes_graph(&self) -> bool {
        matches!(self, Commands::Ingest { dry_run: false, .. })
    }
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter '{}'", config.logging.filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}

async fn connect(config: &AppConfig, init_schema: bool) -> Result<Arc<dyn GraphStore>> {
    let (uri, user, password) = config.neo4j_credentials()?;
    let store = Neo4jStore::connect(uri, user, password, &config.neo4j.database)
        .await
        .context("Failed to connect to Neo4j")?;
    if init_schema {
        store.init_schema().await.context("Failed to create Neo4j schema")?;
    }
    let store: Arc<dyn GraphStore> = Arc::new(store);
    Ok(store)
}

async fn run_ingest(
    config: &AppConfig,
    model: Box<dyn LanguageModel>,
    path: PathBuf,
    class: DocumentClass,
    dry_run: bool,
    vocabulary_from: Vec<String>,
    init_schema: bool,
) -> Result<()> {
    let jobs: Vec<(PathBuf, DocumentClass)> = ingest::discover(&path)?
        .into_iter()
        .map(|file| (file, class))
        .collect();
    if jobs.is_empty() {
        bail!("no .pdf, .txt or .md files found in {}", path.display());
    }

    let store: Arc<dyn GraphStore> = if dry_run {
        println!("Dry run: writing to an in-memory graph");
        Arc::new(MemoryGraphStore::new())
    } else {
        connect(config, init_schema).await?
    };

    let extractor = Extractor::new(model, config.extractor_config());
    let mut pipeline = Pipeline::new(extractor, store.clone());
    if !vocabulary_from.is_empty() {
        pipeline = pipeline.with_vocabulary_scope(vocabulary_from);
    }

    println!("Processing {} document(s) as {}", jobs.len(), class);
    let report = pipeline.process_batch(&jobs).await;

    for document in &report.succeeded {
        println!("✓ {}", document.file_name);
        println!("  Root entity: {}", document.root_entity);
        println!("  Entities: {}", document.entities.join(", "));
        println!("  Relationships: {}", document.relationships.join(", "));
        println!(
            "  Writes: {}/{} succeeded",
            document.materialize.succeeded, document.materialize.attempted
        );
        if !document.disconnected.is_empty() {
            println!("  Not connected to file: {}", document.disconnected.join(", "));
        }
    }
    for failure in &report.failed {
        println!("✗ {}: {}", failure.path.display(), failure.error);
    }

    let metrics = pipeline.metrics().snapshot();
    println!("\n=== Run Summary ===");
    println!(
        "Documents: {} succeeded, {} failed",
        metrics.documents_succeeded, metrics.documents_failed
    );
    println!(
        "Extracted: {} entities, {} edges",
        metrics.total_entities_extracted, metrics.total_edges_extracted
    );
    println!(
        "Writes: {} attempted, {} failed",
        metrics.total_writes_attempted, metrics.total_writes_failed
    );
    println!(
        "Avg time per document: read {:.1}ms, extract {:.1}ms, write {:.1}ms",
        metrics.avg_read_time_ms, metrics.avg_extract_time_ms, metrics.avg_write_time_ms
    );
    if let Ok(stats) = graph_stats(store.as_ref()).await {
        println!("Graph: {} nodes, {} relationships", stats.nodes, stats.relationships);
    }

    if !report.is_success() {
        bail!("{} document(s) failed", report.failed.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env(cli.instance)?;
    init_tracing(&config)?;

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id);
    let init_schema = cli.command.writes_graph();

    async move {
        match cli.command {
            Commands::Ingest {
                path,
                class,
                mode,
                dry_run,
                vocabulary_from,
            } => {
                if let Some(mode) = mode {
                    config.extraction.mode = mode;
                }
                info!(path = %path.display(), class = %class, mode = ?config.extraction.mode, dry_run, "Starting ingestion");
                let model = config.build_model()?;
                run_ingest(&config, model, path, class, dry_run, vocabulary_from, init_schema).await
            }
            Commands::Ask { question, class } => {
                let store = connect(&config, init_schema).await?;
                let answerer = GraphQuestionAnswerer::new(config.build_model()?, store, config.retry_policy());
                let answer = answerer.answer(&question, class).await?;

                if let Some(node) = &answer.main_node {
                    println!("Main node: {}", node);
                }
                println!("Rephrased: {}", answer.rephrased);
                println!("Cypher: {}", answer.cypher);
                println!("Rows: {}", answer.rows.len());
                println!("\n{}", answer.answer);
                Ok(())
            }
            Commands::Vocab => {
                let store = connect(&config, init_schema).await?;
                let vocabulary = RelationshipVocabulary::new(store.as_ref()).snapshot().await?;
                if vocabulary.is_empty() {
                    println!("(no relationships yet)");
                }
                for name in vocabulary {
                    println!("{}", name);
                }
                Ok(())
            }
            Commands::Stats => {
                let store = connect(&config, init_schema).await?;
                let stats = graph_stats(store.as_ref()).await?;
                println!("Nodes: {}", stats.nodes);
                println!("Relationships: {}", stats.relationships);
                Ok(())
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_only_live_ingest_creates_schema() {
        assert!(command(&["docgraph", "ingest", "docs", "resume"]).writes_graph());
        assert!(!command(&["docgraph", "ingest", "docs", "resume", "--dry-run"]).writes_graph());
        assert!(!command(&["docgraph", "vocab"]).writes_graph());
        assert!(!command(&["docgraph", "stats", "--instance", "2"]).writes_graph());
        assert!(!command(&["docgraph", "ask", "Who works at IBM?"]).writes_graph());
    }

    #[test]
    fn test_ingest_arguments() {
        let Commands::Ingest { class, mode, vocabulary_from, .. } = command(&[
            "docgraph",
            "ingest",
            "docs",
            "science_article",
            "--mode",
            "categories",
            "--vocabulary-from",
            "a.pdf",
            "--vocabulary-from",
            "b.pdf",
        ]) else {
            panic!("expected ingest");
        };
        assert_eq!(class, DocumentClass::ScienceArticle);
        assert_eq!(mode, Some(ExtractionMode::Category));
        assert_eq!(vocabulary_from, vec!["a.pdf", "b.pdf"]);
    }
}
