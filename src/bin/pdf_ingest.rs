use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;

use pdf_rag::config::{env_snapshot, AppConfig, DemoCatalog};
use pdf_rag::indexer::get_chunks;
use pdf_rag::indexer::walker::walk_pdfs;
use pdf_rag::layout::JsonLayoutParser;
use pdf_rag::logger;
use pdf_rag::rag::embeddings::EmbeddingGenerator;
use pdf_rag::rag::index::{LiveDocuments, VectorIndex};
use pdf_rag::rag::index_manager::file_id;
use pdf_rag::rag::vector_store::QdrantIndex;
use pdf_rag::registry::TenantKey;

#[derive(Parser, Debug)]
#[command(name = "pdf-ingest")]
#[command(about = "Chunk PDF layouts and load them into a tenant's Qdrant collection")]
struct Args {
    /// Industry section of the demo config
    #[arg(long, default_value = "default")]
    industry: String,

    /// Demo name within the industry
    #[arg(long, default_value = "default")]
    demo: String,

    /// Demo config YAML
    #[arg(long, env = "DEMO_CONFIG_PATH", default_value = "config.yaml")]
    config: PathBuf,

    /// Read PDFs from here instead of the configured pdf_folder
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Qdrant server URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    qdrant_url: String,

    /// Drop and recreate the collection first
    #[arg(long)]
    reset: bool,

    /// Chunk only; print per-file counts without embedding or writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logger::init();

    let args = Args::parse();
    let app_config = AppConfig::load()?;

    let tenant = TenantKey::new(&args.industry, &args.demo);
    let catalog = DemoCatalog::load(&args.config)?;
    let demo = catalog.resolve(&tenant, &env_snapshot())?;

    let pdf_dir = args.dir.clone().unwrap_or_else(|| demo.pdf_folder.clone());
    if !pdf_dir.exists() {
        anyhow::bail!("Directory does not exist: {}", pdf_dir.display());
    }

    let index = if args.dry_run {
        None
    } else {
        println!("Initializing embedding model...");
        let embeddings = Arc::new(EmbeddingGenerator::new(&app_config.embedding_model_dir)?);

        println!("Connecting to Qdrant at {}...", args.qdrant_url);
        let index = QdrantIndex::connect(
            &args.qdrant_url,
            &demo.collection,
            app_config.embedding_dimensions,
            embeddings,
        )
        .await?;
        if args.reset {
            println!("Resetting collection {}...", demo.collection);
            index.reset().await?;
        }
        Some(index)
    };

    println!("Scanning directory: {}", pdf_dir.display());
    let files = walk_pdfs(&pdf_dir);
    println!("Found {} PDF files", files.len());

    if files.is_empty() {
        println!("No PDF files found. Exiting.");
        return Ok(());
    }

    let parser = JsonLayoutParser::new(demo.layout_folder.clone());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut success_count = 0usize;
    let mut total_chunks = 0usize;
    let mut per_file: Vec<(PathBuf, usize)> = Vec::new();
    let mut failed_files: Vec<(PathBuf, String)> = Vec::new();
    let mut live = LiveDocuments::new();

    for path in &files {
        pb.set_message(format!("{}", path.file_name().unwrap_or_default().to_string_lossy()));

        let result = match get_chunks(&parser, path, &demo.chunking) {
            Ok(chunks) => match &index {
                Some(index) => index.upsert(&file_id(path), &chunks).await,
                None => Ok(chunks.len()),
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(chunk_count) => {
                success_count += 1;
                total_chunks += chunk_count;
                per_file.push((path.clone(), chunk_count));
                live.insert(file_id(path), Some(chunk_count));
            }
            Err(e) => {
                tracing::warn!("Failed to process {}: {}", path.display(), e);
                failed_files.push((path.clone(), e.to_string()));
                live.insert(file_id(path), None);
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("done");

    // Only the configured folder owns the collection; an ad-hoc --dir adds to it.
    let mut removed_chunks = 0usize;
    if let (Some(index), None) = (&index, &args.dir) {
        println!("Removing stale chunks...");
        removed_chunks = index.prune(&live).await?;
    }

    if args.dry_run {
        println!("\nDry run, nothing was written:");
        for (path, count) in &per_file {
            println!("  {:>5} chunks  {}", count, path.display());
        }
    }

    println!("\nIngestion complete!");
    println!("  Tenant:          {}", tenant);
    println!("  Files processed: {}/{}", success_count, files.len());
    println!("  Files failed:    {}", failed_files.len());
    println!("  Total chunks:    {}", total_chunks);
    println!("  Stale removed:   {}", removed_chunks);
    println!("  Collection:      {}", demo.collection);
    println!("  Qdrant URL:      {}", args.qdrant_url);

    if !failed_files.is_empty() {
        println!("\nFailed files:");
        for (path, err) in &failed_files {
            println!("  {}: {}", path.display(), err);
        }
    }

    Ok(())
}
