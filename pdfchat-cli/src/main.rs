//! `pdfchat`: load a PDF, then ask questions about it.

mod interrupt;
mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pdfchat_rag::{
    OpenAICompletionProvider, OpenAIEmbeddingProvider, RagConfig, RagPipeline, load_document,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::interrupt::{ctrl_c, or_interrupt};

#[derive(Parser, Debug)]
#[command(name = "pdfchat", about = "Ask questions about a PDF document", version)]
struct Cli {
    /// PDF (or plain text) file to load
    file: PathBuf,

    /// Question to answer; repeat for several. Without it an interactive prompt starts
    #[arg(short, long = "question")]
    questions: Vec<String>,

    /// JSON file with pipeline settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum chunk size in characters
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Overlap between consecutive chunks in characters
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Number of chunks retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Embedding model name
    #[arg(long)]
    embedding_model: Option<String>,

    /// Chat model name
    #[arg(long)]
    chat_model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,
}

impl Cli {
    /// Settings from `--config` (or defaults) with command-line flags applied on top.
    fn rag_config(&self) -> Result<RagConfig> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => RagConfig::default(),
        };
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunk_overlap = overlap;
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        config.validate()?;
        Ok(config)
    }
}

fn read_config(path: &Path) -> Result<RagConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

fn build_pipeline(cli: &Cli, config: RagConfig) -> Result<RagPipeline> {
    let mut embedder = OpenAIEmbeddingProvider::from_env()?;
    let mut chat = OpenAICompletionProvider::from_env()?;
    if let Some(base_url) = &cli.base_url {
        embedder = embedder.with_base_url(base_url);
        chat = chat.with_base_url(base_url);
    }
    if let Some(model) = &cli.embedding_model {
        embedder = embedder.with_model(model);
    }
    if let Some(model) = &cli.chat_model {
        chat = chat.with_model(model);
    }

    Ok(RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .completion_provider(Arc::new(chat))
        .build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pdfchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.rag_config()?;
    let mut pipeline = build_pipeline(&cli, config.clone())?;

    let filename = cli
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.file.display().to_string());
    let bytes = tokio::fs::read(&cli.file)
        .await
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let documents = load_document(&bytes, &filename)?;

    let cancel = CancellationToken::new();
    eprintln!("Processing {filename}...");
    let summary = {
        let ingest = pipeline.ingest_with(&documents, &config, &cancel);
        tokio::pin!(ingest);
        match or_interrupt(&mut ingest, ctrl_c()).await {
            Some(result) => result?,
            None => {
                warn!("interrupted, cancelling ingest");
                cancel.cancel();
                if let Err(e) = ingest.await {
                    debug!(error = %e, "ingest stopped");
                }
                bail!("interrupted while processing {filename}");
            }
        }
    };
    info!(
        file = %filename,
        pages = summary.document_count,
        chunks = summary.chunk_count,
        "document ready"
    );
    eprintln!("Loaded {} pages as {} chunks.", summary.document_count, summary.chunk_count);

    if cli.questions.is_empty() {
        repl::run(&pipeline).await
    } else {
        for question in &cli.questions {
            let Some(answer) = or_interrupt(pipeline.ask(question), ctrl_c()).await else {
                bail!("interrupted");
            };
            let answer = answer?;
            if cli.questions.len() > 1 {
                println!("Q: {question}");
                println!("A: {answer}\n");
            } else {
                println!("{answer}");
            }
        }
        Ok(())
    }
}
