use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::chunking::{DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS, DocKind};
use crate::semantic::DEFAULT_MODEL_ID;

pub const DEFAULT_CACHE_ROOT: &str = ".cache/policyrag";

#[derive(Parser, Debug)]
#[command(
    name = "policyrag",
    version,
    about = "Structure-aware chunking and local retrieval for policy documents"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk one document and print the chunks as JSON.
    Chunk(ChunkArgs),
    /// Chunk one document and store chunks and embeddings in the local index.
    Ingest(IngestArgs),
    Query(QueryArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ChunkingArgs {
    /// Overrides the document kind implied by the file extension.
    #[arg(long, value_enum)]
    pub doc_kind: Option<DocKind>,

    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: usize,

    #[arg(long, default_value_t = DEFAULT_OVERLAP_TOKENS)]
    pub overlap_tokens: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ChunkArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub chunking: ChunkingArgs,

    /// Writes the chunk JSON here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub with_records: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub ingest_manifest_path: Option<PathBuf>,

    #[command(flatten)]
    pub chunking: ChunkingArgs,

    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RetrievalMode {
    Lexical,
    Semantic,
    Hybrid,
}

impl RetrievalMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(long, default_value = DEFAULT_CACHE_ROOT)]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub query: String,

    #[arg(long, value_enum, default_value_t = RetrievalMode::Hybrid)]
    pub retrieval_mode: RetrievalMode,

    #[arg(long, default_value_t = 48)]
    pub lexical_k: usize,

    #[arg(long, default_value_t = 48)]
    pub semantic_k: usize,

    #[arg(long, default_value_t = 60)]
    pub rrf_k: u32,

    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    #[arg(long, default_value_t = false)]
    pub allow_lexical_fallback: bool,

    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    #[arg(long, default_value_t = 5)]
    pub limit: usize,

    /// Restricts results to one stored document.
    #[arg(long)]
    pub doc_id: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
