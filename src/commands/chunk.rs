use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::chunking::{
    AnnotatedRecord, Chunk, ChunkPipeline, ChunkedDocument, ChunkingConfig, PipelineStats,
};
use crate::cli::{ChunkArgs, ChunkingArgs};
use crate::source::{LoadedDocument, load_document};
use crate::util::{write_json_pretty, write_json_stdout};

#[derive(Debug, Serialize)]
struct ChunkOutput<'a> {
    filename: &'a str,
    source_format: &'a str,
    doc_kind: &'a str,
    max_tokens: usize,
    overlap_tokens: usize,
    stats: &'a PipelineStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<&'a [AnnotatedRecord]>,
    chunks: &'a [Chunk],
}

pub fn run(args: ChunkArgs) -> Result<()> {
    let (source, document) = chunk_source(&args.input, &args.chunking)?;

    let output = ChunkOutput {
        filename: &source.filename,
        source_format: source.format.as_str(),
        doc_kind: source.doc_kind.as_str(),
        max_tokens: args.chunking.max_tokens,
        overlap_tokens: args.chunking.overlap_tokens,
        stats: &document.stats,
        records: args.with_records.then_some(document.records.as_slice()),
        chunks: &document.chunks,
    };

    match &args.output {
        Some(path) => {
            write_json_pretty(path, &output)?;
            info!(path = %path.display(), chunks = document.chunks.len(), "wrote chunks");
        }
        None => write_json_stdout(&output)?,
    }

    Ok(())
}

/// Loads a source document and runs it through the chunk pipeline.
pub(crate) fn chunk_source(
    input: &Path,
    chunking: &ChunkingArgs,
) -> Result<(LoadedDocument, ChunkedDocument)> {
    let config = ChunkingConfig::new(chunking.max_tokens, chunking.overlap_tokens)
        .context("invalid chunking configuration")?;
    let pipeline = ChunkPipeline::new(config)?;

    let source = load_document(input, chunking.doc_kind)?;
    let document = pipeline.run(&source.elements, source.doc_kind);

    if document.chunks.is_empty() {
        warn!(path = %input.display(), "document produced no chunks");
    }
    if document.stats.oversized_chunk_count > 0 {
        warn!(
            oversized = document.stats.oversized_chunk_count,
            max_tokens = config.max_tokens(),
            "chunks exceed max_tokens because a single sentence was larger than the window"
        );
    }

    info!(
        filename = %source.filename,
        elements = document.stats.element_count,
        records = document.stats.record_count,
        chunks = document.stats.chunk_count,
        references = document.stats.reference_count,
        "chunked document"
    );

    Ok((source, document))
}
