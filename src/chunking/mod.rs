mod builder;
mod normalize;
mod references;
mod sentences;
mod structure;
#[cfg(test)]
mod tests;
mod types;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

pub use builder::{ChunkingConfig, DEFAULT_MAX_TOKENS, DEFAULT_OVERLAP_TOKENS};
pub use normalize::collapse_whitespace;
pub use types::{
    AnnotatedRecord, Chunk, ChunkMetadata, DocKind, ElementCategory, ParsedElement, token_count,
};

use builder::ChunkBuilder;
use normalize::TextNormalizer;
use references::ReferenceExtractor;
use structure::StructureDetector;
use types::RecordKind;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    pub element_count: usize,
    pub dropped_element_count: usize,
    pub record_count: usize,
    pub heading_records: usize,
    pub clause_records: usize,
    pub list_item_records: usize,
    pub table_records: usize,
    pub annex_records: usize,
    pub text_records: usize,
    pub qualified_records: usize,
    pub chunk_count: usize,
    pub oversized_chunk_count: usize,
    pub reference_count: usize,
}

#[derive(Debug, Clone)]
pub struct ChunkedDocument {
    pub records: Vec<AnnotatedRecord>,
    pub chunks: Vec<Chunk>,
    pub stats: PipelineStats,
}

#[derive(Debug)]
pub struct ChunkPipeline {
    normalizer: TextNormalizer,
    detector: StructureDetector,
    builder: ChunkBuilder,
    references: ReferenceExtractor,
}

impl ChunkPipeline {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            normalizer: TextNormalizer::new()?,
            detector: StructureDetector::new()?,
            builder: ChunkBuilder::new(config),
            references: ReferenceExtractor::new()?,
        })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.builder.config()
    }

    pub fn run(&self, elements: &[ParsedElement], doc_kind: DocKind) -> ChunkedDocument {
        let normalized = elements
            .iter()
            .map(|element| ParsedElement {
                text: self.normalizer.normalize(&element.text, doc_kind),
                page_number: element.page_number,
                category: element.category,
            })
            .filter(|element| !element.text.is_empty())
            .collect::<Vec<ParsedElement>>();

        let records = self.detector.detect(&normalized);
        let mut chunks = self.builder.build(&records);
        let reference_count = self.references.apply(&mut chunks);

        let max_tokens = self.config().max_tokens();
        let mut stats = PipelineStats {
            element_count: elements.len(),
            dropped_element_count: elements.len() - normalized.len(),
            record_count: records.len(),
            chunk_count: chunks.len(),
            oversized_chunk_count: chunks
                .iter()
                .filter(|chunk| token_count(&chunk.chunk_text) > max_tokens)
                .count(),
            reference_count,
            ..PipelineStats::default()
        };
        for record in &records {
            match record.kind {
                RecordKind::Heading => stats.heading_records += 1,
                RecordKind::Clause => stats.clause_records += 1,
                RecordKind::ListItem => stats.list_item_records += 1,
                RecordKind::Table => stats.table_records += 1,
                RecordKind::Annex => stats.annex_records += 1,
                RecordKind::Text => stats.text_records += 1,
            }
            if !record.context.is_empty() {
                stats.qualified_records += 1;
            }
        }

        debug!(
            doc_kind = doc_kind.as_str(),
            elements = stats.element_count,
            records = stats.record_count,
            chunks = stats.chunk_count,
            "chunk pipeline finished"
        );

        ChunkedDocument {
            records,
            chunks,
            stats,
        }
    }
}
