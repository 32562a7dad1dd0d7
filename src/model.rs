use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    pub filename: String,
    pub source_path: String,
    pub source_format: String,
    pub doc_kind: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub policyrag: String,
    pub pdftotext: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub model_id: String,
    pub embedding_dimensions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestCounts {
    pub element_count: usize,
    pub dropped_element_count: usize,
    pub record_count: usize,
    pub heading_records: usize,
    pub clause_records: usize,
    pub list_item_records: usize,
    pub table_records: usize,
    pub annex_records: usize,
    pub qualified_records: usize,
    pub chunk_count: usize,
    pub oversized_chunk_count: usize,
    pub reference_count: usize,
    pub chunks_replaced: usize,
    pub chunks_inserted: usize,
    pub embeddings_written: usize,
    pub docs_total: i64,
    pub chunks_total: i64,
    pub embeddings_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub doc_id: String,
    pub tool_versions: ToolVersions,
    pub paths: IngestPaths,
    pub settings: ChunkingSettings,
    pub counts: IngestCounts,
    pub source: SourceEntry,
    pub warnings: Vec<String>,
}
