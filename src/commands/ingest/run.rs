use std::process::Command;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::chunking::PipelineStats;
use crate::cli::IngestArgs;
use crate::commands::chunk::chunk_source;
use crate::index::{
    ChunkStore, DB_SCHEMA_VERSION, DEFAULT_DB_FILENAME, DocumentEntry, StoreCounts,
    StoreWriteStats, doc_id_for,
};
use crate::model::{
    ChunkingSettings, IngestCounts, IngestPaths, IngestRunManifest, SourceEntry, ToolVersions,
};
use crate::semantic::resolve_model_config;
use crate::util::{
    ensure_directory, now_utc_string, sha256_file, utc_compact_string, write_json_pretty,
};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    let manifest_dir = cache_root.join("manifests");
    ensure_directory(&manifest_dir)?;

    let ingest_manifest_path = args.ingest_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| cache_root.join(DEFAULT_DB_FILENAME));

    info!(
        input = %args.input.display(),
        cache_root = %cache_root.display(),
        run_id = %run_id,
        "starting ingest"
    );

    let (source, document) = chunk_source(&args.input, &args.chunking)?;
    let sha256 = sha256_file(&args.input)?;
    let model = resolve_model_config(&args.model_id);

    let entry = DocumentEntry {
        doc_id: doc_id_for(&source.filename),
        filename: source.filename.clone(),
        source_path: source.source_path.display().to_string(),
        sha256: sha256.clone(),
        doc_kind: source.doc_kind,
        source_format: source.format.as_str().to_string(),
    };

    let mut store = ChunkStore::open(&db_path)?;
    let write_stats = store.replace_document(&entry, &document.chunks, &model)?;
    let totals = store.counts()?;

    let mut warnings = Vec::<String>::new();
    if document.chunks.is_empty() {
        warnings.push(format!("{} produced no chunks", source.filename));
    }
    if document.stats.oversized_chunk_count > 0 {
        warnings.push(format!(
            "{} chunks exceed max_tokens={} because of single oversized sentences",
            document.stats.oversized_chunk_count, args.chunking.max_tokens
        ));
    }
    for warning in &warnings {
        warn!(warning = %warning, "ingest warning");
    }

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        doc_id: entry.doc_id.clone(),
        tool_versions: collect_tool_versions(),
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            db_path: db_path.display().to_string(),
        },
        settings: ChunkingSettings {
            max_tokens: args.chunking.max_tokens,
            overlap_tokens: args.chunking.overlap_tokens,
            model_id: model.model_id.clone(),
            embedding_dimensions: model.dimensions,
        },
        counts: ingest_counts(&document.stats, write_stats, totals),
        source: SourceEntry {
            filename: source.filename,
            source_path: entry.source_path,
            source_format: entry.source_format,
            doc_kind: entry.doc_kind.as_str().to_string(),
            sha256,
        },
        warnings,
    };

    write_json_pretty(&ingest_manifest_path, &manifest)?;

    info!(path = %ingest_manifest_path.display(), "wrote ingest run manifest");
    info!(
        doc_id = %entry.doc_id,
        docs = totals.docs,
        chunks = totals.chunks,
        embeddings = totals.embeddings,
        "ingest completed"
    );

    Ok(())
}

pub(super) fn ingest_counts(
    stats: &PipelineStats,
    write_stats: StoreWriteStats,
    totals: StoreCounts,
) -> IngestCounts {
    IngestCounts {
        element_count: stats.element_count,
        dropped_element_count: stats.dropped_element_count,
        record_count: stats.record_count,
        heading_records: stats.heading_records,
        clause_records: stats.clause_records,
        list_item_records: stats.list_item_records,
        table_records: stats.table_records,
        annex_records: stats.annex_records,
        qualified_records: stats.qualified_records,
        chunk_count: stats.chunk_count,
        oversized_chunk_count: stats.oversized_chunk_count,
        reference_count: stats.reference_count,
        chunks_replaced: write_stats.chunks_replaced,
        chunks_inserted: write_stats.chunks_inserted,
        embeddings_written: write_stats.embeddings_written,
        docs_total: totals.docs,
        chunks_total: totals.chunks,
        embeddings_total: totals.embeddings,
    }
}

fn collect_tool_versions() -> ToolVersions {
    ToolVersions {
        policyrag: env!("CARGO_PKG_VERSION").to_string(),
        pdftotext: command_version_optional("pdftotext", &["-v"]),
    }
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

pub(super) fn render_ingest_command(args: &IngestArgs) -> String {
    let mut command = vec![
        "policyrag".to_string(),
        "ingest".to_string(),
        "--input".to_string(),
        args.input.display().to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.ingest_manifest_path {
        command.push("--ingest-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(doc_kind) = args.chunking.doc_kind {
        command.push("--doc-kind".to_string());
        command.push(doc_kind.as_str().replace('_', "-"));
    }
    command.push("--max-tokens".to_string());
    command.push(args.chunking.max_tokens.to_string());
    command.push("--overlap-tokens".to_string());
    command.push(args.chunking.overlap_tokens.to_string());
    command.push("--model-id".to_string());
    command.push(args.model_id.clone());

    command.join(" ")
}
