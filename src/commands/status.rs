use std::fs;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::index::{
    DB_SCHEMA_VERSION, DEFAULT_DB_FILENAME, open_read_only, store_counts, stored_schema_version,
};
use crate::model::IngestRunManifest;
use crate::util::latest_json_file;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DEFAULT_DB_FILENAME));

    info!(cache_root = %args.cache_root.display(), "status requested");

    match latest_json_file(&manifest_dir, "ingest_run_")? {
        Some(manifest_path) => {
            let raw = fs::read(&manifest_path)
                .with_context(|| format!("failed to read {}", manifest_path.display()))?;
            let manifest: IngestRunManifest = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

            info!(
                path = %manifest_path.display(),
                run_id = %manifest.run_id,
                status = %manifest.status,
                doc_id = %manifest.doc_id,
                filename = %manifest.source.filename,
                updated_at = %manifest.updated_at,
                chunk_count = manifest.counts.chunk_count,
                embeddings_written = manifest.counts.embeddings_written,
                warning_count = manifest.warnings.len(),
                "loaded latest ingest manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no ingest manifest found"),
    }

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let connection = open_read_only(&db_path)?;
    let schema_version = stored_schema_version(&connection)?.unwrap_or_default();
    let counts = store_counts(&connection)?;

    if schema_version != DB_SCHEMA_VERSION {
        warn!(
            stored = %schema_version,
            expected = DB_SCHEMA_VERSION,
            "database schema version differs; re-ingest documents"
        );
    }

    info!(
        path = %db_path.display(),
        schema_version = %schema_version,
        docs = counts.docs,
        chunks = counts.chunks,
        embeddings = counts.embeddings,
        "database status"
    );

    Ok(())
}
