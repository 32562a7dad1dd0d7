mod metadata;
mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};
use serde::Serialize;
use tracing::{debug, info};

use crate::chunking::{Chunk, DocKind, token_count};
use crate::semantic::{
    SemanticModelConfig, chunk_payload_for_embedding, embed_text_local, embedding_text_hash,
    encode_embedding_blob,
};
use crate::util::{ensure_directory, now_utc_string};

pub use metadata::{MetadataValue, sanitize_chunk_metadata, sanitize_value};
pub use schema::{DB_SCHEMA_VERSION, stored_schema_version};

use schema::{configure_connection, count_rows, ensure_schema, sync_fts_index};

pub const DEFAULT_DB_FILENAME: &str = "policyrag_index.sqlite";

#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub doc_id: String,
    pub filename: String,
    pub source_path: String,
    pub sha256: String,
    pub doc_kind: DocKind,
    pub source_format: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreWriteStats {
    pub chunks_replaced: usize,
    pub chunks_inserted: usize,
    pub embeddings_written: usize,
    pub empty_payloads_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreCounts {
    pub docs: i64,
    pub chunks: i64,
    pub embeddings: i64,
}

pub struct ChunkStore {
    connection: Connection,
}

impl ChunkStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|value| !value.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;

        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Replaces every chunk and embedding previously stored for the document.
    pub fn replace_document(
        &mut self,
        document: &DocumentEntry,
        chunks: &[Chunk],
        model: &SemanticModelConfig,
    ) -> Result<StoreWriteStats> {
        let mut stats = StoreWriteStats::default();
        let tx = self
            .connection
            .transaction()
            .context("failed to start chunk store transaction")?;

        ensure_model_entry(&tx, model)?;

        tx.execute(
            "DELETE FROM chunk_embeddings
             WHERE chunk_id IN (SELECT chunk_id FROM chunks WHERE doc_id = ?1)",
            [&document.doc_id],
        )?;
        stats.chunks_replaced = tx.execute("DELETE FROM chunks WHERE doc_id = ?1", [&document.doc_id])?;

        tx.execute(
            "
            INSERT INTO docs(doc_id, filename, source_path, sha256, doc_kind, source_format, ingested_at)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(doc_id) DO UPDATE SET
              filename=excluded.filename,
              source_path=excluded.source_path,
              sha256=excluded.sha256,
              doc_kind=excluded.doc_kind,
              source_format=excluded.source_format,
              ingested_at=excluded.ingested_at
            ",
            params![
                document.doc_id,
                document.filename,
                document.source_path,
                document.sha256,
                document.doc_kind.as_str(),
                document.source_format,
                now_utc_string(),
            ],
        )?;

        {
            let mut insert_chunk = tx.prepare(
                "
                INSERT INTO chunks(
                  chunk_id, doc_id, chunk_seq, heading, section, clause, page, text,
                  token_count, context_json, references_json, metadata_json, text_hash
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ",
            )?;
            let mut insert_embedding = tx.prepare(
                "
                INSERT INTO chunk_embeddings(chunk_id, model_id, embedding, embedding_dim, text_hash, generated_at)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ",
            )?;

            for (seq, chunk) in chunks.iter().enumerate() {
                let chunk_id = chunk_id_for(&document.doc_id, seq);
                let metadata_json = serde_json::to_string(&sanitize_chunk_metadata(chunk)?)
                    .context("failed to serialize sanitized metadata")?;
                let context_json = serde_json::to_string(&chunk.metadata.context)
                    .context("failed to serialize chunk context")?;
                let references_json = serde_json::to_string(&chunk.metadata.references)
                    .context("failed to serialize chunk references")?;

                insert_chunk
                    .execute(params![
                        chunk_id,
                        document.doc_id,
                        seq as i64,
                        chunk.heading,
                        chunk.metadata.section,
                        chunk.metadata.clause,
                        i64::from(chunk.metadata.page),
                        chunk.chunk_text,
                        token_count(&chunk.chunk_text) as i64,
                        context_json,
                        references_json,
                        metadata_json,
                        embedding_text_hash(&chunk.chunk_text),
                    ])
                    .with_context(|| format!("failed to insert chunk {chunk_id}"))?;
                stats.chunks_inserted += 1;

                let Some(payload) = chunk_payload_for_embedding(
                    chunk.metadata.section.as_deref(),
                    &chunk.chunk_text,
                ) else {
                    stats.empty_payloads_skipped += 1;
                    continue;
                };

                let embedding = embed_text_local(&payload, model.dimensions);
                insert_embedding
                    .execute(params![
                        chunk_id,
                        model.model_id,
                        encode_embedding_blob(&embedding),
                        embedding.len() as i64,
                        embedding_text_hash(&payload),
                        now_utc_string(),
                    ])
                    .with_context(|| format!("failed to insert embedding for {chunk_id}"))?;
                stats.embeddings_written += 1;
            }
        }

        tx.commit().context("failed to commit chunk store transaction")?;
        sync_fts_index(&self.connection)?;

        info!(
            doc_id = %document.doc_id,
            replaced = stats.chunks_replaced,
            inserted = stats.chunks_inserted,
            embeddings = stats.embeddings_written,
            model_id = %model.model_id,
            "stored document chunks"
        );

        Ok(stats)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        store_counts(&self.connection)
    }
}

pub fn store_counts(connection: &Connection) -> Result<StoreCounts> {
    Ok(StoreCounts {
        docs: count_rows(connection, "SELECT COUNT(*) FROM docs")?,
        chunks: count_rows(connection, "SELECT COUNT(*) FROM chunks")?,
        embeddings: count_rows(connection, "SELECT COUNT(*) FROM chunk_embeddings")?,
    })
}

pub fn open_read_only(db_path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))
}

/// Stable id derived from the file name, so re-ingesting a document replaces it.
pub fn doc_id_for(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or(filename);

    let mut slug = String::with_capacity(stem.len());
    for character in stem.chars() {
        if character.is_ascii_alphanumeric() {
            slug.push(character.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "document".to_string()
    } else {
        slug.to_string()
    }
}

pub fn chunk_id_for(doc_id: &str, seq: usize) -> String {
    format!("{doc_id}:{seq:05}")
}

fn ensure_model_entry(connection: &Connection, model: &SemanticModelConfig) -> Result<()> {
    let config_json = serde_json::to_string(model).context("failed to serialize model config")?;

    connection
        .execute(
            "
            INSERT INTO embedding_models(model_id, backend, model_name, dimensions, normalize, created_at, config_json)
            VALUES(?1, ?2, ?3, ?4, 1, ?5, ?6)
            ON CONFLICT(model_id) DO UPDATE SET
              backend=excluded.backend,
              model_name=excluded.model_name,
              dimensions=excluded.dimensions,
              normalize=excluded.normalize,
              config_json=excluded.config_json
            ",
            params![
                model.model_id,
                model.backend,
                model.model_name,
                model.dimensions as i64,
                now_utc_string(),
                config_json,
            ],
        )
        .with_context(|| format!("failed to register embedding model {}", model.model_id))?;

    debug!(model_id = %model.model_id, dimensions = model.dimensions, "registered embedding model");
    Ok(())
}
