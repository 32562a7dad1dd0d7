use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::semantic::{
    SemanticModelConfig, cosine_similarity, decode_embedding_blob, embed_text_local,
};

use super::run::{
    CANDIDATE_COLUMNS, QueryCandidate, QueryTimeoutBudget, enforce_timeout, sort_candidates,
};

pub(super) struct SemanticIndexStatus {
    pub(super) available: bool,
    pub(super) reason: Option<String>,
}

pub(super) fn semantic_index_status(
    connection: &Connection,
    model_id: &str,
) -> Result<SemanticIndexStatus> {
    let model_exists = connection
        .query_row(
            "SELECT 1 FROM embedding_models WHERE model_id = ?1 LIMIT 1",
            [model_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .context("failed to look up embedding model")?
        .is_some();
    if !model_exists {
        return Ok(SemanticIndexStatus {
            available: false,
            reason: Some(format!("embedding model '{model_id}' is not registered")),
        });
    }

    let embedding_count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM chunk_embeddings WHERE model_id = ?1",
        [model_id],
        |row| row.get(0),
    )?;
    if embedding_count <= 0 {
        return Ok(SemanticIndexStatus {
            available: false,
            reason: Some(format!("semantic index is empty for model '{model_id}'")),
        });
    }

    Ok(SemanticIndexStatus {
        available: true,
        reason: None,
    })
}

/// Brute-force cosine scan over every embedding stored for the model.
pub(super) fn collect_semantic_candidates(
    connection: &Connection,
    query_text: &str,
    doc_filter: Option<&str>,
    model: &SemanticModelConfig,
    candidate_limit: usize,
    timeout_budget: Option<QueryTimeoutBudget>,
) -> Result<Vec<QueryCandidate>> {
    let query_embedding = embed_text_local(query_text, model.dimensions);

    let sql = format!(
        "
        SELECT {CANDIDATE_COLUMNS},
          substr(c.text, 1, 420),
          ce.embedding,
          ce.embedding_dim
        FROM chunk_embeddings ce
        JOIN chunks c ON c.chunk_id = ce.chunk_id
        WHERE
          ce.model_id = ?1
          AND (?2 IS NULL OR c.doc_id = ?2)
        "
    );
    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare semantic scan")?;
    let mut rows = statement.query(params![model.model_id, doc_filter])?;

    let mut out = Vec::<QueryCandidate>::new();
    let mut scanned_rows = 0usize;
    while let Some(row) = rows.next()? {
        scanned_rows += 1;
        if scanned_rows % 64 == 0 {
            enforce_timeout(timeout_budget, "semantic candidate scan")?;
        }

        let row_dim = row.get::<_, i64>(12)? as usize;
        if row_dim != model.dimensions {
            continue;
        }

        let embedding_blob = row.get::<_, Vec<u8>>(11)?;
        let Some(candidate_embedding) = decode_embedding_blob(&embedding_blob, model.dimensions)
        else {
            continue;
        };

        let similarity = cosine_similarity(&query_embedding, &candidate_embedding);
        out.push(QueryCandidate::from_row(
            row,
            similarity,
            "semantic_cosine",
            "semantic",
        )?);
    }

    sort_candidates(&mut out);
    out.truncate(candidate_limit);
    for (index, candidate) in out.iter_mut().enumerate() {
        candidate.semantic_rank = Some(index + 1);
    }

    Ok(out)
}
