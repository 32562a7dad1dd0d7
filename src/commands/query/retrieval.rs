use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::ranking::upsert_candidate;
use super::run::{CANDIDATE_COLUMNS, QueryCandidate, sort_candidates};
use super::text::to_fts_query;

pub(super) fn collect_lexical_candidates(
    connection: &Connection,
    query_text: &str,
    doc_filter: Option<&str>,
    candidate_limit: usize,
) -> Result<Vec<QueryCandidate>> {
    let mut dedup = HashMap::<String, QueryCandidate>::new();

    for candidate in query_heading_matches(connection, query_text, doc_filter, candidate_limit)? {
        upsert_candidate(&mut dedup, candidate);
    }
    for candidate in query_fts_matches(connection, query_text, doc_filter, candidate_limit)? {
        upsert_candidate(&mut dedup, candidate);
    }

    let mut candidates = dedup.into_values().collect::<Vec<QueryCandidate>>();
    sort_candidates(&mut candidates);
    candidates.truncate(candidate_limit);

    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.lexical_rank = Some(index + 1);
    }

    Ok(candidates)
}

/// Section and heading lookups such as `--query "Exclusions"`.
fn query_heading_matches(
    connection: &Connection,
    query_text: &str,
    doc_filter: Option<&str>,
    candidate_limit: usize,
) -> Result<Vec<QueryCandidate>> {
    let sql = format!(
        "
        SELECT {CANDIDATE_COLUMNS},
          substr(c.text, 1, 420)
        FROM chunks c
        WHERE
          (?2 IS NULL OR c.doc_id = ?2)
          AND (
            lower(c.heading) LIKE '%' || lower(?1) || '%'
            OR lower(c.section) LIKE '%' || lower(?1) || '%'
          )
        ORDER BY c.doc_id, c.chunk_seq
        LIMIT ?3
        "
    );
    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare heading lookup")?;
    let mut rows = statement.query(params![query_text, doc_filter, candidate_limit as i64])?;

    let query_lower = query_text.to_lowercase();
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        let heading = row.get::<_, String>(3)?.to_lowercase();
        let section = row.get::<_, String>(4)?.to_lowercase();

        let (score, match_kind) = if heading == query_lower || section == query_lower {
            (900.0, "exact_heading")
        } else if heading.contains(&query_lower) {
            (700.0, "heading_contains")
        } else {
            (600.0, "section_contains")
        };

        out.push(QueryCandidate::from_row(row, score, match_kind, "lexical_heading")?);
    }

    Ok(out)
}

fn query_fts_matches(
    connection: &Connection,
    query_text: &str,
    doc_filter: Option<&str>,
    candidate_limit: usize,
) -> Result<Vec<QueryCandidate>> {
    let fts_query = to_fts_query(query_text);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "
        SELECT {CANDIDATE_COLUMNS},
          snippet(chunks_fts, 4, '[', ']', ' ... ', 18)
        FROM chunks_fts
        JOIN chunks c ON c.rowid = chunks_fts.rowid
        WHERE
          chunks_fts MATCH ?1
          AND (?2 IS NULL OR c.doc_id = ?2)
        ORDER BY bm25(chunks_fts) ASC
        LIMIT ?3
        "
    );
    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare FTS lookup")?;
    let mut rows = statement.query(params![fts_query, doc_filter, candidate_limit as i64])?;

    let mut out = Vec::new();
    let mut index = 0usize;

    while let Some(row) = rows.next()? {
        let score = 500.0 - (index as f64);
        out.push(QueryCandidate::from_row(row, score, "fts", "lexical_fts")?);
        index += 1;
    }

    Ok(out)
}
