use std::time::Instant;

use anyhow::{Context, Result, bail};
use rusqlite::Row;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{QueryArgs, RetrievalMode};
use crate::index::{DEFAULT_DB_FILENAME, open_read_only};
use crate::semantic::resolve_model_config;

use super::fusion::fuse_rrf_candidates;
use super::output::{write_json_response, write_text_response};
use super::retrieval::collect_lexical_candidates;
use super::semantic_retrieval::{collect_semantic_candidates, semantic_index_status};

const MAX_QUERY_CANDIDATES: usize = 256;

/// Column list shared by every candidate query; the last column is filled in
/// by each query (snippet or preview).
pub(super) const CANDIDATE_COLUMNS: &str = "
  c.chunk_id,
  c.doc_id,
  c.chunk_seq,
  COALESCE(c.heading, ''),
  COALESCE(c.section, ''),
  COALESCE(c.clause, ''),
  c.page,
  c.text,
  c.context_json,
  c.references_json";

#[derive(Debug, Clone)]
pub(super) struct QueryCandidate {
    pub(super) score: f64,
    pub(super) match_kind: String,
    pub(super) source_tags: Vec<String>,
    pub(super) lexical_rank: Option<usize>,
    pub(super) semantic_rank: Option<usize>,
    pub(super) rrf_score: Option<f64>,
    pub(super) chunk_id: String,
    pub(super) doc_id: String,
    pub(super) chunk_seq: i64,
    pub(super) heading: String,
    pub(super) section: String,
    pub(super) clause: String,
    pub(super) page: i64,
    pub(super) text: String,
    pub(super) context_json: String,
    pub(super) references_json: String,
    pub(super) snippet: String,
}

impl QueryCandidate {
    /// Reads [`CANDIDATE_COLUMNS`] followed by a snippet column.
    pub(super) fn from_row(
        row: &Row<'_>,
        score: f64,
        match_kind: &str,
        source_tag: &str,
    ) -> rusqlite::Result<Self> {
        Ok(Self {
            score,
            match_kind: match_kind.to_string(),
            source_tags: vec![source_tag.to_string()],
            lexical_rank: None,
            semantic_rank: None,
            rrf_score: None,
            chunk_id: row.get(0)?,
            doc_id: row.get(1)?,
            chunk_seq: row.get(2)?,
            heading: row.get(3)?,
            section: row.get(4)?,
            clause: row.get(5)?,
            page: row.get(6)?,
            text: row.get(7)?,
            context_json: row.get(8)?,
            references_json: row.get(9)?,
            snippet: row.get(10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct QueryRankTrace {
    pub(super) lexical_rank: Option<usize>,
    pub(super) semantic_rank: Option<usize>,
    pub(super) rrf_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub(super) struct QueryResult {
    pub(super) rank: usize,
    pub(super) score: f64,
    pub(super) match_kind: String,
    pub(super) source_tags: Vec<String>,
    pub(super) rank_trace: QueryRankTrace,
    pub(super) chunk_id: String,
    pub(super) doc_id: String,
    pub(super) heading: String,
    pub(super) section: String,
    pub(super) clause: String,
    pub(super) page: i64,
    pub(super) context: Vec<String>,
    pub(super) references: Vec<String>,
    pub(super) snippet: String,
    pub(super) chunk_text: String,
}

#[derive(Debug, Serialize)]
pub(super) struct RetrievalMetadata {
    pub(super) requested_mode: String,
    pub(super) effective_mode: String,
    pub(super) lexical_k: usize,
    pub(super) semantic_k: usize,
    pub(super) lexical_candidate_count: usize,
    pub(super) semantic_candidate_count: usize,
    pub(super) fused_candidate_count: usize,
    pub(super) rrf_k: u32,
    pub(super) model_id: String,
    pub(super) fallback_used: bool,
    pub(super) fallback_reason: Option<String>,
    pub(super) timeout_ms: u64,
    pub(super) query_duration_ms: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct QueryResponse {
    pub(super) query: String,
    pub(super) limit: usize,
    pub(super) returned: usize,
    pub(super) doc_filter: Option<String>,
    pub(super) retrieval: RetrievalMetadata,
    pub(super) results: Vec<QueryResult>,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let query_started = Instant::now();
    let query_text = args.query.trim();
    if query_text.is_empty() {
        bail!("query must not be empty");
    }

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| args.cache_root.join(DEFAULT_DB_FILENAME));
    let connection = open_read_only(&db_path)?;

    let doc_filter = args
        .doc_id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let limit = args.limit.max(1);
    let lexical_k = clamp_candidates(args.lexical_k.max(limit));
    let semantic_k = clamp_candidates(args.semantic_k.max(limit));
    let timeout_budget = QueryTimeoutBudget::new(args.timeout_ms);
    let model = resolve_model_config(&args.model_id);

    let requested_mode = args.retrieval_mode;
    let mut effective_mode = requested_mode;
    let mut fallback_used = false;
    let mut fallback_reason = None::<String>;

    if matches!(
        requested_mode,
        RetrievalMode::Semantic | RetrievalMode::Hybrid
    ) {
        let status = semantic_index_status(&connection, &model.model_id)?;
        if !status.available {
            let reason = status
                .reason
                .unwrap_or_else(|| "semantic index is unavailable".to_string());
            if !args.allow_lexical_fallback {
                bail!(
                    "{}; run `policyrag ingest --input <document> --model-id {}` or pass --allow-lexical-fallback",
                    reason,
                    model.model_id
                );
            }

            warn!(reason = %reason, "semantic retrieval unavailable; falling back to lexical");
            fallback_used = true;
            fallback_reason = Some(reason);
            effective_mode = RetrievalMode::Lexical;
        }
    }

    let mut lexical_candidates = Vec::<QueryCandidate>::new();
    if matches!(
        effective_mode,
        RetrievalMode::Lexical | RetrievalMode::Hybrid
    ) {
        lexical_candidates =
            collect_lexical_candidates(&connection, query_text, doc_filter.as_deref(), lexical_k)?;
        enforce_timeout(timeout_budget, "lexical retrieval")?;
    }

    let mut semantic_candidates = Vec::<QueryCandidate>::new();
    if matches!(
        effective_mode,
        RetrievalMode::Semantic | RetrievalMode::Hybrid
    ) {
        semantic_candidates = collect_semantic_candidates(
            &connection,
            query_text,
            doc_filter.as_deref(),
            &model,
            semantic_k,
            timeout_budget,
        )?;
        enforce_timeout(timeout_budget, "semantic retrieval")?;
    }

    let lexical_candidate_count = lexical_candidates.len();
    let semantic_candidate_count = semantic_candidates.len();
    let mut candidates = match effective_mode {
        RetrievalMode::Lexical => lexical_candidates,
        RetrievalMode::Semantic => semantic_candidates,
        RetrievalMode::Hybrid => {
            fuse_rrf_candidates(&lexical_candidates, &semantic_candidates, args.rrf_k)
        }
    };
    let fused_candidate_count = candidates.len();

    sort_candidates(&mut candidates);
    candidates.truncate(limit);

    let results = to_results(candidates)?;
    let query_duration_ms = query_started.elapsed().as_secs_f64() * 1000.0;

    let retrieval = RetrievalMetadata {
        requested_mode: requested_mode.as_str().to_string(),
        effective_mode: effective_mode.as_str().to_string(),
        lexical_k,
        semantic_k,
        lexical_candidate_count,
        semantic_candidate_count,
        fused_candidate_count,
        rrf_k: args.rrf_k,
        model_id: model.model_id,
        fallback_used,
        fallback_reason,
        timeout_ms: args.timeout_ms,
        query_duration_ms,
    };

    info!(
        query = %query_text,
        requested_mode = %retrieval.requested_mode,
        effective_mode = %retrieval.effective_mode,
        doc_filter = ?doc_filter,
        lexical_candidate_count,
        semantic_candidate_count,
        fused_candidate_count,
        query_duration_ms,
        result_count = results.len(),
        "query completed"
    );

    if args.json {
        write_json_response(QueryResponse {
            query: query_text.to_string(),
            limit,
            returned: results.len(),
            doc_filter,
            retrieval,
            results,
        })
    } else {
        write_text_response(query_text, &retrieval, &results)
    }
}

pub(super) fn to_results(candidates: Vec<QueryCandidate>) -> Result<Vec<QueryResult>> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| {
            let context: Vec<String> = serde_json::from_str(&candidate.context_json)
                .with_context(|| format!("invalid context_json on {}", candidate.chunk_id))?;
            let references: Vec<String> = serde_json::from_str(&candidate.references_json)
                .with_context(|| format!("invalid references_json on {}", candidate.chunk_id))?;

            Ok(QueryResult {
                rank: index + 1,
                score: candidate.score,
                match_kind: candidate.match_kind,
                source_tags: candidate.source_tags,
                rank_trace: QueryRankTrace {
                    lexical_rank: candidate.lexical_rank,
                    semantic_rank: candidate.semantic_rank,
                    rrf_score: candidate.rrf_score,
                },
                chunk_id: candidate.chunk_id,
                doc_id: candidate.doc_id,
                heading: candidate.heading,
                section: candidate.section,
                clause: candidate.clause,
                page: candidate.page,
                context,
                references,
                snippet: candidate.snippet,
                chunk_text: candidate.text,
            })
        })
        .collect()
}

fn clamp_candidates(value: usize) -> usize {
    value.clamp(1, MAX_QUERY_CANDIDATES)
}

#[derive(Clone, Copy)]
pub(super) struct QueryTimeoutBudget {
    started: Instant,
    timeout_ms: u64,
}

impl QueryTimeoutBudget {
    fn new(timeout_ms: u64) -> Option<Self> {
        if timeout_ms == 0 {
            return None;
        }
        Some(Self {
            started: Instant::now(),
            timeout_ms,
        })
    }

    fn enforce(self, stage: &str) -> Result<()> {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        if elapsed_ms <= self.timeout_ms as f64 {
            return Ok(());
        }

        bail!(
            "query timeout exceeded during {} (elapsed {:.1} ms > budget {} ms); reduce --lexical-k/--semantic-k, pass --doc-id, or increase --timeout-ms",
            stage,
            elapsed_ms,
            self.timeout_ms
        )
    }
}

pub(super) fn enforce_timeout(
    timeout_budget: Option<QueryTimeoutBudget>,
    stage: &str,
) -> Result<()> {
    if let Some(timeout_budget) = timeout_budget {
        timeout_budget.enforce(stage)?;
    }
    Ok(())
}

pub(super) fn sort_candidates(candidates: &mut [QueryCandidate]) {
    candidates.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then(left.doc_id.cmp(&right.doc_id))
            .then(left.chunk_seq.cmp(&right.chunk_seq))
            .then(left.chunk_id.cmp(&right.chunk_id))
    });
}
