use std::io::{self, Write};

use anyhow::Result;

use crate::util::write_json_stdout;

use super::run::{QueryResponse, QueryResult, RetrievalMetadata};

pub(super) fn write_json_response(response: QueryResponse) -> Result<()> {
    write_json_stdout(&response)
}

pub(super) fn write_text_response(
    query_text: &str,
    retrieval: &RetrievalMetadata,
    results: &[QueryResult],
) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {query_text}")?;
    writeln!(
        output,
        "Retrieval: requested={} effective={} model={} fallback_used={} duration_ms={:.3}",
        retrieval.requested_mode,
        retrieval.effective_mode,
        retrieval.model_id,
        retrieval.fallback_used,
        retrieval.query_duration_ms,
    )?;
    writeln!(
        output,
        "Candidates: lexical={} semantic={} fused={} (k lexical={} semantic={} rrf={})",
        retrieval.lexical_candidate_count,
        retrieval.semantic_candidate_count,
        retrieval.fused_candidate_count,
        retrieval.lexical_k,
        retrieval.semantic_k,
        retrieval.rrf_k,
    )?;
    writeln!(output, "Results: {}", results.len())?;

    for result in results {
        let section = if result.section.is_empty() {
            "(no section)"
        } else {
            &result.section
        };

        writeln!(
            output,
            "{}.\t{}\t{}\tpage {}",
            result.rank, result.doc_id, section, result.page
        )?;
        writeln!(
            output,
            "\tmatch={} score={:.6} chunk_id={}",
            result.match_kind, result.score, result.chunk_id
        )?;
        writeln!(output, "\tsources={}", result.source_tags.join(","))?;
        if let Some(lexical_rank) = result.rank_trace.lexical_rank {
            writeln!(output, "\tlexical_rank: {lexical_rank}")?;
        }
        if let Some(semantic_rank) = result.rank_trace.semantic_rank {
            writeln!(output, "\tsemantic_rank: {semantic_rank}")?;
        }
        if let Some(rrf_score) = result.rank_trace.rrf_score {
            writeln!(output, "\trrf_score: {rrf_score:.6}")?;
        }
        if !result.clause.is_empty() {
            writeln!(output, "\tclause: {}", result.clause)?;
        }
        if !result.context.is_empty() {
            writeln!(output, "\tcontext: {}", result.context.join(", "))?;
        }
        if !result.references.is_empty() {
            writeln!(output, "\treferences: {}", result.references.join(", "))?;
        }
        writeln!(output, "\tsnippet: {}", result.snippet)?;
    }

    output.flush()?;
    Ok(())
}
