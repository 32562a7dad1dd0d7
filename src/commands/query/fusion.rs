use std::collections::HashMap;

use super::run::{QueryCandidate, sort_candidates};

#[derive(Clone, Copy)]
enum RankedList {
    Lexical,
    Semantic,
}

impl RankedList {
    fn tag(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        }
    }

    fn rank_of(self, candidate: &QueryCandidate) -> Option<usize> {
        match self {
            Self::Lexical => candidate.lexical_rank,
            Self::Semantic => candidate.semantic_rank,
        }
    }
}

/// Reciprocal-rank fusion: a chunk earns `1 / (rrf_k + rank)` from every list
/// it appears in. Stored scores from the input lists are not compared.
pub(super) fn fuse_rrf_candidates(
    lexical_candidates: &[QueryCandidate],
    semantic_candidates: &[QueryCandidate],
    rrf_k: u32,
) -> Vec<QueryCandidate> {
    let rrf_base = f64::from(rrf_k.max(1));
    let mut fused = HashMap::<&str, QueryCandidate>::new();

    for (list, candidates) in [
        (RankedList::Lexical, lexical_candidates),
        (RankedList::Semantic, semantic_candidates),
    ] {
        for (position, candidate) in candidates.iter().enumerate() {
            let rank = list.rank_of(candidate).unwrap_or(position + 1);
            let merged = fused.entry(candidate.chunk_id.as_str()).or_insert_with(|| {
                QueryCandidate {
                    score: 0.0,
                    source_tags: Vec::new(),
                    lexical_rank: None,
                    semantic_rank: None,
                    ..candidate.clone()
                }
            });

            merged.score += 1.0 / (rrf_base + rank as f64);
            merged.rrf_score = Some(merged.score);
            match list {
                RankedList::Lexical => merged.lexical_rank = Some(rank),
                RankedList::Semantic => merged.semantic_rank = Some(rank),
            }
            if !merged.source_tags.iter().any(|tag| tag == list.tag()) {
                merged.source_tags.push(list.tag().to_string());
            }
        }
    }

    let mut out = fused
        .into_values()
        .map(|mut candidate| {
            candidate.match_kind = match (candidate.lexical_rank, candidate.semantic_rank) {
                (Some(_), Some(_)) => "hybrid_rrf",
                (Some(_), None) => "lexical_rrf",
                _ => "semantic_rrf",
            }
            .to_string();
            candidate
        })
        .collect::<Vec<QueryCandidate>>();

    sort_candidates(&mut out);
    out
}
