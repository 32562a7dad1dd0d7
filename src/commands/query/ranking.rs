use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::run::QueryCandidate;

/// Lexical lookups can return the same chunk twice (heading hit and FTS hit).
/// The higher score wins and the source tags of both hits are kept.
pub(super) fn upsert_candidate(
    dedup: &mut HashMap<String, QueryCandidate>,
    candidate: QueryCandidate,
) {
    match dedup.entry(candidate.chunk_id.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(candidate);
        }
        Entry::Occupied(mut slot) => {
            let (mut winner, loser) = if candidate.score > slot.get().score {
                (candidate, slot.get().clone())
            } else {
                (slot.get().clone(), candidate)
            };
            for tag in loser.source_tags {
                if !winner.source_tags.contains(&tag) {
                    winner.source_tags.push(tag);
                }
            }
            slot.insert(winner);
        }
    }
}
