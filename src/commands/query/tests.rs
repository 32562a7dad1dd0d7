use crate::chunking::{Chunk, ChunkMetadata, DocKind};
use crate::index::{ChunkStore, DocumentEntry, doc_id_for};
use crate::semantic::{DEFAULT_MODEL_ID, resolve_model_config};

use super::fusion::fuse_rrf_candidates;
use super::retrieval::collect_lexical_candidates;
use super::run::{QueryCandidate, sort_candidates, to_results};
use super::semantic_retrieval::{collect_semantic_candidates, semantic_index_status};
use super::text::to_fts_query;

fn stored_chunk(text: &str, section: &str, context: &[&str]) -> Chunk {
    Chunk {
        chunk_text: text.to_string(),
        heading: Some(section.to_string()),
        metadata: ChunkMetadata {
            section: Some(section.to_string()),
            clause: None,
            page: 1,
            context: context.iter().map(|value| value.to_string()).collect(),
            references: Vec::new(),
        },
    }
}

fn seeded_store() -> ChunkStore {
    let mut store = ChunkStore::open_in_memory().expect("store opens");
    let model = resolve_model_config(DEFAULT_MODEL_ID);

    let policy = vec![
        stored_chunk(
            "SECTION 4 EXCLUSIONS Maternity expenses are excluded from cover.",
            "SECTION 4 EXCLUSIONS",
            &["excluded"],
        ),
        stored_chunk(
            "SECTION 2 BENEFITS Room rent is payable up to one percent of the sum insured.",
            "SECTION 2 BENEFITS",
            &[],
        ),
        stored_chunk(
            "SECTION 6 CLAIMS Intimate the insurer within seven days of admission.",
            "SECTION 6 CLAIMS",
            &[],
        ),
    ];
    let other = vec![stored_chunk(
        "PART B Maternity benefit is available after a waiting period.",
        "PART B",
        &[],
    )];

    for (filename, chunks) in [("policy.json", &policy), ("other.json", &other)] {
        let document = DocumentEntry {
            doc_id: doc_id_for(filename),
            filename: filename.to_string(),
            source_path: filename.to_string(),
            sha256: "00".to_string(),
            doc_kind: DocKind::Generic,
            source_format: "element_json".to_string(),
        };
        store
            .replace_document(&document, chunks, &model)
            .expect("document stores");
    }

    store
}

fn candidate(chunk_id: &str, doc_id: &str, chunk_seq: i64, score: f64) -> QueryCandidate {
    QueryCandidate {
        score,
        match_kind: "fts".to_string(),
        source_tags: vec!["lexical_fts".to_string()],
        lexical_rank: None,
        semantic_rank: None,
        rrf_score: None,
        chunk_id: chunk_id.to_string(),
        doc_id: doc_id.to_string(),
        chunk_seq,
        heading: String::new(),
        section: String::new(),
        clause: String::new(),
        page: 1,
        text: String::new(),
        context_json: "[]".to_string(),
        references_json: "[]".to_string(),
        snippet: String::new(),
    }
}

#[test]
fn fts_query_quotes_terms_and_drops_punctuation() {
    assert_eq!(
        to_fts_query("Is maternity \"covered\" - ?"),
        "\"Is\" OR \"maternity\" OR \"covered\""
    );
    assert_eq!(to_fts_query("  ?? "), "");
}

#[test]
fn lexical_retrieval_ranks_fts_matches() {
    let store = seeded_store();

    let candidates = collect_lexical_candidates(store.connection(), "maternity", None, 10)
        .expect("lexical retrieval");
    let chunk_ids = candidates
        .iter()
        .map(|candidate| candidate.chunk_id.as_str())
        .collect::<Vec<&str>>();

    assert_eq!(candidates.len(), 2);
    assert!(chunk_ids.contains(&"policy:00000"));
    assert!(chunk_ids.contains(&"other:00000"));
    assert_eq!(candidates[0].lexical_rank, Some(1));
    assert_eq!(candidates[1].lexical_rank, Some(2));
    assert!(
        candidates
            .iter()
            .all(|candidate| candidate.source_tags == vec!["lexical_fts".to_string()])
    );
}

#[test]
fn heading_lookup_outranks_body_match() {
    let store = seeded_store();

    let candidates = collect_lexical_candidates(store.connection(), "exclusions", None, 10)
        .expect("lexical retrieval");

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].chunk_id, "policy:00000");
    assert_eq!(candidates[0].match_kind, "heading_contains");
    assert_eq!(candidates[0].score, 700.0);
    assert_eq!(
        candidates[0].source_tags,
        vec!["lexical_heading".to_string(), "lexical_fts".to_string()]
    );
}

#[test]
fn doc_filter_limits_lexical_and_semantic_results() {
    let store = seeded_store();
    let model = resolve_model_config(DEFAULT_MODEL_ID);

    let lexical = collect_lexical_candidates(store.connection(), "maternity", Some("other"), 10)
        .expect("lexical retrieval");
    assert_eq!(lexical.len(), 1);
    assert_eq!(lexical[0].doc_id, "other");

    let semantic = collect_semantic_candidates(
        store.connection(),
        "maternity",
        Some("other"),
        &model,
        10,
        None,
    )
    .expect("semantic retrieval");
    assert_eq!(semantic.len(), 1);
    assert_eq!(semantic[0].chunk_id, "other:00000");
}

#[test]
fn semantic_retrieval_prefers_overlapping_chunk() {
    let store = seeded_store();
    let model = resolve_model_config(DEFAULT_MODEL_ID);

    let candidates = collect_semantic_candidates(
        store.connection(),
        "maternity expenses are excluded",
        None,
        &model,
        3,
        None,
    )
    .expect("semantic retrieval");

    assert_eq!(candidates.len(), 3);
    assert_eq!(candidates[0].chunk_id, "policy:00000");
    assert_eq!(candidates[0].match_kind, "semantic_cosine");
    assert_eq!(candidates[0].semantic_rank, Some(1));
    assert!(candidates[0].score > candidates[1].score);
}

#[test]
fn semantic_status_reports_missing_model() {
    let store = seeded_store();

    let available = semantic_index_status(store.connection(), DEFAULT_MODEL_ID).expect("status");
    assert!(available.available);
    assert!(available.reason.is_none());

    let missing = semantic_index_status(store.connection(), "unknown-model").expect("status");
    assert!(!missing.available);
    assert!(
        missing
            .reason
            .as_deref()
            .is_some_and(|reason| reason.contains("unknown-model"))
    );
}

#[test]
fn rrf_fusion_rewards_agreement() {
    let lexical = vec![candidate("a", "doc", 0, 500.0), candidate("b", "doc", 1, 499.0)];
    let semantic = vec![candidate("b", "doc", 1, 0.9), candidate("c", "doc", 2, 0.8)];

    let fused = fuse_rrf_candidates(&lexical, &semantic, 60);
    let order = fused
        .iter()
        .map(|candidate| candidate.chunk_id.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(order, vec!["b", "a", "c"]);

    assert_eq!(fused[0].match_kind, "hybrid_rrf");
    assert_eq!(
        fused[0].source_tags,
        vec!["lexical".to_string(), "semantic".to_string()]
    );
    assert_eq!(fused[0].lexical_rank, Some(2));
    assert_eq!(fused[0].semantic_rank, Some(1));
    assert!((fused[0].score - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);

    assert_eq!(fused[1].match_kind, "lexical_rrf");
    assert_eq!(fused[2].match_kind, "semantic_rrf");
}

#[test]
fn hybrid_fusion_over_stored_chunks_puts_shared_hit_first() {
    let store = seeded_store();
    let model = resolve_model_config(DEFAULT_MODEL_ID);
    let query = "maternity expenses excluded";

    let lexical =
        collect_lexical_candidates(store.connection(), query, None, 10).expect("lexical retrieval");
    let semantic = collect_semantic_candidates(store.connection(), query, None, &model, 10, None)
        .expect("semantic retrieval");
    let fused = fuse_rrf_candidates(&lexical, &semantic, 60);

    assert_eq!(fused[0].chunk_id, "policy:00000");
    assert_eq!(fused[0].match_kind, "hybrid_rrf");
    assert!(fused[0].rrf_score.is_some());
}

#[test]
fn sort_breaks_score_ties_by_document_order() {
    let mut candidates = vec![
        candidate("z:00002", "z", 2, 1.0),
        candidate("a:00005", "a", 5, 1.0),
        candidate("a:00001", "a", 1, 1.0),
        candidate("m:00000", "m", 0, 2.0),
    ];
    sort_candidates(&mut candidates);

    let order = candidates
        .iter()
        .map(|candidate| candidate.chunk_id.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(order, vec!["m:00000", "a:00001", "a:00005", "z:00002"]);
}

#[test]
fn results_carry_parsed_metadata_and_ranks() {
    let mut first = candidate("policy:00000", "policy", 0, 3.0);
    first.context_json = "[\"excluded\"]".to_string();
    first.references_json = "[\"See Section 2.1\"]".to_string();
    first.text = "Body".to_string();

    let results = to_results(vec![first, candidate("policy:00001", "policy", 1, 2.0)])
        .expect("results build");

    assert_eq!(results[0].rank, 1);
    assert_eq!(results[1].rank, 2);
    assert_eq!(results[0].context, vec!["excluded".to_string()]);
    assert_eq!(results[0].references, vec!["See Section 2.1".to_string()]);
    assert_eq!(results[0].chunk_text, "Body");

    let mut broken = candidate("policy:00002", "policy", 2, 1.0);
    broken.context_json = "not json".to_string();
    assert!(to_results(vec![broken]).is_err());
}
