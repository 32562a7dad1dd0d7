use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunking::collapse_whitespace;

pub const DEFAULT_MODEL_ID: &str = "policy-hash-768-v1";
pub const DEFAULT_MODEL_NAME: &str = "local-hashed-word-bigram";
pub const DEFAULT_EMBEDDING_DIM: usize = 768;
pub const DEFAULT_NORMALIZATION: &str = "l2";
pub const DEFAULT_BACKEND: &str = "local-sha256-feature-hash-v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub model_name: String,
    pub dimensions: usize,
    pub normalization: String,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str) -> SemanticModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };

    let model_name = if resolved_id == DEFAULT_MODEL_ID {
        DEFAULT_MODEL_NAME
    } else {
        resolved_id
    };

    SemanticModelConfig {
        model_id: resolved_id.to_string(),
        model_name: model_name.to_string(),
        dimensions: DEFAULT_EMBEDDING_DIM,
        normalization: DEFAULT_NORMALIZATION.to_string(),
        backend: DEFAULT_BACKEND.to_string(),
    }
}

/// Embedding input for a stored chunk. The chunk text already carries its
/// qualifier prefix and heading; the section is added when it differs.
pub fn chunk_payload_for_embedding(section: Option<&str>, chunk_text: &str) -> Option<String> {
    let body = collapse_whitespace(chunk_text);
    if body.is_empty() {
        return None;
    }

    match section.map(collapse_whitespace) {
        Some(section) if !section.is_empty() && !body.contains(&section) => {
            Some(format!("{section}\n\n{body}"))
        }
        _ => Some(body),
    }
}

pub fn embedding_text_hash(payload: &str) -> String {
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

/// Signed feature hashing over lower-cased words and adjacent word pairs,
/// L2-normalized. A payload without words maps to the zero vector.
pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(8);
    let mut vector = vec![0_f32; dims];

    for feature in payload_features(payload) {
        let digest = feature_digest(&feature);
        let slot = (digest % dims as u64) as usize;
        let magnitude = 1.0 + f32::from((digest >> 48) as u8) / 255.0;
        if digest >> 63 == 0 {
            vector[slot] += magnitude;
        } else {
            vector[slot] -= magnitude;
        }
    }

    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|value| *value /= norm);
    }
    vector
}

/// Dot product; both sides are unit vectors from [`embed_text_local`].
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.is_empty() || left.len() != right.len() {
        return 0.0;
    }

    left.iter()
        .zip(right)
        .map(|(left_value, right_value)| f64::from(left_value * right_value))
        .sum()
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || Some(blob.len()) != expected_dim.checked_mul(4) {
        return None;
    }

    blob.chunks_exact(4)
        .map(|bytes| bytes.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

// SHA-256 keeps vectors stable across toolchains, so stored embeddings stay
// comparable with freshly embedded queries.
fn feature_digest(feature: &str) -> u64 {
    let digest = Sha256::digest(feature.as_bytes());
    let mut head = [0_u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

fn payload_features(payload: &str) -> Vec<String> {
    let words = payload
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<String>>();

    words
        .iter()
        .map(|word| format!("w:{word}"))
        .chain(
            words
                .windows(2)
                .map(|pair| format!("b:{}_{}", pair[0], pair[1])),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_embeddings_are_deterministic_and_normalized() {
        let first = embed_text_local("Maternity expenses are not covered", DEFAULT_EMBEDDING_DIM);
        let second = embed_text_local("maternity expenses are NOT covered!", DEFAULT_EMBEDDING_DIM);
        assert_eq!(first, second);
        assert!((cosine_similarity(&first, &second) - 1.0).abs() < 1e-5);

        let unrelated = embed_text_local("room rent capped per day", DEFAULT_EMBEDDING_DIM);
        assert!(cosine_similarity(&first, &unrelated) < 0.5);
        assert!(embed_text_local("  ", 16).iter().all(|value| *value == 0.0));
    }

    #[test]
    fn embedding_blob_rejects_wrong_dimensions() {
        let vector = embed_text_local("cataract surgery", 16);
        let blob = encode_embedding_blob(&vector);
        assert_eq!(decode_embedding_blob(&blob, 16), Some(vector));
        assert_eq!(decode_embedding_blob(&blob, 8), None);
        assert_eq!(decode_embedding_blob(&blob[..63], 16), None);
        assert_eq!(decode_embedding_blob(&[], 0), None);
    }

    #[test]
    fn features_cover_words_and_adjacent_pairs() {
        assert_eq!(
            payload_features("Day-care, ICU!"),
            vec!["w:daycare", "w:icu", "b:daycare_icu"]
        );
        assert!(payload_features(" -- ").is_empty());
        assert_eq!(embed_text_local("icu", 2).len(), 8);
    }

    #[test]
    fn chunk_payload_adds_missing_section() {
        assert_eq!(
            chunk_payload_for_embedding(Some("SECTION 2"), "SECTION 2 Claims  are paid."),
            Some("SECTION 2 Claims are paid.".to_string())
        );
        assert_eq!(
            chunk_payload_for_embedding(Some("Annexure I"), "Cataract"),
            Some("Annexure I\n\nCataract".to_string())
        );
        assert_eq!(chunk_payload_for_embedding(None, "   "), None);
    }

    #[test]
    fn unknown_model_ids_keep_default_dimensions() {
        let model = resolve_model_config(" custom-model ");
        assert_eq!(model.model_id, "custom-model");
        assert_eq!(model.dimensions, DEFAULT_EMBEDDING_DIM);
        assert_eq!(resolve_model_config("").model_id, DEFAULT_MODEL_ID);
    }
}
