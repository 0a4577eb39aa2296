//! Deterministic fallback embeddings.
//!
//! Each lowercase alphanumeric token is hashed into one of `dim` buckets
//! and counted; the result is normalised to unit length. Texts that share
//! words therefore land close together under cosine similarity, and all
//! components are non-negative so scores stay within [0, 1].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Split text into lowercase alphanumeric tokens.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Feature-hashed bag-of-words vector. Texts without tokens map to the zero vector.
pub fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
    let mut embedding = vec![0.0f32; dim];
    if dim == 0 {
        return embedding;
    }

    for token in tokenize(text) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = (hasher.finish() % dim as u64) as usize;
        embedding[bucket] += 1.0;
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut embedding {
            *x /= norm;
        }
    }

    embedding
}
