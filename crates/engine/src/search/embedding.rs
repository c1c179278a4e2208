//! Bag-of-words embedding vectors and cosine scoring
//!
//! Values are embedded by hashing each token into one of
//! [`EMBEDDING_DIM`] buckets and counting occurrences. The hash is
//! `xxh3_64` with a fixed seed, so a vector computed here is identical
//! across runs, processes, and platforms.

use super::tokenizer::tokenize;
use capstan_core::EMBEDDING_DIM;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seed for the token hash. Changing it invalidates every stored vector,
/// so it is fixed for the lifetime of the format.
pub const EMBEDDING_HASH_SEED: u64 = 42;

/// A bag-of-words count vector.
pub type EmbeddingVector = [u32; EMBEDDING_DIM];

/// Compute the embedding vector of a text.
pub fn embed(text: &str) -> EmbeddingVector {
    let mut vector = [0u32; EMBEDDING_DIM];
    for token in tokenize(text) {
        let bucket = xxh3_64_with_seed(token.as_bytes(), EMBEDDING_HASH_SEED) as usize;
        vector[bucket % EMBEDDING_DIM] += 1;
    }
    vector
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector is all zeros.
pub fn cosine(a: &EmbeddingVector, b: &EmbeddingVector) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for i in 0..EMBEDDING_DIM {
        let (x, y) = (f64::from(a[i]), f64::from(b[i]));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
