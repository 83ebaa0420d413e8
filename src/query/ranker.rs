//! Cosine similarity ranking over the embedding store.
//!
//! Ranking is a pure function of the query vector and a snapshot of stored
//! embeddings. Records that cannot be compared (malformed vector, wrong
//! dimensionality, zero magnitude) are skipped and logged; they never abort the
//! ranking as a whole.

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::RankedRecipe;
use crate::storage::StoredEmbedding;

/// Errors from comparing two vectors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimilarityError {
    /// A vector with no components
    #[error("Vector is empty")]
    EmptyVector,

    /// The two vectors have different lengths
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector whose norm is zero, so the angle is undefined
    #[error("Vector has zero magnitude")]
    ZeroMagnitude,
}

/// Result type for similarity operations.
pub type SimilarityResult<T> = Result<T, SimilarityError>;

/// Compute cosine similarity between two vectors.
///
/// Accumulates in `f64` and clamps the result to `[-1, 1]`, so identical
/// vectors score exactly `1.0`.
///
/// # Errors
/// - `EmptyVector` if `a` or `b` has no components
/// - `DimensionMismatch` if the lengths differ (`expected` is `a.len()`)
/// - `ZeroMagnitude` if either norm is zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> SimilarityResult<f32> {
    if a.is_empty() || b.is_empty() {
        return Err(SimilarityError::EmptyVector);
    }
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::ZeroMagnitude);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32)
}

/// Rank stored embeddings against a query vector.
///
/// # Arguments
/// * `query` - The query embedding
/// * `candidates` - Every stored embedding, in store iteration order
/// * `top_n` - Maximum number of results
///
/// # Returns
/// At most `top_n` entries, sorted by descending score. The sort is stable, so
/// equal scores keep the order of `candidates`.
///
/// # Errors
/// Returns `EmptyVector` or `ZeroMagnitude` when the query itself is unusable.
/// Problems with individual candidates are logged and the candidate is skipped.
pub fn rank(query: &[f32], candidates: &[StoredEmbedding], top_n: usize) -> SimilarityResult<Vec<RankedRecipe>> {
    if query.is_empty() {
        return Err(SimilarityError::EmptyVector);
    }
    if query.iter().all(|&x| x == 0.0) {
        return Err(SimilarityError::ZeroMagnitude);
    }
    if top_n == 0 {
        return Ok(Vec::new());
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let vector = match &candidate.vector {
            Ok(vector) => vector,
            Err(e) => {
                warn!(recipe_id = candidate.recipe_id, stage = "rank", error = %e, "skipping unreadable embedding");
                continue;
            }
        };

        match cosine_similarity(query, vector) {
            Ok(score) if score.is_finite() => scored.push(RankedRecipe::new(candidate.recipe_id, score)),
            Ok(score) => {
                warn!(recipe_id = candidate.recipe_id, stage = "rank", score, "skipping non-finite score");
            }
            Err(e) => {
                warn!(recipe_id = candidate.recipe_id, stage = "rank", error = %e, "skipping embedding");
            }
        }
    }

    // sort_by is stable: ties keep store order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);

    debug!(candidates = candidates.len(), returned = scored.len(), "ranked embeddings");
    Ok(scored)
}
