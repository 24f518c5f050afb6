//! Cosine similarity with explicit checks for mismatched and degenerate vectors.

use thiserror::Error;

/// Scoring faults. Both indicate corrupted data rather than bad user input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimilarityError {
    /// Vectors of different lengths cannot be compared.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Length of the first vector.
        left: usize,
        /// Length of the second vector.
        right: usize,
    },
    /// Empty, zero-norm, or non-finite input.
    #[error("degenerate vector: {0}")]
    DegenerateVector(&'static str),
}

/// Compute `dot(a, b) / (|a| * |b|)`.
///
/// Accumulates in `f64`, so self-similarity of a non-zero vector is `1.0` within `f32`
/// precision and the result is symmetric in its arguments.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(SimilarityError::DegenerateVector("empty vector"));
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::DegenerateVector("zero norm"));
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !score.is_finite() {
        return Err(SimilarityError::DegenerateVector("non-finite components"));
    }

    Ok(score.clamp(-1.0, 1.0) as f32)
}
