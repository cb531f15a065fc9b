//! Numeric kernel shared by the retrieval and dedup paths.

/// Cosine similarity between two vectors, clamped to [-1, 1].
///
/// Mismatched or empty vectors score 0.0 rather than erroring; callers
/// treat that as "no similarity".
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Map a raw cosine similarity in [-1, 1] onto [0, 1].
pub fn cosine_to_unit(cos: f32) -> f32 {
    ((1.0 + cos) / 2.0).clamp(0.0, 1.0)
}

/// Min-max normalize a score vector to [0, 1].
///
/// A degenerate vector (all values equal) maps to all zeros, except the
/// single-element case which maps to 1 if positive, else 0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    if scores.len() == 1 {
        return vec![if scores[0] > 0.0 { 1.0 } else { 0.0 }];
    }

    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if range <= f32::EPSILON {
        return vec![0.0; scores.len()];
    }

    scores.iter().map(|s| (s - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![0.3, -0.2, 0.9];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_or_empty_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_to_unit_bounds() {
        assert_eq!(cosine_to_unit(1.0), 1.0);
        assert_eq!(cosine_to_unit(-1.0), 0.0);
        assert!((cosine_to_unit(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn min_max_rescales_to_unit_interval() {
        let normalized = min_max_normalize(&[2.0, 4.0, 6.0]);
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn min_max_degenerate_vector_is_zeros() {
        assert_eq!(min_max_normalize(&[3.0, 3.0, 3.0]), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn min_max_single_element() {
        assert_eq!(min_max_normalize(&[0.7]), vec![1.0]);
        assert_eq!(min_max_normalize(&[0.0]), vec![0.0]);
        assert_eq!(min_max_normalize(&[-0.5]), vec![0.0]);
    }

    #[test]
    fn min_max_empty() {
        assert!(min_max_normalize(&[]).is_empty());
    }
}
