//! Flat (exact) nearest-neighbour search over squared Euclidean distance.

/// Squared L2 distance. Vectors of different lengths compare on the shared
/// prefix; callers reject mismatched dimensions before searching.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// The `k` nearest vectors to `query`, as `(index, distance)` pairs in
/// ascending distance. Ties keep insertion order.
pub fn nearest(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, l2_squared(v, query)))
        .collect();

    // Stable sort: equal distances stay in index order
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_of_identical_is_zero() {
        assert_eq!(l2_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn l2_is_squared() {
        assert!((l2_squared(&[0.0, 0.0], &[3.0, 4.0]) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn nearest_orders_by_distance() {
        let vectors = vec![vec![5.0], vec![1.0], vec![3.0]];
        let hits = nearest(&vectors, &[0.0], 3);
        let order: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn nearest_breaks_ties_by_insertion() {
        let vectors = vec![vec![1.0], vec![-1.0], vec![1.0], vec![0.0]];
        let hits = nearest(&vectors, &[0.0], 4);
        let order: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![3, 0, 1, 2]);
    }

    #[test]
    fn nearest_truncates_to_k() {
        let vectors = vec![vec![1.0], vec![2.0], vec![3.0]];
        assert_eq!(nearest(&vectors, &[0.0], 2).len(), 2);
        assert_eq!(nearest(&vectors, &[0.0], 10).len(), 3);
        assert!(nearest(&[], &[0.0], 3).is_empty());
    }
}
