//! Fixtures shared by tests and benchmarks.

use ndarray::{Array2, ArrayD, IxDyn};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Random `f32` array of the given shape, uniform in `[min, max)`.
pub fn random_array(shape: &[usize], seed: u64, min: f32, max: f32) -> ArrayD<f32> {
    assert!(max >= min);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let width = max - min;
    ArrayD::from_shape_simple_fn(IxDyn(shape), || min + rng.gen::<f32>() * width)
}

/// `[n, 2]` matrix with the row index in column 0 and `weights` in column 1.
///
/// Configure with roles `[Exemplar, Feature]` and weight index 1 to sample
/// rows proportionally to `weights`.
pub fn weighted_rows(weights: &[f32]) -> Array2<f32> {
    Array2::from_shape_fn((weights.len(), 2), |(i, j)| if j == 0 { i as f32 } else { weights[i] })
}

/// Empirical frequency of every index in `0..n`.
pub fn frequencies(draws: &[usize], n: usize) -> Vec<f64> {
    let mut counts = vec![0usize; n];
    for &d in draws {
        counts[d] += 1;
    }
    let total = draws.len().max(1) as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_array_is_seeded() {
        let a = random_array(&[3, 4], 1, -1.0, 1.0);
        let b = random_array(&[3, 4], 1, -1.0, 1.0);
        assert_eq!(a, b);
        assert_eq!(a.shape(), &[3, 4]);
        assert!(a.iter().all(|&v| (-1.0..1.0).contains(&v)));
    }

    #[test]
    fn weighted_rows_layout() {
        let rows = weighted_rows(&[2.0, 5.0]);
        assert_eq!(rows, ndarray::array![[0.0, 2.0], [1.0, 5.0]]);
    }

    #[test]
    fn frequencies_sum_to_one() {
        let f = frequencies(&[0, 1, 1, 3], 4);
        assert_eq!(f, vec![0.25, 0.5, 0.0, 0.25]);
    }
}
