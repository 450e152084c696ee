//! Statistical and cache behavior of exemplar draws.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use exemplar::testing::{frequencies, weighted_rows};
use exemplar::{AxisRole, DataMatrix, DataMatrixConfig, ScalarType, StridedBuffer};
use ndarray::{Array2, Array3};

use AxisRole::*;

const DRAWS: u32 = 100_000;

fn weighted_matrix(weights: &[f32]) -> DataMatrix {
    let mut dm = DataMatrix::new();
    dm.configure(Arc::new(weighted_rows(weights)), &[Exemplar, Feature], Some(1))
        .unwrap();
    dm
}

// =============================================================================
// Distributions
// =============================================================================

#[test]
fn uniform_without_weight_slot() {
    let mut dm = DataMatrix::new();
    dm.configure(Arc::new(Array2::<f32>::zeros((10, 3))), &[Exemplar, Feature], None)
        .unwrap();

    let draws = dm.draw_many([0, 0, 7], DRAWS);
    assert_eq!(draws.len(), DRAWS as usize);
    // No table is needed for uniform draws.
    assert!(dm.cumulative_weights().is_none());

    for f in frequencies(&draws, 10) {
        assert_abs_diff_eq!(f, 0.1, epsilon = 0.005);
    }
}

#[test]
fn uniform_reaches_every_residue_of_huge_axes() {
    // 2^25 exemplars backed by a single byte through a zero stride.
    let exemplars = 1usize << 25;
    let buffer = StridedBuffer::new(vec![0u8], 0, vec![exemplars], vec![0], ScalarType::of::<u8>()).unwrap();
    let mut dm = DataMatrix::new();
    dm.configure(Arc::new(buffer), &[Exemplar], None).unwrap();
    assert_eq!(dm.exemplar_count(), exemplars);

    let draws = dm.draw_many([0, 0, 0], 10_000);
    assert!(draws.iter().all(|&i| i < exemplars));
    let odd = draws.iter().filter(|&&i| i % 2 == 1).count();
    assert_abs_diff_eq!(odd as f64 / draws.len() as f64, 0.5, epsilon = 0.05);
}

#[test]
fn proportional_to_weights() {
    let mut dm = weighted_matrix(&[1.0, 1.0, 1.0, 7.0]);
    assert_eq!(dm.feature_count(), 1);

    let draws = dm.draw_many([3, 1, 4], DRAWS);
    let freq = frequencies(&draws, 4);
    assert_abs_diff_eq!(freq[3], 0.7, epsilon = 0.01);
    for &f in &freq[..3] {
        assert_abs_diff_eq!(f, 0.1, epsilon = 0.01);
    }
}

#[test]
fn zero_weights_are_never_drawn() {
    let mut dm = weighted_matrix(&[0.0, 2.0, 0.0, 0.0, 2.0, -5.0, f32::NAN]);
    let draws = dm.draw_many([5, 5, 5], 20_000);
    let freq = frequencies(&draws, 7);

    assert_abs_diff_eq!(freq[1], 0.5, epsilon = 0.02);
    assert_abs_diff_eq!(freq[4], 0.5, epsilon = 0.02);
    for i in [2, 3, 5, 6] {
        assert_eq!(freq[i], 0.0, "index {i} has no weight");
    }
    assert_eq!(dm.cumulative_weights().unwrap(), &[0.0, 2.0, 2.0, 2.0, 4.0, 4.0, 4.0]);
}

#[test]
fn all_zero_weights_resolve_to_first_exemplar() {
    let mut dm = weighted_matrix(&[0.0, 0.0, 0.0]);
    assert_eq!(dm.total_weight(), 0.0);
    assert!(dm.draw_many([0, 1, 2], 100).iter().all(|&i| i == 0));
}

#[test]
fn paired_coordinate_as_weight() {
    // Weight of exemplar i is i itself, so P(i) = i / 6.
    let mut dm = DataMatrix::new();
    dm.configure(Arc::new(Array2::<f32>::ones((4, 2))), &[Paired, Feature], Some(0))
        .unwrap();
    assert_eq!(dm.feature_count(), 2);
    assert_eq!(dm.total_weight(), 6.0);

    let freq = frequencies(&dm.draw_many([8, 8, 8], DRAWS), 4);
    assert!(freq[0] < 0.001);
    assert_abs_diff_eq!(freq[1], 1.0 / 6.0, epsilon = 0.01);
    assert_abs_diff_eq!(freq[2], 2.0 / 6.0, epsilon = 0.01);
    assert_abs_diff_eq!(freq[3], 3.0 / 6.0, epsilon = 0.01);
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn same_key_same_index() {
    let mut dm = weighted_matrix(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0]);
    let first: Vec<_> = (0..200).map(|i| dm.draw([i, 0, 0, 0])).collect();
    let again: Vec<_> = (0..200).map(|i| dm.draw([i, 0, 0, 0])).collect();
    assert_eq!(first, again);
}

#[test]
fn seed_changes_the_stream() {
    let config = |seed: u64| {
        DataMatrixConfig::builder()
            .roles(vec![Exemplar, Feature])
            .seed(seed)
            .build()
            .unwrap()
    };
    let data = Arc::new(Array2::<f32>::zeros((1000, 1)));

    let mut a = DataMatrix::new();
    a.configure_with(data.clone(), &config(1)).unwrap();
    let mut b = DataMatrix::new();
    b.configure_with(data.clone(), &config(1)).unwrap();
    let mut c = DataMatrix::new();
    c.configure_with(data, &config(2)).unwrap();

    let draws = a.draw_many([0, 0, 0], 64);
    assert_eq!(draws, b.draw_many([0, 0, 0], 64));
    assert_ne!(draws, c.draw_many([0, 0, 0], 64));
}

#[test]
fn parallel_harvest_matches_sequential() {
    let weights: Vec<f32> = (0..5000).map(|i| ((i * 37) % 11) as f32).collect();
    let data = Arc::new(weighted_rows(&weights));

    let tables: Vec<Vec<f32>> = [1, 4]
        .into_iter()
        .map(|n_threads| {
            let config = DataMatrixConfig::builder()
                .roles(vec![Exemplar, Feature])
                .weight_index(1)
                .n_threads(n_threads)
                .build()
                .unwrap();
            let mut dm = DataMatrix::new();
            dm.configure_with(data.clone(), &config).unwrap();
            dm.total_weight();
            dm.cumulative_weights().unwrap().to_vec()
        })
        .collect();
    assert_eq!(tables[0], tables[1]);
}

// =============================================================================
// Cache Lifecycle
// =============================================================================

#[test]
fn set_scale_invalidates_cache() {
    let mut dm = weighted_matrix(&[1.0, 2.0, 3.0, 4.0]);
    assert!(dm.cumulative_weights().is_none());
    assert_eq!(dm.total_weight(), 10.0);
    assert!(dm.cumulative_weights().is_some());

    dm.set_scale(&[1.0], 2.0).unwrap();
    assert!(dm.cumulative_weights().is_none());
    assert_eq!(dm.total_weight(), 20.0);
    assert_eq!(dm.cumulative_weights().unwrap(), &[2.0, 6.0, 12.0, 20.0]);
}

#[test]
fn reconfigure_rebuilds_cache() {
    let mut dm = weighted_matrix(&[1.0, 1.0]);
    assert_eq!(dm.total_weight(), 2.0);

    dm.configure(Arc::new(weighted_rows(&[5.0, 0.0, 5.0])), &[Exemplar, Feature], Some(1))
        .unwrap();
    assert!(dm.cumulative_weights().is_none());
    assert_eq!(dm.total_weight(), 10.0);
    assert_eq!(dm.exemplar_count(), 3);
}

#[test]
fn weight_from_multi_axis_feature_block() {
    // Three feature positions per exemplar; position 2 holds the weight.
    let data = Array3::from_shape_fn((3, 1, 3), |(i, _, k)| if k == 2 { (i + 1) as f32 } else { 0.0 });
    let mut dm = DataMatrix::new();
    dm.configure(Arc::new(data), &[Exemplar, Feature, Feature], Some(2))
        .unwrap();
    assert_eq!(dm.feature_count(), 2);
    assert_eq!(dm.total_weight(), 6.0);
}
