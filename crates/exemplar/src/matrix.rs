//! The [`DataMatrix`]: a configured array exposed as weighted feature vectors.
//!
//! # Lifecycle
//!
//! A `DataMatrix` starts empty. [`DataMatrix::configure`] binds an array,
//! classifies its axes and allocates the scale vector and output buffer; a
//! later call replaces all of that wholesale. [`DataMatrix::reset`] (or drop)
//! returns to the empty state and releases the array.
//!
//! # Threading
//!
//! `extract` and `draw` take `&mut self` because they reuse an internal
//! buffer and a lazily built cache, so a `DataMatrix` cannot be shared for
//! concurrent extraction. For parallel reads use [`DataMatrix::extractor`],
//! whose methods take `&self` and write into caller buffers.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use tracing::{debug, warn};

use crate::array::ExternalArray;
use crate::axes::{AxisLayout, AxisRole};
use crate::config::DataMatrixConfig;
use crate::error::DataMatrixError;
use crate::extract::FeatureExtractor;
use crate::rng::Philox4x32;
use crate::sampling::{CumulativeWeights, WeightedSampler};
use crate::scalar::{Converter, ScalarType};
use crate::utils::Parallelism;

/// State that exists only while an array is bound.
#[derive(Debug)]
struct Bound {
    extractor: FeatureExtractor,
    fv: Vec<f32>,
    sampler: WeightedSampler,
    parallelism: Parallelism,
}

/// Adapter from a host array to feature vectors with sampling weights.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use exemplar::{AxisRole, DataMatrix};
/// use ndarray::array;
///
/// let mut dm = DataMatrix::new();
/// dm.configure(
///     Arc::new(array![[1.0f32], [2.0]]),
///     &[AxisRole::Exemplar, AxisRole::Feature],
///     None,
/// )
/// .unwrap();
///
/// assert_eq!(dm.exemplar_count(), 2);
/// assert_eq!(dm.extract(1), &[2.0]);
/// ```
#[derive(Debug, Default)]
pub struct DataMatrix {
    bound: Option<Bound>,
}

impl DataMatrix {
    /// An empty, unconfigured matrix.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Bind `array` with one role per axis and an optional weight slot.
    ///
    /// All previous state, including the previous array, is released first.
    /// On error the matrix is left empty.
    pub fn configure(
        &mut self,
        array: Arc<dyn ExternalArray>,
        roles: &[AxisRole],
        weight_index: Option<usize>,
    ) -> Result<(), DataMatrixError> {
        let config = DataMatrixConfig {
            roles: roles.to_vec(),
            weight_index,
            scale: None,
            weight_scale: 1.0,
            seed: 0,
            strict_types: false,
            n_threads: 1,
        };
        self.configure_with(array, &config)
    }

    /// Bind `array` as described by `config`.
    ///
    /// All previous state, including the previous array, is released first.
    /// On error the matrix is left empty.
    pub fn configure_with(
        &mut self,
        array: Arc<dyn ExternalArray>,
        config: &DataMatrixConfig,
    ) -> Result<(), DataMatrixError> {
        self.bound = None;
        self.bound = Some(Self::bind(array, config)?);
        Ok(())
    }

    fn bind(array: Arc<dyn ExternalArray>, config: &DataMatrixConfig) -> Result<Bound, DataMatrixError> {
        config.validate()?;

        let layout = AxisLayout::classify(array.shape(), &config.roles, config.weight_index)?;

        let scalar = array.scalar_type();
        let converter = match Converter::resolve(scalar) {
            Some(converter) => converter,
            None if config.strict_types => return Err(DataMatrixError::UnsupportedScalar(scalar)),
            None => {
                warn!(%scalar, "no converter for scalar type, features will read as zero");
                Converter::zero(scalar)
            }
        };

        debug!(
            exemplars = layout.exemplars(),
            features = layout.features(),
            paired = layout.paired(),
            weight_index = ?layout.weight_index(),
            %scalar,
            "configured data matrix"
        );

        let fv = vec![0.0; layout.features()];
        let mut extractor = FeatureExtractor::new(array, layout, converter);
        match &config.scale {
            Some(scale) => extractor.set_scale(scale, config.weight_scale)?,
            None => {
                let ones = vec![1.0; extractor.layout().features()];
                extractor.set_scale(&ones, config.weight_scale)?;
            }
        }

        Ok(Bound {
            extractor,
            fv,
            sampler: WeightedSampler::new(Philox4x32::from_seed(config.seed)),
            parallelism: config.parallelism(),
        })
    }

    /// Release the array and all buffers.
    pub fn reset(&mut self) {
        self.bound = None;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.bound.is_some()
    }

    /// The bound array, if any.
    pub fn array(&self) -> Option<&Arc<dyn ExternalArray>> {
        self.bound.as_ref().map(|b| b.extractor.array())
    }

    /// Axis classification of the bound array.
    pub fn layout(&self) -> Option<&AxisLayout> {
        self.bound.as_ref().map(|b| b.extractor.layout())
    }

    /// The thread-safe extraction view of the bound array.
    pub fn extractor(&self) -> Option<&FeatureExtractor> {
        self.bound.as_ref().map(|b| &b.extractor)
    }

    /// Axis roles, empty when unconfigured.
    pub fn roles(&self) -> &[AxisRole] {
        self.layout().map_or(&[], |l| l.roles())
    }

    /// Number of exemplars; 0 when unconfigured.
    #[inline]
    pub fn exemplar_count(&self) -> usize {
        self.layout().map_or(0, |l| l.exemplars())
    }

    /// Length of a feature vector; 0 when unconfigured.
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.layout().map_or(0, |l| l.features())
    }

    /// Number of paired axes.
    #[inline]
    pub fn paired_count(&self) -> usize {
        self.layout().map_or(0, |l| l.paired())
    }

    /// The active weight slot, after range validation.
    #[inline]
    pub fn weight_index(&self) -> Option<usize> {
        self.layout().and_then(|l| l.weight_index())
    }

    /// Element type of the bound array.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        self.bound.as_ref().map(|b| b.extractor.converter().scalar())
    }

    /// Per-feature multipliers.
    pub fn scale(&self) -> &[f32] {
        self.bound.as_ref().map_or(&[], |b| b.extractor.scale())
    }

    /// Weight multiplier; 1.0 when unconfigured.
    pub fn weight_scale(&self) -> f32 {
        self.bound.as_ref().map_or(1.0, |b| b.extractor.weight_scale())
    }

    /// Coordinates of exemplar `index` along every axis.
    ///
    /// # Panics
    ///
    /// Panics if unconfigured or `index` is out of range.
    pub fn exemplar_coords(&self, index: usize) -> Vec<usize> {
        match self.layout() {
            Some(layout) => layout.exemplar_coords(index),
            None => panic!("data matrix is not configured"),
        }
    }

    // =========================================================================
    // Scaling
    // =========================================================================

    /// Replace the multipliers and weight scale, invalidating cached weights.
    pub fn set_scale(&mut self, mult: &[f32], weight_scale: f32) -> Result<(), DataMatrixError> {
        let bound = self.bound.as_mut().ok_or(DataMatrixError::NotConfigured)?;
        bound.extractor.set_scale(mult, weight_scale)?;
        bound.sampler.invalidate();
        Ok(())
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Feature vector of exemplar `index`.
    ///
    /// The returned slice is the matrix's reused buffer and is overwritten by
    /// the next extraction.
    ///
    /// # Panics
    ///
    /// Panics if unconfigured or `index >= exemplar_count()`.
    pub fn extract(&mut self, index: usize) -> &[f32] {
        self.extract_weighted(index).0
    }

    /// Feature vector and weight of exemplar `index`.
    ///
    /// # Panics
    ///
    /// Panics if unconfigured or `index >= exemplar_count()`.
    pub fn extract_weighted(&mut self, index: usize) -> (&[f32], f32) {
        let Some(bound) = self.bound.as_mut() else {
            panic!("data matrix is not configured");
        };
        let weight = bound.extractor.extract_into(index, &mut bound.fv);
        (&bound.fv, weight)
    }

    /// Write the feature vector of exemplar `index` into `out` and return its
    /// weight. Does not touch the internal buffer.
    ///
    /// # Panics
    ///
    /// Panics if unconfigured, `index >= exemplar_count()`, or
    /// `out.len() != feature_count()`.
    pub fn extract_into(&self, index: usize, out: &mut [f32]) -> f32 {
        match &self.bound {
            Some(bound) => bound.extractor.extract_into(index, out),
            None => panic!("data matrix is not configured"),
        }
    }

    /// All feature vectors as `[exemplars, features]`.
    pub fn to_array(&self, parallelism: Parallelism) -> Array2<f32> {
        match &self.bound {
            Some(bound) => bound.extractor.to_array(parallelism),
            None => Array2::zeros((0, 0)),
        }
    }

    /// All exemplar weights.
    pub fn weights(&self, parallelism: Parallelism) -> Array1<f32> {
        match &self.bound {
            Some(bound) => bound.extractor.weights(parallelism),
            None => Array1::zeros(0),
        }
    }

    // =========================================================================
    // Sampling
    // =========================================================================

    /// Draw an exemplar index for the 4-word draw key.
    ///
    /// The same key always yields the same index for the same configuration.
    /// Returns `None` when there are no exemplars.
    pub fn draw(&mut self, key: [u32; 4]) -> Option<usize> {
        let Bound {
            extractor,
            sampler,
            parallelism,
            ..
        } = self.bound.as_mut()?;

        if extractor.layout().weight_index().is_none() {
            return sampler.draw_uniform(key, extractor.layout().exemplars());
        }
        sampler.draw_weighted(key, || harvest(extractor, *parallelism))
    }

    /// `count` draws with keys `[stream[0], stream[1], stream[2], i]`.
    pub fn draw_many(&mut self, stream: [u32; 3], count: u32) -> Vec<usize> {
        (0..count)
            .map_while(|i| self.draw([stream[0], stream[1], stream[2], i]))
            .collect()
    }

    /// The cumulative weight table, if it has been built.
    pub fn cumulative_weights(&self) -> Option<&[f32]> {
        self.bound
            .as_ref()
            .and_then(|b| b.sampler.cumulative())
            .map(CumulativeWeights::as_slice)
    }

    /// Sum of all exemplar weights, building the cumulative table if needed.
    pub fn total_weight(&mut self) -> f32 {
        let Some(Bound {
            extractor,
            sampler,
            parallelism,
            ..
        }) = self.bound.as_mut()
        else {
            return 0.0;
        };
        sampler
            .cumulative_or_build(|| harvest(extractor, *parallelism))
            .total()
    }
}

fn harvest(extractor: &FeatureExtractor, parallelism: Parallelism) -> CumulativeWeights {
    let weights = extractor.weights(parallelism);
    if weights.iter().all(|&w| w <= 0.0) {
        debug!(exemplars = weights.len(), "all exemplar weights are zero");
    }
    CumulativeWeights::from_weights(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarKind;
    use crate::StridedBuffer;
    use ndarray::array;
    use AxisRole::*;

    #[test]
    fn empty_matrix() {
        let mut dm = DataMatrix::new();
        assert!(!dm.is_configured());
        assert_eq!(dm.exemplar_count(), 0);
        assert_eq!(dm.feature_count(), 0);
        assert_eq!(dm.draw([0; 4]), None);
        assert_eq!(dm.total_weight(), 0.0);
        assert_eq!(dm.set_scale(&[], 1.0), Err(DataMatrixError::NotConfigured));
        assert!(dm.roles().is_empty());
    }

    #[test]
    fn two_exemplars_one_feature() {
        let mut dm = DataMatrix::new();
        dm.configure(Arc::new(array![[1.0f32], [2.0]]), &[Exemplar, Feature], None)
            .unwrap();
        assert_eq!(dm.extract_weighted(0), (&[1.0f32][..], 1.0));
        assert_eq!(dm.extract_weighted(1), (&[2.0f32][..], 1.0));

        let mut out = [0.0f32];
        assert_eq!(dm.extract_into(1, &mut out), 1.0);
        assert_eq!(out, [2.0]);
    }

    #[test]
    fn failed_configure_leaves_empty() {
        let mut dm = DataMatrix::new();
        dm.configure(Arc::new(array![[1.0f32]]), &[Exemplar, Feature], None)
            .unwrap();
        let err = dm
            .configure(Arc::new(array![[1.0f32]]), &[Exemplar], None)
            .unwrap_err();
        assert!(matches!(err, DataMatrixError::RoleCountMismatch { .. }));
        assert!(!dm.is_configured());
    }

    #[test]
    fn zero_dimensional_array() {
        let mut dm = DataMatrix::new();
        dm.configure(Arc::new(ndarray::arr0(3.5f32)), &[], None).unwrap();
        assert_eq!(dm.exemplar_count(), 1);
        assert_eq!(dm.feature_count(), 1);
        assert_eq!(dm.extract_weighted(0), (&[3.5f32][..], 1.0));
        assert_eq!(dm.draw([0; 4]), Some(0));

        // The scalar itself as the weight leaves an empty feature vector.
        dm.configure(Arc::new(ndarray::arr0(2u8)), &[], Some(0)).unwrap();
        assert_eq!(dm.extract_weighted(0), (&[][..], 2.0));
        assert_eq!(dm.total_weight(), 2.0);
    }

    #[test]
    fn overflowing_host_shape_is_rejected() {
        // Nothing is reachable through the empty axis, so the buffer accepts
        // any size on the others.
        let buffer = StridedBuffer::new(
            vec![0],
            0,
            vec![0, usize::MAX / 2, 3],
            vec![0, 0, 0],
            ScalarType::of::<u8>(),
        )
        .unwrap();
        let mut dm = DataMatrix::new();
        let err = dm
            .configure(Arc::new(buffer), &[Exemplar, Feature, Feature], None)
            .unwrap_err();
        assert_eq!(err, DataMatrixError::ShapeOverflow { axis: 2 });
        assert!(!dm.is_configured());
    }

    #[test]
    fn releases_array_claim() {
        let array: Arc<dyn ExternalArray> = Arc::new(array![[1.0f32, 2.0]]);
        let mut dm = DataMatrix::new();
        dm.configure(Arc::clone(&array), &[Exemplar, Feature], None).unwrap();
        assert_eq!(Arc::strong_count(&array), 2);

        // Reconfiguring with the same array keeps exactly one claim.
        dm.configure(Arc::clone(&array), &[Feature, Exemplar], None).unwrap();
        assert_eq!(Arc::strong_count(&array), 2);

        dm.reset();
        assert_eq!(Arc::strong_count(&array), 1);

        dm.configure(Arc::clone(&array), &[Exemplar, Feature], None).unwrap();
        drop(dm);
        assert_eq!(Arc::strong_count(&array), 1);
    }

    #[test]
    fn unsupported_scalar_policy() {
        let scalar = ScalarType::new(ScalarKind::Int, 3);
        let buffer = StridedBuffer::contiguous(vec![1, 0, 0, 2, 0, 0], vec![2], scalar).unwrap();
        let array: Arc<dyn ExternalArray> = Arc::new(buffer);

        let mut dm = DataMatrix::new();
        dm.configure(Arc::clone(&array), &[Exemplar], None).unwrap();
        assert_eq!(dm.extract(1), &[0.0]);

        let config = DataMatrixConfig::builder()
            .roles(vec![Exemplar])
            .strict_types(true)
            .build()
            .unwrap();
        let err = dm.configure_with(array, &config).unwrap_err();
        assert_eq!(err, DataMatrixError::UnsupportedScalar(scalar));
        assert!(!dm.is_configured());
    }

    #[test]
    fn config_scale_is_applied() {
        let config = DataMatrixConfig::builder()
            .roles(vec![Exemplar, Feature])
            .scale(vec![10.0, 100.0])
            .weight_scale(0.5)
            .build()
            .unwrap();
        let mut dm = DataMatrix::new();
        dm.configure_with(Arc::new(array![[1i16, 2]]), &config).unwrap();
        assert_eq!(dm.extract_weighted(0), (&[10.0f32, 200.0][..], 0.5));

        let bad = DataMatrixConfig::builder()
            .roles(vec![Exemplar, Feature])
            .scale(vec![1.0])
            .build()
            .unwrap();
        assert_eq!(
            dm.configure_with(Arc::new(array![[1i16, 2]]), &bad).unwrap_err(),
            DataMatrixError::ScaleLengthMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn draw_is_reproducible() {
        let mut dm = DataMatrix::new();
        dm.configure(Arc::new(ndarray::Array2::<f32>::zeros((50, 2))), &[Exemplar, Feature], None)
            .unwrap();
        let a = dm.draw_many([1, 2, 3], 20);
        let b = dm.draw_many([1, 2, 3], 20);
        assert_eq!(a.len(), 20);
        assert_eq!(a, b);
        assert_ne!(a, dm.draw_many([9, 9, 9], 20));
    }
}
