//! Feature-vector extraction from a strided host array.
//!
//! # Algorithm
//!
//! For exemplar `index`:
//!
//! 1. Walk the axes last to first, peeling one mixed-radix digit off `index`
//!    at every exemplar or paired axis and advancing the base byte offset by
//!    `stride * digit`. A paired axis also emits its digit as a feature
//!    value, or folds it into the weight when its slot is the weight slot.
//! 2. Visit every position of the feature axes in row-major order, read the
//!    element through the resolved [`Converter`], and either store it scaled
//!    or fold it into the weight.
//!
//! Output slots never have holes: when the weight occupies slot `w`, every
//! later value moves down by one, and `mult[k]` scales output slot `k`.

use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::array::ExternalArray;
use crate::axes::{AxisLayout, AxisRole};
use crate::error::DataMatrixError;
use crate::scalar::Converter;
use crate::utils::Parallelism;

/// Reads scaled feature vectors and weights out of one configured array.
///
/// All methods take `&self` and write into caller buffers, so a single
/// extractor can serve several threads at once.
#[derive(Clone)]
pub struct FeatureExtractor {
    array: Arc<dyn ExternalArray>,
    layout: AxisLayout,
    strides: Vec<isize>,
    converter: Converter,
    mult: Vec<f32>,
    weight_scale: f32,
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("layout", &self.layout)
            .field("strides", &self.strides)
            .field("converter", &self.converter)
            .field("mult", &self.mult)
            .field("weight_scale", &self.weight_scale)
            .finish_non_exhaustive()
    }
}

impl FeatureExtractor {
    /// Bind `layout` to `array` with unit scales.
    pub fn new(array: Arc<dyn ExternalArray>, layout: AxisLayout, converter: Converter) -> Self {
        debug_assert_eq!(array.shape(), layout.shape());
        let strides = array.byte_strides();
        let mult = vec![1.0; layout.features()];
        Self {
            array,
            layout,
            strides,
            converter,
            mult,
            weight_scale: 1.0,
        }
    }

    #[inline]
    pub fn array(&self) -> &Arc<dyn ExternalArray> {
        &self.array
    }

    #[inline]
    pub fn layout(&self) -> &AxisLayout {
        &self.layout
    }

    #[inline]
    pub fn converter(&self) -> Converter {
        self.converter
    }

    #[inline]
    pub fn scale(&self) -> &[f32] {
        &self.mult
    }

    #[inline]
    pub fn weight_scale(&self) -> f32 {
        self.weight_scale
    }

    /// Replace the per-feature multipliers and the weight scale.
    pub fn set_scale(&mut self, mult: &[f32], weight_scale: f32) -> Result<(), DataMatrixError> {
        if mult.len() != self.mult.len() {
            return Err(DataMatrixError::ScaleLengthMismatch {
                expected: self.mult.len(),
                actual: mult.len(),
            });
        }
        self.mult.copy_from_slice(mult);
        self.weight_scale = weight_scale;
        Ok(())
    }

    /// Write the feature vector of exemplar `index` into `out` and return its
    /// weight.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the exemplar count or `out` is not
    /// exactly one feature vector long.
    pub fn extract_into(&self, index: usize, out: &mut [f32]) -> f32 {
        let layout = &self.layout;
        assert!(
            index < layout.exemplars(),
            "exemplar index {} out of range for {} exemplars",
            index,
            layout.exemplars()
        );
        assert_eq!(out.len(), layout.features(), "output buffer has wrong length");

        let shape = layout.shape();
        let roles = layout.roles();
        let weight_index = layout.weight_index();

        let mut weight = self.weight_scale;
        let mut offset = 0isize;
        let mut rest = index;
        let mut slot = layout.paired();

        for axis in (0..shape.len()).rev() {
            let role = roles[axis];
            if role == AxisRole::Feature {
                continue;
            }
            let size = shape[axis];
            let step = rest % size;
            rest /= size;
            offset += self.strides[axis] * step as isize;

            if role == AxisRole::Paired {
                slot -= 1;
                match weight_index {
                    Some(w) if w == slot => weight *= step as f32,
                    Some(w) if w < slot => out[slot - 1] = step as f32 * self.mult[slot - 1],
                    _ => out[slot] = step as f32 * self.mult[slot],
                }
            }
        }

        let weight_position = layout.weight_position();
        let feature_axes = layout.feature_axes();
        let mut next = layout.paired() - usize::from(layout.weight_is_paired());

        for position in 0..layout.feature_positions() {
            let mut element = offset;
            let mut rest = position;
            for &axis in feature_axes.iter().rev() {
                let size = shape[axis];
                element += self.strides[axis] * (rest % size) as isize;
                rest /= size;
            }

            // In range: every coordinate is below its axis size.
            let value = unsafe { self.converter.read(self.array.as_ptr().offset(element)) };

            if weight_position == Some(position) {
                weight *= value;
            } else {
                out[next] = value * self.mult[next];
                next += 1;
            }
        }

        weight
    }

    /// Weight of exemplar `index`, using `scratch` as the feature buffer.
    #[inline]
    pub fn weight_into(&self, index: usize, scratch: &mut [f32]) -> f32 {
        self.extract_into(index, scratch)
    }

    /// All feature vectors as a `[exemplars, features]` matrix.
    pub fn to_array(&self, parallelism: Parallelism) -> Array2<f32> {
        let exemplars = self.layout.exemplars();
        let features = self.layout.features();
        let mut data = vec![0.0f32; exemplars * features];
        if features > 0 {
            parallelism.maybe_par_chunks_mut(&mut data, features, |i, row| {
                self.extract_into(i, row);
            });
        }
        Array2::from_shape_vec((exemplars, features), data)
            .expect("buffer length equals exemplars * features")
    }

    /// All exemplar weights.
    pub fn weights(&self, parallelism: Parallelism) -> Array1<f32> {
        let features = self.layout.features();
        let mut weights = vec![0.0f32; self.layout.exemplars()];
        parallelism.maybe_par_fill_init(
            &mut weights,
            || vec![0.0f32; features],
            |scratch, i| self.weight_into(i, scratch),
        );
        Array1::from(weights)
    }
}
