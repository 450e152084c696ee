//! Axis roles and the counts derived from them.
//!
//! Every axis of a host array is given one of three roles:
//!
//! - [`AxisRole::Exemplar`]: indexes distinct data instances
//! - [`AxisRole::Paired`]: indexes data instances *and* contributes its own
//!   index as one extra feature value
//! - [`AxisRole::Feature`]: indexes components of the feature vector
//!
//! Exemplars are enumerated in row-major order over the exemplar and paired
//! axes, so the linear exemplar index is a mixed-radix number whose digits are
//! the coordinates along those axes.
//!
//! Feature slots are laid out as `[paired values..., feature-axis values...]`.
//! One slot may be reserved as the sampling weight, in which case it is removed
//! from the output and the remaining slots close the gap.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DataMatrixError;

/// Semantic role of one array axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisRole {
    Exemplar,
    Paired,
    Feature,
}

impl AxisRole {
    /// `true` for roles that select the exemplar.
    #[inline]
    pub fn indexes_exemplars(self) -> bool {
        !matches!(self, AxisRole::Feature)
    }
}

/// Result of classifying the axes of one array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLayout {
    shape: Vec<usize>,
    roles: Vec<AxisRole>,
    exemplars: usize,
    features: usize,
    paired: usize,
    feature_axes: Vec<usize>,
    feature_positions: usize,
    weight_index: Option<usize>,
}

impl AxisLayout {
    /// Classify `shape` according to `roles`.
    ///
    /// A `weight_index` at or beyond the number of feature slots is dropped
    /// rather than reported: the layout then has no weight feature.
    pub fn classify(
        shape: &[usize],
        roles: &[AxisRole],
        weight_index: Option<usize>,
    ) -> Result<Self, DataMatrixError> {
        if shape.len() != roles.len() {
            return Err(DataMatrixError::RoleCountMismatch {
                expected: shape.len(),
                actual: roles.len(),
            });
        }

        let mut exemplars = 1usize;
        let mut paired = 0usize;
        let mut feature_positions = 1usize;
        let mut feature_axes = Vec::new();

        let overflow = |axis: usize| DataMatrixError::ShapeOverflow { axis };
        for (axis, (&size, &role)) in shape.iter().zip(roles).enumerate() {
            match role {
                AxisRole::Exemplar => {
                    exemplars = exemplars.checked_mul(size).ok_or_else(|| overflow(axis))?;
                }
                AxisRole::Paired => {
                    exemplars = exemplars.checked_mul(size).ok_or_else(|| overflow(axis))?;
                    paired += 1;
                }
                AxisRole::Feature => {
                    feature_positions = feature_positions.checked_mul(size).ok_or_else(|| overflow(axis))?;
                    feature_axes.push(axis);
                }
            }
        }

        let slots = feature_positions
            .checked_add(paired)
            .ok_or_else(|| overflow(shape.len()))?;
        let weight_index = match weight_index {
            Some(w) if w < slots => Some(w),
            Some(w) => {
                debug!(weight_index = w, slots, "weight index out of range, disabled");
                None
            }
            None => None,
        };
        let features = slots - usize::from(weight_index.is_some());

        Ok(Self {
            shape: shape.to_vec(),
            roles: roles.to_vec(),
            exemplars,
            features,
            paired,
            feature_axes,
            feature_positions,
            weight_index,
        })
    }

    /// Size of every axis.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Role of every axis.
    #[inline]
    pub fn roles(&self) -> &[AxisRole] {
        &self.roles
    }

    /// Number of exemplars: product of exemplar and paired axis sizes.
    #[inline]
    pub fn exemplars(&self) -> usize {
        self.exemplars
    }

    /// Length of an output feature vector.
    #[inline]
    pub fn features(&self) -> usize {
        self.features
    }

    /// Number of paired axes.
    #[inline]
    pub fn paired(&self) -> usize {
        self.paired
    }

    /// Indices of the feature axes, in axis order.
    #[inline]
    pub fn feature_axes(&self) -> &[usize] {
        &self.feature_axes
    }

    /// Number of values read from the feature axes per exemplar, including a
    /// weight read from them.
    #[inline]
    pub fn feature_positions(&self) -> usize {
        self.feature_positions
    }

    /// Slot reserved as the sampling weight, if any.
    #[inline]
    pub fn weight_index(&self) -> Option<usize> {
        self.weight_index
    }

    /// Position among the feature-axis values that holds the weight.
    #[inline]
    pub fn weight_position(&self) -> Option<usize> {
        self.weight_index.and_then(|w| w.checked_sub(self.paired))
    }

    /// `true` when the weight is taken from a paired axis.
    #[inline]
    pub fn weight_is_paired(&self) -> bool {
        matches!(self.weight_index, Some(w) if w < self.paired)
    }

    // =========================================================================
    // Mixed-radix indexing
    // =========================================================================

    /// Per-axis coordinates of exemplar `index`.
    ///
    /// Feature axes get coordinate zero.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.exemplars()`.
    pub fn exemplar_coords(&self, index: usize) -> Vec<usize> {
        assert!(
            index < self.exemplars,
            "exemplar index {} out of range for {} exemplars",
            index,
            self.exemplars
        );
        let mut coords = vec![0; self.shape.len()];
        let mut rest = index;
        for axis in (0..self.shape.len()).rev() {
            if self.roles[axis].indexes_exemplars() {
                let size = self.shape[axis];
                coords[axis] = rest % size;
                rest /= size;
            }
        }
        coords
    }

    /// Linear exemplar index of per-axis coordinates.
    ///
    /// Coordinates on feature axes are ignored.
    pub fn exemplar_index(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.shape.len());
        self.shape
            .iter()
            .zip(&self.roles)
            .zip(coords)
            .filter(|((_, role), _)| role.indexes_exemplars())
            .fold(0, |acc, ((&size, _), &c)| acc * size + c)
    }

    /// Per-feature-axis coordinates of feature position `position`.
    pub fn feature_coords(&self, position: usize) -> Vec<usize> {
        let mut coords = vec![0; self.feature_axes.len()];
        let mut rest = position;
        for (slot, &axis) in self.feature_axes.iter().enumerate().rev() {
            let size = self.shape[axis];
            coords[slot] = rest % size;
            rest /= size;
        }
        coords
    }
}
