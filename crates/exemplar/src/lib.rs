//! exemplar: strided numeric arrays as weighted feature-vector streams.
//!
//! Turns an externally owned N-dimensional array of any integer, boolean or
//! float element type into fixed-width `f32` feature vectors, one per
//! exemplar, each with a sampling weight. Intended as the data front end of
//! kernel density and mean-shift style learners.
//!
//! # Key Types
//!
//! - [`DataMatrix`] - configure once per array, then extract and draw
//! - [`AxisRole`] / [`AxisLayout`] - per-axis roles and the derived counts
//! - [`ExternalArray`] - what a host array must expose; implemented for
//!   `ndarray` arrays and [`StridedBuffer`]
//! - [`Converter`] - element reader resolved once per [`ScalarType`]
//! - [`CumulativeWeights`] / [`WeightedSampler`] - weighted draws
//! - [`Philox4x32`] - the counter-based generator behind every draw
//! - [`DataMatrixConfig`] - builder-style configuration
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use exemplar::{AxisRole, DataMatrix};
//! use ndarray::array;
//!
//! // Four exemplars; column 1 is a weight, not a feature.
//! let data = array![[0.5f32, 1.0], [1.5, 1.0], [2.5, 1.0], [3.5, 7.0]];
//!
//! let mut dm = DataMatrix::new();
//! dm.configure(Arc::new(data), &[AxisRole::Exemplar, AxisRole::Feature], Some(1))
//!     .unwrap();
//!
//! assert_eq!(dm.feature_count(), 1);
//! let (fv, weight) = dm.extract_weighted(3);
//! assert_eq!((fv, weight), (&[3.5f32][..], 7.0));
//!
//! let index = dm.draw([0, 0, 0, 42]).unwrap();
//! assert!(index < 4);
//! ```

pub mod array;
pub mod axes;
pub mod config;
pub mod error;
pub mod extract;
pub mod matrix;
pub mod rng;
pub mod sampling;
pub mod scalar;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use array::{ExternalArray, StridedBuffer};
pub use axes::{AxisLayout, AxisRole};
pub use config::DataMatrixConfig;
pub use error::{ArrayError, ConfigError, DataMatrixError};
pub use extract::FeatureExtractor;
pub use matrix::DataMatrix;
pub use rng::{Philox4x32, PhiloxStream};
pub use sampling::{biased_search, CumulativeWeights, WeightedSampler};
pub use scalar::{Converter, Element, ScalarKind, ScalarType};
pub use utils::Parallelism;
