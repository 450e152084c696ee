//! Data matrix configuration with builder pattern.
//!
//! [`DataMatrixConfig`] gathers everything [`DataMatrix::configure_with`]
//! needs beyond the array itself. It uses the `bon` crate for the builder and
//! validates in `build()`.
//!
//! # Example
//!
//! ```
//! use exemplar::{AxisRole, DataMatrixConfig};
//!
//! let config = DataMatrixConfig::builder()
//!     .roles(vec![AxisRole::Exemplar, AxisRole::Feature])
//!     .weight_index(2)
//!     .seed(17)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.weight_scale, 1.0);
//! ```
//!
//! [`DataMatrix::configure_with`]: crate::DataMatrix::configure_with

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::axes::AxisRole;
use crate::error::ConfigError;
use crate::utils::Parallelism;

/// Configuration of a [`DataMatrix`](crate::DataMatrix).
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct DataMatrixConfig {
    /// Role of every array axis, in axis order.
    pub roles: Vec<AxisRole>,

    /// Feature slot used as the sampling weight. Out-of-range values disable
    /// weighting.
    #[serde(default)]
    pub weight_index: Option<usize>,

    /// Initial per-feature multipliers. `None` means all ones.
    #[serde(default)]
    pub scale: Option<Vec<f32>>,

    /// Factor applied to every exemplar weight. Default: 1.0.
    #[builder(default = 1.0)]
    #[serde(default = "default_weight_scale")]
    pub weight_scale: f32,

    /// Philox key for draws. Default: 0.
    #[builder(default)]
    #[serde(default)]
    pub seed: u64,

    /// Reject scalar types without a converter instead of reading zeros.
    #[builder(default)]
    #[serde(default)]
    pub strict_types: bool,

    /// Threads for building the weight cache: 0 = auto, 1 = sequential.
    /// Default: 1.
    #[builder(default = 1)]
    #[serde(default = "default_n_threads")]
    pub n_threads: usize,
}

fn default_weight_scale() -> f32 {
    1.0
}

fn default_n_threads() -> usize {
    1
}

impl<S: data_matrix_config_builder::IsComplete> DataMatrixConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `weight_scale` is not finite
    /// - any `scale` entry is not finite
    pub fn build(self) -> Result<DataMatrixConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl DataMatrixConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.weight_scale.is_finite() {
            return Err(ConfigError::NonFiniteWeightScale(self.weight_scale));
        }
        if let Some(scale) = &self.scale {
            if let Some((index, &value)) = scale.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(ConfigError::NonFiniteScale { index, value });
            }
        }
        Ok(())
    }

    /// Parallelism for bulk weight harvesting.
    #[inline]
    pub fn parallelism(&self) -> Parallelism {
        Parallelism::from_threads(self.n_threads)
    }
}
