//! Error types.

use crate::scalar::ScalarType;

/// Errors raised while describing a strided byte buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrayError {
    #[error("shape has {shape} axes but strides has {strides}")]
    ShapeStrideMismatch { shape: usize, strides: usize },
    #[error("element at byte range [{start}, {end}) lies outside a buffer of {len} bytes")]
    OutOfBounds { start: isize, end: isize, len: usize },
    #[error("byte offsets overflow along axis {axis}")]
    Overflow { axis: usize },
    #[error("buffer of {len} bytes is not a whole number of {width}-byte elements")]
    RaggedBuffer { len: usize, width: usize },
    #[error("scalar width must be non-zero")]
    ZeroWidth,
}

/// Errors raised by [`DataMatrixConfig`](crate::DataMatrixConfig) validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("weight_scale must be finite, got {0}")]
    NonFiniteWeightScale(f32),
    #[error("scale[{index}] must be finite, got {value}")]
    NonFiniteScale { index: usize, value: f32 },
}

/// Errors raised by [`DataMatrix`](crate::DataMatrix) configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataMatrixError {
    #[error("array has {expected} axes but {actual} roles were given")]
    RoleCountMismatch { expected: usize, actual: usize },
    #[error("scale vector has {actual} entries, expected {expected}")]
    ScaleLengthMismatch { expected: usize, actual: usize },
    #[error("no float conversion for scalar type {0}")]
    UnsupportedScalar(ScalarType),
    #[error("product of axis sizes overflows at axis {axis}")]
    ShapeOverflow { axis: usize },
    #[error("data matrix is not configured")]
    NotConfigured,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
