//! Host array abstraction.
//!
//! The data matrix never owns element storage. It reads through an
//! [`ExternalArray`], which describes an N-dimensional strided block of
//! fixed-width scalars, and keeps it alive through an `Arc`.
//!
//! Two implementations are provided:
//!
//! - every `ndarray` owned array ([`Array`](ndarray::Array),
//!   [`ArcArray`](ndarray::ArcArray)) whose element is an [`Element`]
//! - [`StridedBuffer`], a raw byte buffer with explicit byte strides and a
//!   runtime [`ScalarType`], for element types Rust has no native type for
//!   and for memory copied out of a foreign host

use ndarray::{ArrayBase, Data, Dimension};

use crate::error::ArrayError;
use crate::scalar::{Element, ScalarType};

// =============================================================================
// ExternalArray Trait
// =============================================================================

/// A strided N-dimensional block of scalars owned by someone else.
///
/// # Safety
///
/// Implementors guarantee that for every coordinate `c` with
/// `c[k] < shape()[k]` on all axes, the address
/// `as_ptr() + sum(c[k] * byte_stride(k))` points to `scalar_type().width`
/// readable bytes, and that this memory stays valid and unmodified for as long
/// as the implementor is alive.
pub unsafe trait ExternalArray: Send + Sync {
    /// Size of every axis.
    fn shape(&self) -> &[usize];

    /// Byte distance between consecutive indices along `axis`.
    fn byte_stride(&self, axis: usize) -> isize;

    /// Address of the element at coordinate zero.
    fn as_ptr(&self) -> *const u8;

    /// Runtime descriptor of the element type.
    fn scalar_type(&self) -> ScalarType;

    /// Number of axes.
    #[inline]
    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Byte strides of all axes.
    fn byte_strides(&self) -> Vec<isize> {
        (0..self.ndim()).map(|axis| self.byte_stride(axis)).collect()
    }
}

// ndarray owns its storage and bounds every in-range index by construction.
unsafe impl<S, T, D> ExternalArray for ArrayBase<S, D>
where
    S: Data<Elem = T> + Send + Sync,
    T: Element,
    D: Dimension,
{
    #[inline]
    fn shape(&self) -> &[usize] {
        ArrayBase::shape(self)
    }

    #[inline]
    fn byte_stride(&self, axis: usize) -> isize {
        self.strides()[axis] * std::mem::size_of::<T>() as isize
    }

    #[inline]
    fn as_ptr(&self) -> *const u8 {
        ArrayBase::as_ptr(self).cast()
    }

    #[inline]
    fn scalar_type(&self) -> ScalarType {
        T::SCALAR
    }
}

// =============================================================================
// StridedBuffer
// =============================================================================

/// An owned byte buffer interpreted as a strided array.
///
/// Construction checks that every reachable element lies inside the buffer,
/// which is what makes the [`ExternalArray`] implementation sound.
///
/// # Example
///
/// ```
/// use exemplar::{ExternalArray, ScalarType, StridedBuffer};
///
/// // Two rows of three u16 values, read column-major via byte strides.
/// let values: [u16; 6] = [1, 2, 3, 4, 5, 6];
/// let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
/// let buf = StridedBuffer::new(bytes, 0, vec![3, 2], vec![2, 6], ScalarType::of::<u16>()).unwrap();
///
/// assert_eq!(buf.shape(), &[3, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct StridedBuffer {
    data: Vec<u8>,
    offset: usize,
    shape: Vec<usize>,
    strides: Vec<isize>,
    scalar: ScalarType,
}

impl StridedBuffer {
    /// Wrap `data` with explicit geometry.
    ///
    /// `offset` is the byte position of the element at coordinate zero;
    /// negative strides walk backwards from there.
    pub fn new(
        data: Vec<u8>,
        offset: usize,
        shape: Vec<usize>,
        strides: Vec<isize>,
        scalar: ScalarType,
    ) -> Result<Self, ArrayError> {
        if shape.len() != strides.len() {
            return Err(ArrayError::ShapeStrideMismatch {
                shape: shape.len(),
                strides: strides.len(),
            });
        }
        if scalar.width == 0 {
            return Err(ArrayError::ZeroWidth);
        }

        // Nothing is reachable through an empty axis.
        if shape.iter().all(|&s| s > 0) {
            let (start, end) = reachable_span(offset, &shape, &strides, scalar.width)?;
            if start < 0 || end > data.len() as isize {
                return Err(ArrayError::OutOfBounds {
                    start,
                    end,
                    len: data.len(),
                });
            }
        }

        Ok(Self {
            data,
            offset,
            shape,
            strides,
            scalar,
        })
    }

    /// Wrap `data` as a C-order (row-major) array.
    pub fn contiguous(data: Vec<u8>, shape: Vec<usize>, scalar: ScalarType) -> Result<Self, ArrayError> {
        if scalar.width == 0 {
            return Err(ArrayError::ZeroWidth);
        }
        if data.len() % scalar.width != 0 {
            return Err(ArrayError::RaggedBuffer {
                len: data.len(),
                width: scalar.width,
            });
        }
        let strides = c_order_strides(&shape, scalar.width);
        Self::new(data, 0, shape, strides, scalar)
    }

    /// Copy typed values into a C-order buffer.
    pub fn from_elements<T: Element>(values: &[T], shape: Vec<usize>) -> Result<Self, ArrayError> {
        let len = std::mem::size_of_val(values);
        // Element types are plain scalars without padding.
        let bytes = unsafe { std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), len) };
        Self::contiguous(bytes.to_vec(), shape, T::SCALAR)
    }

    /// The underlying bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Byte strides of every axis.
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }
}

unsafe impl ExternalArray for StridedBuffer {
    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    fn byte_stride(&self, axis: usize) -> isize {
        self.strides[axis]
    }

    #[inline]
    fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr().wrapping_add(self.offset)
    }

    #[inline]
    fn scalar_type(&self) -> ScalarType {
        self.scalar
    }
}

/// Byte strides of a C-order array with the given element width.
pub fn c_order_strides(shape: &[usize], width: usize) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut step = width as isize;
    for (axis, &size) in shape.iter().enumerate().rev() {
        strides[axis] = step;
        step *= size.max(1) as isize;
    }
    strides
}

/// Half-open byte range touched by all elements of a non-empty array.
fn reachable_span(
    offset: usize,
    shape: &[usize],
    strides: &[isize],
    width: usize,
) -> Result<(isize, isize), ArrayError> {
    let mut low = offset as isize;
    let mut high = offset as isize;
    for (axis, (&size, &stride)) in shape.iter().zip(strides).enumerate() {
        let reach = stride
            .checked_mul(size as isize - 1)
            .ok_or(ArrayError::Overflow { axis })?;
        if reach < 0 {
            low = low.checked_add(reach).ok_or(ArrayError::Overflow { axis })?;
        } else {
            high = high.checked_add(reach).ok_or(ArrayError::Overflow { axis })?;
        }
    }
    let end = high
        .checked_add(width as isize)
        .ok_or(ArrayError::Overflow { axis: shape.len() })?;
    Ok((low, end))
}
