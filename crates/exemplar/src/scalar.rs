//! Scalar type descriptors and type-erased float conversion.
//!
//! Host arrays arrive with a runtime scalar descriptor (kind + byte width).
//! [`Converter::resolve`] maps that descriptor to a reader function once per
//! configuration, so the per-element cost in the extraction loop is a single
//! indirect call with no branching on the element type.
//!
//! # Supported Types
//!
//! | Kind    | Widths (bytes)                            |
//! |---------|-------------------------------------------|
//! | `Bool`  | 1                                         |
//! | `Int`   | 1, 2, 4, 8                                |
//! | `UInt`  | 1, 2, 4, 8                                |
//! | `Float` | 4, 8, and the platform `long double` size |
//!
//! Anything else resolves to nothing; callers decide whether that is an
//! error or falls back to [`Converter::zero`].

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Scalar Descriptors
// =============================================================================

/// Coarse classification of an element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
}

/// Runtime descriptor of an element type: kind plus storage width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarType {
    pub kind: ScalarKind,
    pub width: usize,
}

impl ScalarType {
    pub const fn new(kind: ScalarKind, width: usize) -> Self {
        Self { kind, width }
    }

    /// Descriptor of a Rust element type.
    #[inline]
    pub const fn of<T: Element>() -> Self {
        T::SCALAR
    }

    /// Descriptor of the platform C `long double`, if it is wider than `f64`.
    pub const fn long_double() -> Option<Self> {
        match LONG_DOUBLE {
            Some((width, _)) => Some(Self::new(ScalarKind::Float, width)),
            None => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = self.width * 8;
        match self.kind {
            ScalarKind::Bool => write!(f, "bool{}", bits),
            ScalarKind::Int => write!(f, "int{}", bits),
            ScalarKind::UInt => write!(f, "uint{}", bits),
            ScalarKind::Float => write!(f, "float{}", bits),
        }
    }
}

// =============================================================================
// Element Trait
// =============================================================================

/// Rust types that can back an [`ExternalArray`](crate::ExternalArray).
pub trait Element: Copy + Send + Sync + 'static {
    const SCALAR: ScalarType;
}

macro_rules! impl_element {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const SCALAR: ScalarType =
                    ScalarType::new(ScalarKind::$kind, std::mem::size_of::<$ty>());
            }
        )*
    };
}

impl_element! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f32 => Float,
    f64 => Float,
}

// =============================================================================
// Extended Precision
// =============================================================================

/// Storage format of the platform `long double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LongDoubleFormat {
    /// x87 80-bit extended precision, padded to 12 or 16 bytes.
    X87Extended,
    /// IEEE 754 binary128.
    Binary128,
}

#[cfg(all(target_arch = "x86_64", not(windows)))]
const LONG_DOUBLE: Option<(usize, LongDoubleFormat)> = Some((16, LongDoubleFormat::X87Extended));

#[cfg(all(target_arch = "x86", not(windows)))]
const LONG_DOUBLE: Option<(usize, LongDoubleFormat)> = Some((12, LongDoubleFormat::X87Extended));

#[cfg(all(
    any(target_arch = "aarch64", target_arch = "riscv64", target_arch = "s390x"),
    target_os = "linux"
))]
const LONG_DOUBLE: Option<(usize, LongDoubleFormat)> = Some((16, LongDoubleFormat::Binary128));

#[cfg(not(any(
    all(any(target_arch = "x86_64", target_arch = "x86"), not(windows)),
    all(
        any(target_arch = "aarch64", target_arch = "riscv64", target_arch = "s390x"),
        target_os = "linux"
    )
)))]
const LONG_DOUBLE: Option<(usize, LongDoubleFormat)> = None;

/// Decode an x87 80-bit extended value (little-endian, 10 significant bytes).
pub fn x87_extended_to_f64(bytes: [u8; 10]) -> f64 {
    let mut mant_bytes = [0u8; 8];
    mant_bytes.copy_from_slice(&bytes[..8]);
    let mantissa = u64::from_le_bytes(mant_bytes);
    let sign_exp = u16::from_le_bytes([bytes[8], bytes[9]]);

    let negative = sign_exp & 0x8000 != 0;
    let exponent = i32::from(sign_exp & 0x7FFF);

    let magnitude = if exponent == 0x7FFF {
        // Explicit integer bit is ignored for infinities and NaNs.
        if mantissa << 1 == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        // Subnormals share the exponent of the smallest normal.
        let unbiased = if exponent == 0 { -16382 } else { exponent - 16383 };
        let significand = mantissa as f64 * 2f64.powi(-63);
        scale_by_power_of_two(significand, unbiased)
    };

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode an IEEE binary128 value given as its high and low 64-bit halves.
pub fn binary128_to_f64(high: u64, low: u64) -> f64 {
    let negative = high >> 63 != 0;
    let exponent = ((high >> 48) & 0x7FFF) as i32;
    let top = high & 0x0000_FFFF_FFFF_FFFF;

    let magnitude = if exponent == 0x7FFF {
        if top == 0 && low == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        let fraction = top as f64 * 2f64.powi(-48) + low as f64 * 2f64.powi(-112);
        if exponent == 0 {
            scale_by_power_of_two(fraction, -16382)
        } else {
            scale_by_power_of_two(1.0 + fraction, exponent - 16383)
        }
    };

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// `value * 2^exp` without overflowing the intermediate power.
#[inline]
fn scale_by_power_of_two(value: f64, exp: i32) -> f64 {
    if value == 0.0 {
        return 0.0;
    }
    // Anything outside this window is already 0 or inf once narrowed to f32.
    let exp = exp.clamp(-1100, 1100);
    let half = exp / 2;
    value * 2f64.powi(half) * 2f64.powi(exp - half)
}

// =============================================================================
// Readers
// =============================================================================

/// Reads one element at `ptr` and returns it as `f32`.
///
/// # Safety
///
/// `ptr` must point to at least `width` readable bytes of the scalar type the
/// function was resolved for. Alignment is not required.
pub type ToFloat = unsafe fn(*const u8) -> f32;

macro_rules! reader {
    ($name:ident, $ty:ty) => {
        unsafe fn $name(ptr: *const u8) -> f32 {
            unsafe { ptr.cast::<$ty>().read_unaligned() as f32 }
        }
    };
}

reader!(read_i8, i8);
reader!(read_i16, i16);
reader!(read_i32, i32);
reader!(read_i64, i64);
reader!(read_u8, u8);
reader!(read_u16, u16);
reader!(read_u32, u32);
reader!(read_u64, u64);
reader!(read_f32, f32);
reader!(read_f64, f64);

unsafe fn read_bool(ptr: *const u8) -> f32 {
    if unsafe { ptr.read() } != 0 {
        1.0
    } else {
        0.0
    }
}

unsafe fn read_long_double(ptr: *const u8) -> f32 {
    match LONG_DOUBLE {
        Some((_, LongDoubleFormat::X87Extended)) => {
            let bytes = unsafe { ptr.cast::<[u8; 10]>().read_unaligned() };
            x87_extended_to_f64(bytes) as f32
        }
        Some((_, LongDoubleFormat::Binary128)) => {
            let words = unsafe { ptr.cast::<[u64; 2]>().read_unaligned() };
            let (high, low) = if cfg!(target_endian = "little") {
                (words[1], words[0])
            } else {
                (words[0], words[1])
            };
            binary128_to_f64(high, low) as f32
        }
        None => 0.0,
    }
}

unsafe fn read_zero(_ptr: *const u8) -> f32 {
    0.0
}

// =============================================================================
// Converter
// =============================================================================

/// A reader function resolved for one scalar type.
///
/// Resolution happens once per array configuration; afterwards every element
/// read is a direct call through the stored function pointer.
#[derive(Debug, Clone, Copy)]
pub struct Converter {
    scalar: ScalarType,
    func: ToFloat,
    supported: bool,
}

impl Converter {
    /// Look up the reader for `scalar`.
    ///
    /// Returns `None` when the kind/width combination has no reader.
    pub fn resolve(scalar: ScalarType) -> Option<Self> {
        let func: ToFloat = match (scalar.kind, scalar.width) {
            (ScalarKind::Bool, 1) => read_bool,
            (ScalarKind::Int, 1) => read_i8,
            (ScalarKind::Int, 2) => read_i16,
            (ScalarKind::Int, 4) => read_i32,
            (ScalarKind::Int, 8) => read_i64,
            (ScalarKind::UInt, 1) => read_u8,
            (ScalarKind::UInt, 2) => read_u16,
            (ScalarKind::UInt, 4) => read_u32,
            (ScalarKind::UInt, 8) => read_u64,
            (ScalarKind::Float, 4) => read_f32,
            (ScalarKind::Float, 8) => read_f64,
            (ScalarKind::Float, w) if matches!(LONG_DOUBLE, Some((lw, _)) if lw == w) => {
                read_long_double
            }
            _ => return None,
        };
        Some(Self {
            scalar,
            func,
            supported: true,
        })
    }

    /// A converter that ignores its input and yields `0.0`.
    pub fn zero(scalar: ScalarType) -> Self {
        Self {
            scalar,
            func: read_zero,
            supported: false,
        }
    }

    /// The scalar type this converter was resolved for.
    #[inline]
    pub fn scalar(&self) -> ScalarType {
        self.scalar
    }

    /// `false` for the zero fallback.
    #[inline]
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Read the element at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must address a readable element of [`Self::scalar`].
    #[inline(always)]
    pub unsafe fn read(&self, ptr: *const u8) -> f32 {
        unsafe { (self.func)(ptr) }
    }
}
