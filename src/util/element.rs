//! Element types - the scalar storage types a JNRRD payload can hold.

use bytemuck::{Pod, Zeroable};
use half::{bf16, f16};
use std::fmt;

/// Scalar element type of a payload buffer.
///
/// These are the storage types named by the header's `type` field. Each has a
/// fixed size and a well-defined binary representation; complex types are
/// stored as two consecutive components of half their total width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    Uint8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    Uint16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    Uint32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    Uint64,
    /// 16-bit floating point (IEEE 754 half precision)
    Float16,
    /// 16-bit brain floating point
    BFloat16,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// Complex number of two 32-bit floats
    Complex64,
    /// Complex number of two 64-bit floats
    Complex128,
}

impl ElementType {
    /// Total size in bytes of one element.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 | Self::Complex64 => 8,
            Self::Complex128 => 16,
        }
    }

    /// Width of the unit a byte swap operates on.
    ///
    /// Equal to [`num_bytes`](Self::num_bytes) for scalar types; complex types
    /// swap each component separately.
    #[inline]
    pub const fn swap_width(self) -> usize {
        match self {
            Self::Complex64 => 4,
            Self::Complex128 => 8,
            other => other.num_bytes(),
        }
    }

    /// Returns the header name of this type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Float16 => "float16",
            Self::BFloat16 => "bfloat16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
        }
    }

    /// Parse an element type from its header name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int8" => Some(Self::Int8),
            "uint8" => Some(Self::Uint8),
            "int16" => Some(Self::Int16),
            "uint16" => Some(Self::Uint16),
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::Uint32),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::Uint64),
            "float16" => Some(Self::Float16),
            "bfloat16" => Some(Self::BFloat16),
            "float32" => Some(Self::Float32),
            "float64" => Some(Self::Float64),
            "complex64" => Some(Self::Complex64),
            "complex128" => Some(Self::Complex128),
            _ => None,
        }
    }

    /// Returns true if this is an integer type.
    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Uint8
                | Self::Int16
                | Self::Uint16
                | Self::Int32
                | Self::Uint32
                | Self::Int64
                | Self::Uint64
        )
    }

    /// Returns true if this is an unsigned integer type.
    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64)
    }

    /// Returns true if this is a floating point type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64
        )
    }

    /// Returns true if this is a complex type.
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// === Element trait for type-safe conversions ===

/// Trait for Rust types that can back a JNRRD payload buffer.
pub trait JnrrdElement: Pod + Zeroable + Copy + Default {
    /// The corresponding [`ElementType`].
    const ELEMENT_TYPE: ElementType;

    /// Size of this type in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();
}

impl JnrrdElement for i8 {
    const ELEMENT_TYPE: ElementType = ElementType::Int8;
}

impl JnrrdElement for u8 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint8;
}

impl JnrrdElement for i16 {
    const ELEMENT_TYPE: ElementType = ElementType::Int16;
}

impl JnrrdElement for u16 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint16;
}

impl JnrrdElement for i32 {
    const ELEMENT_TYPE: ElementType = ElementType::Int32;
}

impl JnrrdElement for u32 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint32;
}

impl JnrrdElement for i64 {
    const ELEMENT_TYPE: ElementType = ElementType::Int64;
}

impl JnrrdElement for u64 {
    const ELEMENT_TYPE: ElementType = ElementType::Uint64;
}

impl JnrrdElement for f16 {
    const ELEMENT_TYPE: ElementType = ElementType::Float16;
}

impl JnrrdElement for bf16 {
    const ELEMENT_TYPE: ElementType = ElementType::BFloat16;
}

impl JnrrdElement for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::Float32;
}

impl JnrrdElement for f64 {
    const ELEMENT_TYPE: ElementType = ElementType::Float64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::Uint8.num_bytes(), 1);
        assert_eq!(ElementType::Int32.num_bytes(), 4);
        assert_eq!(ElementType::Float16.num_bytes(), 2);
        assert_eq!(ElementType::Float64.num_bytes(), 8);
        assert_eq!(ElementType::Complex64.num_bytes(), 8);
        assert_eq!(ElementType::Complex128.num_bytes(), 16);
    }

    #[test]
    fn test_swap_widths() {
        assert_eq!(ElementType::Int32.swap_width(), 4);
        assert_eq!(ElementType::Complex64.swap_width(), 4);
        assert_eq!(ElementType::Complex128.swap_width(), 8);
        assert_eq!(ElementType::Uint8.swap_width(), 1);
    }

    #[test]
    fn test_name_roundtrip() {
        let all = [
            ElementType::Int8,
            ElementType::Uint8,
            ElementType::Int16,
            ElementType::Uint16,
            ElementType::Int32,
            ElementType::Uint32,
            ElementType::Int64,
            ElementType::Uint64,
            ElementType::Float16,
            ElementType::BFloat16,
            ElementType::Float32,
            ElementType::Float64,
            ElementType::Complex64,
            ElementType::Complex128,
        ];
        for t in all {
            assert_eq!(ElementType::from_name(t.name()), Some(t));
        }
        assert_eq!(ElementType::from_name("block"), None);
    }

    #[test]
    fn test_element_trait() {
        assert_eq!(<f32 as JnrrdElement>::ELEMENT_TYPE, ElementType::Float32);
        assert_eq!(<u16 as JnrrdElement>::SIZE, 2);
        assert_eq!(<f16 as JnrrdElement>::ELEMENT_TYPE, ElementType::Float16);
    }
}
