//! Sample element types and buffer layouts.

use std::borrow::Cow;
use std::fmt;

use crate::buffer::{Region, RegionMut};

/// Element type of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 32-bit IEEE float, nominal range [-1, 1].
    Float32,
    /// 64-bit IEEE float, nominal range [-1, 1].
    Float64,
    /// 32-bit signed integer, full scale.
    Int32,
    /// 16-bit signed integer, full scale.
    Int16,
}

impl ElementType {
    /// All element types, in datatype code order.
    pub const ALL: [ElementType; 4] = [
        ElementType::Float32,
        ElementType::Float64,
        ElementType::Int32,
        ElementType::Int16,
    ];

    /// Returns the datatype code of this element type (0..=3).
    pub const fn code(self) -> u32 {
        match self {
            ElementType::Float32 => 0,
            ElementType::Float64 => 1,
            ElementType::Int32 => 2,
            ElementType::Int16 => 3,
        }
    }

    /// Returns the element type for an interleaved datatype code.
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ElementType::Float32),
            1 => Some(ElementType::Float64),
            2 => Some(ElementType::Int32),
            3 => Some(ElementType::Int16),
            _ => None,
        }
    }

    /// Returns the datatype code including the planar ("split") bit.
    pub const fn datatype_code(self, layout: Layout) -> u32 {
        match layout {
            Layout::Interleaved => self.code(),
            Layout::Planar => self.code() + 4,
        }
    }

    /// Returns the size of one sample in bytes.
    pub const fn size(self) -> usize {
        match self {
            ElementType::Float32 => 4,
            ElementType::Float64 => 8,
            ElementType::Int32 => 4,
            ElementType::Int16 => 2,
        }
    }

    /// Returns true for the integer element types.
    pub const fn is_integer(self) -> bool {
        matches!(self, ElementType::Int32 | ElementType::Int16)
    }

    /// Returns the representable (min, max) range of integer element types.
    pub const fn full_scale(self) -> Option<(i64, i64)> {
        match self {
            ElementType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            ElementType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            ElementType::Float32 | ElementType::Float64 => None,
        }
    }

    /// Returns a short name such as `f32` or `i16`.
    pub const fn name(self) -> &'static str {
        match self {
            ElementType::Float32 => "f32",
            ElementType::Float64 => "f64",
            ElementType::Int32 => "i32",
            ElementType::Int16 => "i16",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Memory layout of multi-channel sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// One region; the samples of a frame are adjacent.
    Interleaved,
    /// One region per channel.
    Planar,
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
    impl Sealed for i16 {}
}

/// A primitive sample type a buffer can hold.
///
/// Implemented for `f32`, `f64`, `i32` and `i16` only.
pub trait Sample: Copy + Send + Sync + 'static + sealed::Sealed {
    /// The element type tag of this sample type.
    const ELEMENT_TYPE: ElementType;

    #[doc(hidden)]
    fn region(samples: Cow<'_, [Self]>) -> Region<'_>;

    #[doc(hidden)]
    fn region_mut(samples: &mut [Self]) -> RegionMut<'_>;

    /// Decodes one sample from the first `ELEMENT_TYPE.size()` bytes of
    /// `bytes`, little-endian.
    #[doc(hidden)]
    fn from_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_sample {
    ($t:ty, $element:ident, $variant:ident) => {
        impl Sample for $t {
            const ELEMENT_TYPE: ElementType = ElementType::$element;

            #[inline]
            fn region(samples: Cow<'_, [Self]>) -> Region<'_> {
                Region::$variant(samples)
            }

            #[inline]
            fn region_mut(samples: &mut [Self]) -> RegionMut<'_> {
                RegionMut::$variant(samples)
            }

            #[inline]
            fn from_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                let n = raw.len().min(bytes.len());
                raw[..n].copy_from_slice(&bytes[..n]);
                <$t>::from_le_bytes(raw)
            }
        }
    };
}

impl_sample!(f32, Float32, F32);
impl_sample!(f64, Float64, F64);
impl_sample!(i32, Int32, I32);
impl_sample!(i16, Int16, I16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_codes_round_trip() {
        for element in ElementType::ALL {
            assert_eq!(ElementType::from_code(element.code()), Some(element));
        }
        assert_eq!(ElementType::from_code(4), None);
    }

    #[test]
    fn test_datatype_code_split_bit() {
        assert_eq!(ElementType::Float32.datatype_code(Layout::Interleaved), 0);
        assert_eq!(ElementType::Float32.datatype_code(Layout::Planar), 4);
        assert_eq!(ElementType::Int16.datatype_code(Layout::Planar), 7);
    }

    #[test]
    fn test_element_sizes() {
        assert_eq!(ElementType::Float32.size(), 4);
        assert_eq!(ElementType::Float64.size(), 8);
        assert_eq!(ElementType::Int32.size(), 4);
        assert_eq!(ElementType::Int16.size(), 2);
    }

    #[test]
    fn test_full_scale() {
        assert_eq!(ElementType::Int16.full_scale(), Some((-32768, 32767)));
        assert_eq!(
            ElementType::Int32.full_scale(),
            Some((-2147483648, 2147483647))
        );
        assert_eq!(ElementType::Float64.full_scale(), None);
        assert!(ElementType::Int32.is_integer());
        assert!(!ElementType::Float32.is_integer());
    }

    #[test]
    fn test_sample_tags() {
        assert_eq!(<f32 as Sample>::ELEMENT_TYPE, ElementType::Float32);
        assert_eq!(<i16 as Sample>::ELEMENT_TYPE, ElementType::Int16);
        assert_eq!(ElementType::Int32.to_string(), "i32");
    }

    #[test]
    fn test_from_le() {
        assert_eq!(<i16 as Sample>::from_le(&[0x00, 0x80]), i16::MIN);
        assert_eq!(<i32 as Sample>::from_le(&1000i32.to_le_bytes()), 1000);
        assert_eq!(f32::from_le(&0.5f32.to_le_bytes()), 0.5);
        assert_eq!(f64::from_le(&(-0.25f64).to_le_bytes()), -0.25);
    }
}
