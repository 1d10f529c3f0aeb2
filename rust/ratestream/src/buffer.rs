//! Typed sample buffers.
//!
//! A buffer is a list of memory regions sharing one element type:
//! a single region holds interleaved frames, one region per channel holds
//! planar data. Buffers never own the memory handed to the resampler unless
//! they were built from owned vectors (which is what closure input providers
//! return).
//!
//! ```
//! use ratestream::{BufferView, InputBuffer, OutputBuffer};
//!
//! let stereo = [0.0f32, 0.0, 0.5, 0.5, 1.0, 1.0];
//! let input = InputBuffer::interleaved(&stereo[..]);
//!
//! let mut left = vec![0i16; 16];
//! let mut right = vec![0i16; 16];
//! let output = OutputBuffer::planar([&mut left[..], &mut right[..]]);
//! assert_eq!(input.arity(), 1);
//! assert_eq!(output.arity(), 2);
//! ```

use std::borrow::Cow;
use std::ops::Range;

use crate::sample::{ElementType, Layout, Sample};
use crate::shape::Shape;

/// One read-only memory region of samples.
#[derive(Debug, Clone, PartialEq)]
pub enum Region<'a> {
    F32(Cow<'a, [f32]>),
    F64(Cow<'a, [f64]>),
    I32(Cow<'a, [i32]>),
    I16(Cow<'a, [i16]>),
}

impl Region<'_> {
    /// Returns the element type of this region.
    pub fn element_type(&self) -> ElementType {
        match self {
            Region::F32(_) => ElementType::Float32,
            Region::F64(_) => ElementType::Float64,
            Region::I32(_) => ElementType::Int32,
            Region::I16(_) => ElementType::Int16,
        }
    }

    /// Returns the number of samples in this region.
    pub fn len(&self) -> usize {
        match self {
            Region::F32(s) => s.len(),
            Region::F64(s) => s.len(),
            Region::I32(s) => s.len(),
            Region::I16(s) => s.len(),
        }
    }

    /// Returns true if the region holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice(&self, range: Range<usize>) -> Region<'_> {
        let range = clamp(range, self.len());
        match self {
            Region::F32(s) => Region::F32(Cow::Borrowed(&s[range])),
            Region::F64(s) => Region::F64(Cow::Borrowed(&s[range])),
            Region::I32(s) => Region::I32(Cow::Borrowed(&s[range])),
            Region::I16(s) => Region::I16(Cow::Borrowed(&s[range])),
        }
    }

    fn into_owned(self) -> Region<'static> {
        match self {
            Region::F32(s) => Region::F32(Cow::Owned(s.into_owned())),
            Region::F64(s) => Region::F64(Cow::Owned(s.into_owned())),
            Region::I32(s) => Region::I32(Cow::Owned(s.into_owned())),
            Region::I16(s) => Region::I16(Cow::Owned(s.into_owned())),
        }
    }
}

/// One writable memory region of samples.
#[derive(Debug, PartialEq)]
pub enum RegionMut<'a> {
    F32(&'a mut [f32]),
    F64(&'a mut [f64]),
    I32(&'a mut [i32]),
    I16(&'a mut [i16]),
}

impl RegionMut<'_> {
    /// Returns the element type of this region.
    pub fn element_type(&self) -> ElementType {
        match self {
            RegionMut::F32(_) => ElementType::Float32,
            RegionMut::F64(_) => ElementType::Float64,
            RegionMut::I32(_) => ElementType::Int32,
            RegionMut::I16(_) => ElementType::Int16,
        }
    }

    /// Returns the number of samples in this region.
    pub fn len(&self) -> usize {
        match self {
            RegionMut::F32(s) => s.len(),
            RegionMut::F64(s) => s.len(),
            RegionMut::I32(s) => s.len(),
            RegionMut::I16(s) => s.len(),
        }
    }

    /// Returns true if the region holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice_mut(&mut self, range: Range<usize>) -> RegionMut<'_> {
        let range = clamp(range, self.len());
        match self {
            RegionMut::F32(s) => RegionMut::F32(&mut s[range]),
            RegionMut::F64(s) => RegionMut::F64(&mut s[range]),
            RegionMut::I32(s) => RegionMut::I32(&mut s[range]),
            RegionMut::I16(s) => RegionMut::I16(&mut s[range]),
        }
    }
}

/// Read access to the shape-relevant parts of a buffer.
///
/// The shape resolver works on this trait so input and output buffers share
/// one inference routine.
pub trait BufferView {
    /// Returns the element type shared by every region.
    fn element_type(&self) -> ElementType;

    /// Returns the number of regions.
    fn arity(&self) -> usize;

    /// Returns the sample count of region `index`.
    fn region_len(&self, index: usize) -> usize;

    /// Returns the layout implied by the region count alone.
    ///
    /// A single region is always reported as interleaved, which is also the
    /// answer the resolver gives for one-channel sessions.
    fn layout(&self) -> Layout {
        if self.arity() == 1 {
            Layout::Interleaved
        } else {
            Layout::Planar
        }
    }
}

/// Returns the sample range of `frames` inside one region of a buffer shaped
/// like `shape`.
fn region_range(shape: Shape, frames: Range<usize>) -> Range<usize> {
    let end = frames.end.min(shape.frames);
    let start = frames.start.min(end);
    match shape.layout {
        Layout::Interleaved => start * shape.channels..end * shape.channels,
        Layout::Planar => start..end,
    }
}

/// Clamps `range` to a region of `len` samples.
fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    let end = range.end.min(len);
    range.start.min(end)..end
}

/// A read-only sample buffer handed to the resampler.
#[derive(Debug, Clone, PartialEq)]
pub struct InputBuffer<'a> {
    element_type: ElementType,
    regions: Vec<Region<'a>>,
}

impl<'a> InputBuffer<'a> {
    /// Creates a buffer over one region of interleaved frames.
    pub fn interleaved<T: Sample>(samples: &'a [T]) -> Self {
        Self {
            element_type: T::ELEMENT_TYPE,
            regions: vec![T::region(Cow::Borrowed(samples))],
        }
    }

    /// Creates a buffer over one region per channel.
    pub fn planar<T, I>(channels: I) -> Self
    where
        T: Sample,
        I: IntoIterator<Item = &'a [T]>,
    {
        Self {
            element_type: T::ELEMENT_TYPE,
            regions: channels
                .into_iter()
                .map(|channel| T::region(Cow::Borrowed(channel)))
                .collect(),
        }
    }

    /// Returns a zero-length interleaved buffer of the given element type.
    pub fn empty(element_type: ElementType) -> Self {
        let region = match element_type {
            ElementType::Float32 => Region::F32(Cow::Borrowed(&[])),
            ElementType::Float64 => Region::F64(Cow::Borrowed(&[])),
            ElementType::Int32 => Region::I32(Cow::Borrowed(&[])),
            ElementType::Int16 => Region::I16(Cow::Borrowed(&[])),
        };
        Self {
            element_type,
            regions: vec![region],
        }
    }

    /// Returns the regions of this buffer.
    pub fn regions(&self) -> &[Region<'a>] {
        &self.regions
    }

    /// Copies borrowed regions so the buffer no longer borrows anything.
    pub fn into_owned(self) -> InputBuffer<'static> {
        InputBuffer {
            element_type: self.element_type,
            regions: self.regions.into_iter().map(Region::into_owned).collect(),
        }
    }

    /// Returns a view of `range` frames of a buffer resolved to `shape`.
    pub fn frames(&self, shape: Shape, range: Range<usize>) -> InputBuffer<'_> {
        let samples = region_range(shape, range);
        InputBuffer {
            element_type: self.element_type,
            regions: self
                .regions
                .iter()
                .map(|region| region.slice(samples.clone()))
                .collect(),
        }
    }
}

impl InputBuffer<'static> {
    /// Creates an owning buffer of interleaved frames.
    pub fn owned_interleaved<T: Sample>(samples: Vec<T>) -> Self {
        Self {
            element_type: T::ELEMENT_TYPE,
            regions: vec![T::region(Cow::Owned(samples))],
        }
    }

    /// Creates an owning buffer with one vector per channel.
    pub fn owned_planar<T: Sample>(channels: Vec<Vec<T>>) -> Self {
        Self {
            element_type: T::ELEMENT_TYPE,
            regions: channels
                .into_iter()
                .map(|channel| T::region(Cow::Owned(channel)))
                .collect(),
        }
    }
}

impl BufferView for InputBuffer<'_> {
    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn arity(&self) -> usize {
        self.regions.len()
    }

    fn region_len(&self, index: usize) -> usize {
        self.regions.get(index).map_or(0, Region::len)
    }
}

/// A writable sample buffer the resampler fills.
#[derive(Debug, PartialEq)]
pub struct OutputBuffer<'a> {
    element_type: ElementType,
    regions: Vec<RegionMut<'a>>,
}

impl<'a> OutputBuffer<'a> {
    /// Creates a buffer over one region of interleaved frames.
    pub fn interleaved<T: Sample>(samples: &'a mut [T]) -> Self {
        Self {
            element_type: T::ELEMENT_TYPE,
            regions: vec![T::region_mut(samples)],
        }
    }

    /// Creates a buffer over one region per channel.
    pub fn planar<T, I>(channels: I) -> Self
    where
        T: Sample,
        I: IntoIterator<Item = &'a mut [T]>,
    {
        Self {
            element_type: T::ELEMENT_TYPE,
            regions: channels.into_iter().map(T::region_mut).collect(),
        }
    }

    /// Returns the regions of this buffer.
    pub fn regions(&self) -> &[RegionMut<'a>] {
        &self.regions
    }

    /// Returns the regions of this buffer for writing.
    pub fn regions_mut(&mut self) -> &mut [RegionMut<'a>] {
        &mut self.regions
    }

    /// Returns a writable view of `range` frames of a buffer resolved to
    /// `shape`.
    pub fn frames_mut(&mut self, shape: Shape, range: Range<usize>) -> OutputBuffer<'_> {
        let samples = region_range(shape, range);
        OutputBuffer {
            element_type: self.element_type,
            regions: self
                .regions
                .iter_mut()
                .map(|region| region.slice_mut(samples.clone()))
                .collect(),
        }
    }
}

impl BufferView for OutputBuffer<'_> {
    fn element_type(&self) -> ElementType {
        self.element_type
    }

    fn arity(&self) -> usize {
        self.regions.len()
    }

    fn region_len(&self, index: usize) -> usize {
        self.regions.get(index).map_or(0, RegionMut::len)
    }
}
