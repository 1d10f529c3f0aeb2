//! Buffer shape inference.

use crate::buffer::BufferView;
use crate::error::ShapeError;
use crate::sample::Layout;

/// The resolved shape of one buffer against a channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    /// Whether the buffer holds interleaved or planar frames.
    pub layout: Layout,
    /// Number of whole frames the buffer holds.
    pub frames: usize,
    /// Channel count the buffer was resolved against.
    pub channels: usize,
}

impl Shape {
    /// Returns true if the buffer was resolved as interleaved.
    pub fn is_interleaved(&self) -> bool {
        self.layout == Layout::Interleaved
    }
}

/// Infers the layout and frame count of `buf` for `channels` channels.
///
/// A single region is interleaved, and its length divided by `channels` is the
/// frame count (a trailing partial frame is ignored). With one channel this is
/// the only answer given, since one interleaved channel and one planar channel
/// are the same memory. One region per channel is planar; the shortest region
/// bounds the frame count. Any other region count is rejected.
pub fn resolve<B: BufferView + ?Sized>(buf: &B, channels: usize) -> Result<Shape, ShapeError> {
    let arity = buf.arity();
    if channels == 0 {
        return Err(ShapeError::InvalidChannelArity { arity, channels });
    }

    if arity == 1 {
        return Ok(Shape {
            layout: Layout::Interleaved,
            frames: buf.region_len(0) / channels,
            channels,
        });
    }

    if arity == channels {
        let frames = (0..arity).map(|i| buf.region_len(i)).min().unwrap_or(0);
        return Ok(Shape {
            layout: Layout::Planar,
            frames,
            channels,
        });
    }

    Err(ShapeError::InvalidChannelArity { arity, channels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{InputBuffer, OutputBuffer};

    #[test]
    fn test_single_region_is_interleaved() {
        let data = [0.0f32; 12];
        let buf = InputBuffer::interleaved(&data[..]);
        for channels in 1..=4 {
            let shape = resolve(&buf, channels).unwrap();
            assert!(shape.is_interleaved());
            assert_eq!(shape.frames, 12 / channels);
            assert_eq!(shape.channels, channels);
        }
    }

    #[test]
    fn test_partial_frame_ignored() {
        let data = [0i16; 7];
        let buf = InputBuffer::interleaved(&data[..]);
        assert_eq!(resolve(&buf, 2).unwrap().frames, 3);
    }

    #[test]
    fn test_one_region_per_channel_is_planar() {
        let a = [0i32; 5];
        let b = [0i32; 5];
        let c = [0i32; 5];
        let buf = InputBuffer::planar([&a[..], &b[..], &c[..]]);
        let shape = resolve(&buf, 3).unwrap();
        assert_eq!(shape.layout, Layout::Planar);
        assert_eq!(shape.frames, 5);
    }

    #[test]
    fn test_mono_tie_break() {
        let mut mono = [0.0f64; 9];
        let buf = OutputBuffer::planar([&mut mono[..]]);
        let shape = resolve(&buf, 1).unwrap();
        assert_eq!(shape.layout, Layout::Interleaved);
        assert_eq!(shape.frames, 9);
    }

    #[test]
    fn test_uneven_planar_uses_shortest() {
        let a = [0.0f32; 6];
        let b = [0.0f32; 4];
        let buf = InputBuffer::planar([&a[..], &b[..]]);
        assert_eq!(resolve(&buf, 2).unwrap().frames, 4);
    }

    #[test]
    fn test_invalid_arity() {
        let a = [0.0f32; 4];
        let buf = InputBuffer::planar([&a[..], &a[..], &a[..]]);
        assert_eq!(
            resolve(&buf, 2),
            Err(ShapeError::InvalidChannelArity {
                arity: 3,
                channels: 2
            })
        );

        let empty: InputBuffer<'_> = InputBuffer::planar(Vec::<&[f32]>::new());
        assert!(resolve(&empty, 2).is_err());
    }

    #[test]
    fn test_zero_channels_rejected() {
        let data = [0.0f32; 4];
        let buf = InputBuffer::interleaved(&data[..]);
        assert!(resolve(&buf, 0).is_err());
    }
}
