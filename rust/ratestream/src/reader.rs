//! Frame-aligned sample reader.

use std::io::{self, Read};

use crate::buffer::InputBuffer;
use crate::provider::{BoxError, InputProvider};
use crate::sample::Sample;

/// Reads little-endian interleaved samples from an [`io::Read`] and hands
/// them out as input buffers.
///
/// Every buffer holds whole frames only. Bytes of a partial frame are kept
/// until the rest arrives; a partial frame left at end of input is dropped.
pub struct SampleReader<R: Read, T: Sample> {
    inner: R,
    channels: usize,
    /// Raw bytes, including up to one partial frame left from the last read.
    bytes: Vec<u8>,
    buffered: usize,
    samples: Vec<T>,
    eof: bool,
}

impl<R: Read, T: Sample> SampleReader<R, T> {
    /// Creates a reader of `channels`-channel frames.
    pub fn new(reader: R, channels: usize) -> Self {
        Self {
            inner: reader,
            channels: channels.max(1),
            bytes: Vec::new(),
            buffered: 0,
            samples: Vec::new(),
            eof: false,
        }
    }

    /// Bytes per frame.
    pub fn frame_size(&self) -> usize {
        self.channels * T::ELEMENT_TYPE.size()
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads up to `frames` whole frames and decodes them into `self.samples`.
    fn fill(&mut self, frames: usize) -> io::Result<usize> {
        self.samples.clear();
        if self.eof || frames == 0 {
            return Ok(0);
        }

        let frame_size = self.frame_size();
        let want = frames * frame_size;
        if self.bytes.len() < want {
            self.bytes.resize(want, 0);
        }

        // Keep reading until at least one whole frame is in, or input ends.
        while self.buffered < frame_size {
            let n = match self.inner.read(&mut self.bytes[self.buffered..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                self.eof = true;
                self.buffered = 0;
                return Ok(0);
            }
            self.buffered += n;
        }

        let aligned = (self.buffered / frame_size) * frame_size;
        let sample_size = T::ELEMENT_TYPE.size();
        self.samples.extend(
            self.bytes[..aligned]
                .chunks_exact(sample_size)
                .map(T::from_le),
        );

        // Move the unaligned remainder to the front for the next call.
        self.bytes.copy_within(aligned..self.buffered, 0);
        self.buffered -= aligned;
        Ok(aligned / frame_size)
    }
}

impl<R: Read, T: Sample> InputProvider for SampleReader<R, T> {
    fn provide(&mut self, requested: usize) -> Result<InputBuffer<'_>, BoxError> {
        self.fill(requested)?;
        Ok(InputBuffer::interleaved(&self.samples[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferView, Region};
    use std::borrow::Cow;
    use std::io::Cursor;

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_reader_aligned() {
        let data = i16_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut reader: SampleReader<_, i16> = SampleReader::new(Cursor::new(data), 2);
        let buf = reader.provide(4).unwrap();
        assert_eq!(buf.regions()[0], Region::I16(Cow::Borrowed(&[1, 2, 3, 4, 5, 6, 7, 8])));
    }

    #[test]
    fn test_reader_respects_request() {
        let data = i16_bytes(&[1, 2, 3, 4, 5, 6]);
        let mut reader: SampleReader<_, i16> = SampleReader::new(Cursor::new(data), 1);
        assert_eq!(reader.provide(4).unwrap().region_len(0), 4);
        assert_eq!(reader.provide(4).unwrap().region_len(0), 2);
        assert_eq!(reader.provide(4).unwrap().region_len(0), 0);
    }

    #[test]
    fn test_reader_drops_partial_frame() {
        // Three whole stereo f32 frames plus 5 stray bytes.
        let mut data: Vec<u8> = [0.5f32, -0.5, 0.25, -0.25, 1.0, -1.0]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        data.extend_from_slice(&[1, 2, 3, 4, 5]);
        let mut reader: SampleReader<_, f32> = SampleReader::new(Cursor::new(data), 2);
        assert_eq!(reader.frame_size(), 8);

        let buf = reader.provide(16).unwrap();
        assert_eq!(buf.region_len(0), 6);
        drop(buf);
        assert_eq!(reader.provide(16).unwrap().region_len(0), 0);
    }

    /// Hands out one byte per read call.
    struct Trickle(Vec<u8>, usize);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.1 >= self.0.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[self.1];
            self.1 += 1;
            Ok(1)
        }
    }

    #[test]
    fn test_reader_short_reads() {
        let data = i16_bytes(&[100, -100, 200]);
        let mut reader: SampleReader<_, i16> = SampleReader::new(Trickle(data, 0), 1);
        let buf = reader.provide(8).unwrap();
        assert_eq!(buf.regions()[0], Region::I16(Cow::Borrowed(&[100])));
        drop(buf);
        assert_eq!(reader.provide(8).unwrap().region_len(0), 1);
        assert_eq!(reader.provide(8).unwrap().region_len(0), 1);
        assert_eq!(reader.provide(8).unwrap().region_len(0), 0);
    }
}
