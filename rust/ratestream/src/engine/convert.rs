//! Conversion between typed buffers and the engine's f64 channel queues.

use std::collections::VecDeque;

use crate::buffer::{BufferView, InputBuffer, OutputBuffer, Region, RegionMut};
use crate::error::{Error, Result};
use crate::sample::{ElementType, Layout, Sample};
use crate::shape::Shape;

const I16_SCALE: f64 = 32768.0;
const I32_SCALE: f64 = 2147483648.0;

/// Seed of the dither generator.
const DITHER_SEED: u32 = 0x2545_f491;

/// Output conditioning: scaling, rounding, clamping and dither.
#[derive(Debug, Clone)]
pub(crate) struct Quantizer {
    scale: f64,
    dither: bool,
    state: u32,
    clips: u64,
}

impl Quantizer {
    pub fn new(scale: f64, dither: bool) -> Self {
        Self {
            scale,
            dither,
            state: DITHER_SEED,
            clips: 0,
        }
    }

    /// Restarts the dither sequence. The clip count is kept.
    pub fn reset(&mut self) {
        self.state = DITHER_SEED;
    }

    pub fn clips(&self) -> u64 {
        self.clips
    }

    fn uniform(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        f64::from(self.state >> 8) / f64::from(1u32 << 24)
    }

    /// Triangular noise of up to one step either way.
    fn tpdf(&mut self) -> f64 {
        self.uniform() - self.uniform()
    }

    fn quantize(&mut self, value: f64, full_scale: f64, dither: bool) -> f64 {
        let mut v = value * self.scale * full_scale;
        if dither && self.dither {
            v += self.tpdf();
        }
        let v = v.round();
        let max = full_scale - 1.0;
        if v > max {
            self.clips += 1;
            max
        } else if v < -full_scale {
            self.clips += 1;
            -full_scale
        } else {
            v
        }
    }
}

/// Per-type sample conversion.
trait Convert: Sample {
    fn slices<'a>(regions: &'a [Region<'_>]) -> Option<Vec<&'a [Self]>>;
    fn slices_mut<'a>(regions: &'a mut [RegionMut<'_>]) -> Option<Vec<&'a mut [Self]>>;
    fn load(self) -> f64;
    fn store(value: f64, quantizer: &mut Quantizer) -> Self;
}

macro_rules! impl_convert {
    ($t:ty, $variant:ident, |$v:ident| $load:expr, |$value:ident, $q:ident| $store:expr) => {
        impl Convert for $t {
            fn slices<'a>(regions: &'a [Region<'_>]) -> Option<Vec<&'a [Self]>> {
                regions
                    .iter()
                    .map(|r| match r {
                        Region::$variant(s) => Some(&s[..]),
                        _ => None,
                    })
                    .collect()
            }

            fn slices_mut<'a>(regions: &'a mut [RegionMut<'_>]) -> Option<Vec<&'a mut [Self]>> {
                regions
                    .iter_mut()
                    .map(|r| match r {
                        RegionMut::$variant(s) => Some(&mut **s),
                        _ => None,
                    })
                    .collect()
            }

            #[inline]
            fn load(self) -> f64 {
                let $v = self;
                $load
            }

            #[inline]
            fn store($value: f64, $q: &mut Quantizer) -> Self {
                $store
            }
        }
    };
}

impl_convert!(f32, F32, |v| f64::from(v), |value, q| (value * q.scale) as f32);
impl_convert!(f64, F64, |v| v, |value, q| value * q.scale);
impl_convert!(i32, I32, |v| f64::from(v) / I32_SCALE, |value, q| {
    q.quantize(value, I32_SCALE, false) as i32
});
impl_convert!(i16, I16, |v| f64::from(v) / I16_SCALE, |value, q| {
    q.quantize(value, I16_SCALE, true) as i16
});

fn mismatch(expected: ElementType, found: ElementType) -> Error {
    Error::Type(format!("buffer holds {found} samples, expected {expected}"))
}

/// Appends `shape.frames` frames of `buf` to the per-channel queues `dst`.
pub(crate) fn load_frames(buf: &InputBuffer<'_>, shape: Shape, dst: &mut [Vec<f64>]) -> Result<()> {
    match buf.element_type() {
        ElementType::Float32 => load::<f32>(buf.regions(), shape, dst),
        ElementType::Float64 => load::<f64>(buf.regions(), shape, dst),
        ElementType::Int32 => load::<i32>(buf.regions(), shape, dst),
        ElementType::Int16 => load::<i16>(buf.regions(), shape, dst),
    }
}

fn load<T: Convert>(regions: &[Region<'_>], shape: Shape, dst: &mut [Vec<f64>]) -> Result<()> {
    let found = regions.first().map_or(T::ELEMENT_TYPE, Region::element_type);
    let slices = T::slices(regions).ok_or_else(|| mismatch(T::ELEMENT_TYPE, found))?;
    match shape.layout {
        Layout::Interleaved => {
            let Some(src) = slices.first() else {
                return Ok(());
            };
            if shape.channels == 0 {
                return Ok(());
            }
            for frame in src.chunks_exact(shape.channels).take(shape.frames) {
                for (queue, &sample) in dst.iter_mut().zip(frame) {
                    queue.push(sample.load());
                }
            }
        }
        Layout::Planar => {
            for (queue, src) in dst.iter_mut().zip(&slices) {
                queue.extend(src.iter().take(shape.frames).map(|&s| s.load()));
            }
        }
    }
    Ok(())
}

/// Moves `frames` frames from the per-channel queues `src` into `buf`.
///
/// Samples are written frame by frame whatever the layout, so the dither
/// sequence does not depend on it.
pub(crate) fn store_frames(
    src: &mut [VecDeque<f64>],
    frames: usize,
    buf: &mut OutputBuffer<'_>,
    shape: Shape,
    quantizer: &mut Quantizer,
) -> Result<()> {
    let regions = buf.regions_mut();
    match regions.first().map(RegionMut::element_type) {
        Some(ElementType::Float32) => store::<f32>(src, frames, regions, shape, quantizer),
        Some(ElementType::Float64) => store::<f64>(src, frames, regions, shape, quantizer),
        Some(ElementType::Int32) => store::<i32>(src, frames, regions, shape, quantizer),
        Some(ElementType::Int16) => store::<i16>(src, frames, regions, shape, quantizer),
        None => Ok(()),
    }
}

fn store<T: Convert>(
    src: &mut [VecDeque<f64>],
    frames: usize,
    regions: &mut [RegionMut<'_>],
    shape: Shape,
    quantizer: &mut Quantizer,
) -> Result<()> {
    let mut slices = T::slices_mut(regions)
        .ok_or_else(|| Error::Type("output regions mix element types".to_string()))?;
    let frames = frames.min(shape.frames);
    let channels = shape.channels;
    for frame in 0..frames {
        for (ch, queue) in src.iter_mut().enumerate().take(channels) {
            let sample = T::store(queue.pop_front().unwrap_or(0.0), quantizer);
            let slot = match shape.layout {
                Layout::Interleaved => slices
                    .first_mut()
                    .and_then(|s| s.get_mut(frame * channels + ch)),
                Layout::Planar => slices.get_mut(ch).and_then(|s| s.get_mut(frame)),
            };
            if let Some(slot) = slot {
                *slot = sample;
            }
        }
    }
    Ok(())
}
