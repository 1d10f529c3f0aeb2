//! The resampling engine behind a session.
//!
//! A session talks to its engine through the [`Engine`] trait. The default
//! engine is [`RubatoEngine`]; custom engines can be plugged in with
//! [`Resampler::from_engine`](crate::Resampler::from_engine).
//!
//! This module also holds the parameter normalisation routines the
//! configuration specs are validated with. They mirror the C library's
//! `soxr_io_spec` / `soxr_quality_spec` helpers: each returns a raw parameter
//! record carrying an optional error message instead of failing.

mod convert;
mod rubato_impl;

pub use self::rubato_impl::RubatoEngine;

use crate::buffer::{InputBuffer, OutputBuffer};
use crate::config::{IoSpec, QualitySpec, RuntimeSpec};
use crate::error::Result;
use crate::shape::Shape;

/// A streaming resampling engine.
///
/// Frames go in with [`input`](Engine::input) and come out with
/// [`output`](Engine::output). After [`flush`](Engine::flush) the engine
/// accepts no more input and drains what it holds.
pub trait Engine: Send {
    /// Returns the name of the processing path serving this engine.
    fn name(&self) -> &str;

    /// Returns the channel count.
    fn channels(&self) -> usize;

    /// Changes the channel count. Fails once input has been accepted.
    fn set_channels(&mut self, channels: usize) -> Result<()>;

    /// Returns the input-to-output rate ratio (`in_rate / out_rate`).
    fn io_ratio(&self) -> f64;

    /// Accepts every frame of `buf` (resolved to `shape`) and returns the
    /// number of frames taken, which is 0 once flushing.
    fn input(&mut self, buf: &InputBuffer<'_>, shape: Shape) -> Result<usize>;

    /// Marks the end of input.
    fn flush(&mut self);

    /// Writes up to `shape.frames` frames into `buf`, returning the count.
    fn output(&mut self, buf: &mut OutputBuffer<'_>, shape: Shape) -> Result<usize>;

    /// Drops all buffered state and returns to the freshly created state.
    fn clear(&mut self) -> Result<()>;

    /// Returns the output frames still owed for the input accepted so far.
    fn delay(&self) -> f64;

    /// Returns the number of output samples clamped since creation.
    fn clips(&self) -> u64;

    /// Returns true once a flushed engine has delivered everything.
    fn is_drained(&self) -> bool;
}

/// Creates the default engine.
pub fn create(
    in_rate: f64,
    out_rate: f64,
    channels: usize,
    io: &IoSpec,
    quality: &QualitySpec,
    runtime: &RuntimeSpec,
) -> Result<Box<dyn Engine>> {
    let engine = RubatoEngine::new(in_rate, out_rate, channels, io, quality, runtime)?;
    Ok(Box::new(engine))
}

/// Datatype codes at or above this value are invalid.
const DATATYPE_LIMIT: u32 = 8;

/// I/O flag disabling TPDF dither.
pub(crate) const NO_DITHER: u32 = 8;

/// Raw I/O parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawIoSpec {
    pub itype: u32,
    pub otype: u32,
    pub scale: f64,
    pub flags: u32,
    pub error: Option<&'static str>,
}

/// Normalises an I/O datatype pair.
pub(crate) fn io_spec(itype: u32, otype: u32) -> RawIoSpec {
    let error = if (itype | otype) >= DATATYPE_LIMIT {
        Some("invalid io datatype(s)")
    } else {
        None
    };
    RawIoSpec {
        itype,
        otype,
        scale: 1.0,
        flags: 0,
        error,
    }
}

/// Recipe word bits selecting the phase response.
pub(crate) const PHASE_MASK: u32 = 0x30;
/// Recipe word bit selecting the steep passband.
pub(crate) const STEEP_FILTER: u32 = 0x40;

const QUALITY_MASK: u32 = 0xf;
const LOW_QUALITY: u32 = 1;
const MEDIUM_QUALITY: u32 = 2;
const BITS16_QUALITY: u32 = 3;
const BITS32_QUALITY: u32 = 7;

/// Passband end of the low quality recipe, exact in binary.
const LOW_PASSBAND_END: f64 = 1385.0 / 2048.0;

/// Known quality flag bits.
pub(crate) const ROLLOFF_MASK: u32 = 3;
pub(crate) const ROLLOFF_MEDIUM: u32 = 1;
pub(crate) const HI_PREC_CLOCK: u32 = 8;
pub(crate) const DOUBLE_PRECISION: u32 = 16;
pub(crate) const VARIABLE_RATE: u32 = 32;
const KNOWN_FLAGS: u32 = ROLLOFF_MASK | HI_PREC_CLOCK | DOUBLE_PRECISION | VARIABLE_RATE;

/// Raw quality parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawQualitySpec {
    pub precision: f64,
    pub phase_response: f64,
    pub passband_end: f64,
    pub stopband_begin: f64,
    pub flags: u32,
    pub error: Option<&'static str>,
}

fn to_3db(attenuation: f64) -> f64 {
    (1.6e-6 * attenuation - 7.5e-4) * attenuation + 0.646
}

/// Returns the stopband rejection in dB for `precision` bits.
fn rejection(precision: f64) -> f64 {
    precision * 20.0 * 2f64.log10()
}

/// Returns the passband end a recipe of `precision` bits uses.
pub(crate) fn passband_end(precision: f64, steep: bool) -> f64 {
    let margin = if steep { 0.01 } else { 0.05 };
    1.0 - margin / to_3db(rejection(precision))
}

/// Derives quality parameters from a recipe word.
///
/// The low four bits select the recipe, bits 4..6 the phase response and
/// bit 6 a steep passband.
pub(crate) fn quality_spec(recipe: u32, flags: u32) -> RawQualitySpec {
    let quality = recipe & QUALITY_MASK;
    let mut spec = RawQualitySpec {
        precision: 0.0,
        phase_response: 0.0,
        passband_end: 0.0,
        stopband_begin: 0.0,
        flags: 0,
        error: None,
    };
    if quality > BITS32_QUALITY {
        spec.error = Some("invalid quality type");
        return spec;
    }

    spec.phase_response = match (recipe & PHASE_MASK) >> 4 {
        0 => 50.0,
        1 => 25.0,
        2 => 100.0,
        _ => 0.0,
    };
    spec.stopband_begin = 1.0;
    spec.precision = match quality {
        0 => 0.0,
        q if q <= BITS16_QUALITY => 16.0,
        q => f64::from(4 + q * 4),
    };
    spec.flags = flags;
    spec.passband_end = if quality == LOW_QUALITY {
        LOW_PASSBAND_END
    } else {
        passband_end(spec.precision, recipe & STEEP_FILTER != 0)
    };
    if quality <= MEDIUM_QUALITY {
        spec.flags = (spec.flags & !ROLLOFF_MASK) | ROLLOFF_MEDIUM;
    }
    spec
}

/// Checks explicit quality parameters, returning the first problem found.
pub(crate) fn check_quality(spec: &RawQualitySpec) -> Option<&'static str> {
    if spec.flags & !KNOWN_FLAGS != 0 {
        return Some("unknown quality flag(s)");
    }
    if spec.flags & ROLLOFF_MASK == ROLLOFF_MASK {
        return Some("invalid rolloff");
    }
    if !(0.0..=33.0).contains(&spec.precision) {
        return Some("precision must be between 0 and 33 bits");
    }
    if !(0.0..=100.0).contains(&spec.phase_response) {
        return Some("phase response must be between 0 and 100");
    }
    if !(spec.passband_end > 0.0
        && spec.passband_end < spec.stopband_begin
        && spec.stopband_begin <= 1.0)
    {
        return Some("passband end must lie below stopband begin, within (0, 1]");
    }
    None
}

/// Checks runtime parameters, returning the first problem found.
pub(crate) fn check_runtime(
    log2_min_dft_size: u32,
    log2_large_dft_size: u32,
    coef_size_kbytes: u32,
) -> Option<&'static str> {
    if !(6..=20).contains(&log2_min_dft_size) || !(6..=20).contains(&log2_large_dft_size) {
        return Some("dft sizes must be between 2^6 and 2^20");
    }
    if log2_min_dft_size > log2_large_dft_size {
        return Some("minimum dft size exceeds large dft size");
    }
    if coef_size_kbytes == 0 {
        return Some("coefficient budget must be at least 1 kbyte");
    }
    None
}
