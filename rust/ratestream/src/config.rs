//! Configuration specs for a resampling session.
//!
//! Three bundles configure a session: [`IoSpec`] (sample types, scale and
//! dither), [`QualitySpec`] (precision and filter shape) and [`RuntimeSpec`]
//! (processing sizes and threading hints). Each is validated when it is built,
//! so a session never sees an invalid combination.

use std::ops::BitOr;

use crate::engine;
use crate::error::{Error, Result};
use crate::sample::ElementType;

/// Sample types and output conditioning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IoSpec {
    input: ElementType,
    output: ElementType,
    scale: f64,
    flags: u32,
}

impl IoSpec {
    /// Validates an input/output element type pair.
    pub fn validate(input: ElementType, output: ElementType) -> Result<Self> {
        Self::from_codes(input.code(), output.code())
    }

    /// Builds a spec from datatype codes.
    ///
    /// The planar bit (4) is accepted and dropped: layout travels with each
    /// buffer instead.
    pub fn from_codes(itype: u32, otype: u32) -> Result<Self> {
        let raw = engine::io_spec(itype, otype);
        if let Some(msg) = raw.error {
            return Err(Error::Type(msg.to_string()));
        }
        let element = |code: u32| {
            ElementType::from_code(code & 3)
                .ok_or_else(|| Error::Type(format!("invalid datatype code {code}")))
        };
        Ok(Self {
            input: element(raw.itype)?,
            output: element(raw.otype)?,
            scale: raw.scale,
            flags: raw.flags,
        })
    }

    /// Multiplies every output sample by `scale`.
    pub fn with_scale(self, scale: f64) -> Result<Self> {
        if !scale.is_finite() {
            return Err(Error::Config(format!("scale must be finite, got {scale}")));
        }
        Ok(Self { scale, ..self })
    }

    /// Disables TPDF dither on 16-bit output.
    pub fn without_dither(self) -> Self {
        Self {
            flags: self.flags | engine::NO_DITHER,
            ..self
        }
    }

    /// Returns the input element type.
    pub fn input(&self) -> ElementType {
        self.input
    }

    /// Returns the output element type.
    pub fn output(&self) -> ElementType {
        self.output
    }

    /// Returns the output scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Returns true if 16-bit output is dithered.
    pub fn dither(&self) -> bool {
        self.flags & engine::NO_DITHER == 0
    }
}

impl Default for IoSpec {
    fn default() -> Self {
        Self {
            input: ElementType::Float32,
            output: ElementType::Float32,
            scale: 1.0,
            flags: 0,
        }
    }
}

/// Named quality recipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipe {
    /// Cubic interpolation, no anti-aliasing filter.
    Quick,
    /// 16-bit precision with a narrow passband.
    Low,
    /// 16-bit precision.
    Medium,
    /// 20-bit precision.
    High,
    /// 28-bit precision.
    VeryHigh,
    Bits16,
    Bits20,
    Bits24,
    Bits28,
    Bits32,
}

impl Recipe {
    /// Returns the recipe code.
    pub const fn code(self) -> u32 {
        match self {
            Recipe::Quick => 0,
            Recipe::Low => 1,
            Recipe::Medium => 2,
            Recipe::Bits16 => 3,
            Recipe::High | Recipe::Bits20 => 4,
            Recipe::Bits24 => 5,
            Recipe::VeryHigh | Recipe::Bits28 => 6,
            Recipe::Bits32 => 7,
        }
    }
}

/// Filter phase response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseResponse {
    Linear,
    Intermediate,
    Minimum,
    /// A value between 0 (minimum) and 100 (maximum).
    Custom(f64),
}

impl PhaseResponse {
    /// Returns the phase response as a value between 0 and 100.
    pub fn value(self) -> f64 {
        match self {
            PhaseResponse::Linear => 50.0,
            PhaseResponse::Intermediate => 25.0,
            PhaseResponse::Minimum => 0.0,
            PhaseResponse::Custom(v) => v,
        }
    }
}

/// Passband rolloff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rolloff {
    /// Under 0.01 dB.
    Small,
    /// Under 0.35 dB.
    Medium,
    /// For Chebyshev bandwidth.
    None,
}

/// Quality flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QualityFlags(u32);

impl QualityFlags {
    pub const ROLLOFF_SMALL: Self = Self(0);
    pub const ROLLOFF_MEDIUM: Self = Self(engine::ROLLOFF_MEDIUM);
    pub const ROLLOFF_NONE: Self = Self(2);
    pub const HI_PREC_CLOCK: Self = Self(engine::HI_PREC_CLOCK);
    pub const DOUBLE_PRECISION: Self = Self(engine::DOUBLE_PRECISION);
    pub const VARIABLE_RATE: Self = Self(engine::VARIABLE_RATE);

    /// Wraps raw flag bits. Unknown bits are rejected when a quality spec is
    /// built from them.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw flag bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the rolloff the flags select, or `None` for the invalid
    /// value 3.
    pub fn rolloff(self) -> Option<Rolloff> {
        match self.0 & engine::ROLLOFF_MASK {
            0 => Some(Rolloff::Small),
            1 => Some(Rolloff::Medium),
            2 => Some(Rolloff::None),
            _ => None,
        }
    }
}

impl BitOr for QualityFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Quality parameters, fixed for the life of a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySpec {
    precision: f64,
    phase_response: f64,
    passband_end: f64,
    stopband_begin: f64,
    flags: QualityFlags,
}

impl QualitySpec {
    /// Derives the parameters of a named recipe.
    pub fn from_recipe(recipe: Recipe, flags: QualityFlags) -> Result<Self> {
        let raw = engine::quality_spec(recipe.code(), flags.bits());
        Self::checked(raw)
    }

    /// Builds a fully explicit spec.
    ///
    /// `passband_end` and `stopband_begin` are fractions of the lower of the
    /// two Nyquist frequencies.
    pub fn explicit(
        precision: f64,
        phase: PhaseResponse,
        passband_end: f64,
        stopband_begin: f64,
        flags: QualityFlags,
    ) -> Result<Self> {
        Self::checked(engine::RawQualitySpec {
            precision,
            phase_response: phase.value(),
            passband_end,
            stopband_begin,
            flags: flags.bits(),
            error: None,
        })
    }

    fn checked(raw: engine::RawQualitySpec) -> Result<Self> {
        if let Some(msg) = raw.error.or_else(|| engine::check_quality(&raw)) {
            return Err(Error::Config(msg.to_string()));
        }
        Ok(Self {
            precision: raw.precision,
            phase_response: raw.phase_response,
            passband_end: raw.passband_end,
            stopband_begin: raw.stopband_begin,
            flags: QualityFlags(raw.flags),
        })
    }

    /// Replaces the phase response.
    pub fn with_phase(self, phase: PhaseResponse) -> Result<Self> {
        let value = phase.value();
        if !(0.0..=100.0).contains(&value) {
            return Err(Error::Config(format!(
                "phase response must be between 0 and 100, got {value}"
            )));
        }
        Ok(Self {
            phase_response: value,
            ..self
        })
    }

    /// Moves the passband end closer to the stopband.
    pub fn steep(self) -> Self {
        Self {
            passband_end: engine::passband_end(self.precision, true),
            ..self
        }
    }

    /// Returns the precision in bits (0 for cubic interpolation).
    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Returns the phase response, 0 (minimum) to 100.
    pub fn phase_response(&self) -> f64 {
        self.phase_response
    }

    /// Returns the passband end as a fraction of Nyquist.
    pub fn passband_end(&self) -> f64 {
        self.passband_end
    }

    /// Returns the stopband begin as a fraction of Nyquist.
    pub fn stopband_begin(&self) -> f64 {
        self.stopband_begin
    }

    /// Returns the quality flags.
    pub fn flags(&self) -> QualityFlags {
        self.flags
    }
}

impl Default for QualitySpec {
    fn default() -> Self {
        let raw = engine::quality_spec(Recipe::High.code(), 0);
        Self {
            precision: raw.precision,
            phase_response: raw.phase_response,
            passband_end: raw.passband_end,
            stopband_begin: raw.stopband_begin,
            flags: QualityFlags(raw.flags),
        }
    }
}

/// How the engine interpolates between filter coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoefInterpolation {
    /// Chosen from the precision.
    #[default]
    Auto,
    /// Linear.
    Low,
    /// Cubic.
    High,
}

/// Processing size and threading hints.
///
/// These never change what comes out of a session, only how it is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeSpec {
    log2_min_dft_size: u32,
    log2_large_dft_size: u32,
    coef_size_kbytes: u32,
    num_threads: u32,
    coef_interpolation: CoefInterpolation,
}

impl RuntimeSpec {
    /// Returns the default hints with `num_threads` worker threads
    /// (0 lets the engine decide).
    pub fn for_threads(num_threads: u32) -> Self {
        Self {
            log2_min_dft_size: 10,
            log2_large_dft_size: 17,
            coef_size_kbytes: 400,
            num_threads,
            coef_interpolation: CoefInterpolation::Auto,
        }
    }

    /// Sets the minimum and large transform sizes, as powers of two.
    pub fn with_dft_sizes(self, log2_min: u32, log2_large: u32) -> Result<Self> {
        if let Some(msg) = engine::check_runtime(log2_min, log2_large, self.coef_size_kbytes) {
            return Err(Error::Config(msg.to_string()));
        }
        Ok(Self {
            log2_min_dft_size: log2_min,
            log2_large_dft_size: log2_large,
            ..self
        })
    }

    /// Caps the filter coefficient tables at `kbytes` kilobytes.
    pub fn with_coef_size_kbytes(self, kbytes: u32) -> Result<Self> {
        if let Some(msg) =
            engine::check_runtime(self.log2_min_dft_size, self.log2_large_dft_size, kbytes)
        {
            return Err(Error::Config(msg.to_string()));
        }
        Ok(Self {
            coef_size_kbytes: kbytes,
            ..self
        })
    }

    /// Sets the coefficient interpolation.
    pub fn with_coef_interpolation(self, interpolation: CoefInterpolation) -> Self {
        Self {
            coef_interpolation: interpolation,
            ..self
        }
    }

    pub fn log2_min_dft_size(&self) -> u32 {
        self.log2_min_dft_size
    }

    pub fn log2_large_dft_size(&self) -> u32 {
        self.log2_large_dft_size
    }

    pub fn coef_size_kbytes(&self) -> u32 {
        self.coef_size_kbytes
    }

    pub fn num_threads(&self) -> u32 {
        self.num_threads
    }

    pub fn coef_interpolation(&self) -> CoefInterpolation {
        self.coef_interpolation
    }

    /// Checks the hints again, for values built elsewhere.
    pub(crate) fn check(&self) -> Result<()> {
        match engine::check_runtime(
            self.log2_min_dft_size,
            self.log2_large_dft_size,
            self.coef_size_kbytes,
        ) {
            Some(msg) => Err(Error::Config(msg.to_string())),
            None => Ok(()),
        }
    }
}

impl Default for RuntimeSpec {
    fn default() -> Self {
        Self::for_threads(1)
    }
}
