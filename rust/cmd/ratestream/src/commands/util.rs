//! Arguments and helpers shared by the stdin commands.

use std::io::{self, Write};

use anyhow::Result;
use clap::{Args, ValueEnum};

use ratestream::{IoSpec, QualityFlags, QualitySpec, Recipe, Resampler, RuntimeSpec};

/// Frames shared between the input and output blocks of the stdin commands.
const BLOCK_FRAMES: usize = 15000;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Quality {
    Quick,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl From<Quality> for Recipe {
    fn from(q: Quality) -> Self {
        match q {
            Quality::Quick => Recipe::Quick,
            Quality::Low => Recipe::Low,
            Quality::Medium => Recipe::Medium,
            Quality::High => Recipe::High,
            Quality::VeryHigh => Recipe::VeryHigh,
        }
    }
}

/// Rates and channel count shared by the stdin commands.
#[derive(Args, Debug)]
pub struct StreamArgs {
    /// Input sample rate
    #[arg(default_value_t = 96000.0)]
    pub in_rate: f64,

    /// Output sample rate
    #[arg(default_value_t = 44100.0)]
    pub out_rate: f64,

    /// Number of interleaved channels
    #[arg(default_value_t = 1)]
    pub channels: usize,

    /// Conversion quality
    #[arg(short, long, value_enum, default_value_t = Quality::High)]
    pub quality: Quality,

    /// Worker threads hint
    #[arg(long, default_value_t = 1)]
    pub threads: u32,
}

impl StreamArgs {
    pub fn session(&self) -> Result<Resampler> {
        let quality = QualitySpec::from_recipe(self.quality.into(), QualityFlags::default())?;
        let resampler = Resampler::new(
            self.in_rate,
            self.out_rate,
            self.channels,
            IoSpec::default(),
            quality,
            RuntimeSpec::for_threads(self.threads),
        )?;
        Ok(resampler)
    }

    /// Splits [`BLOCK_FRAMES`] between input and output in proportion to the
    /// rates.
    pub fn block_sizes(&self) -> (usize, usize) {
        let total = self.in_rate + self.out_rate;
        let out = (self.out_rate * BLOCK_FRAMES as f64 / total).round() as usize;
        let out = out.clamp(1, BLOCK_FRAMES - 1);
        (BLOCK_FRAMES - out, out)
    }
}

pub fn write_samples(w: &mut impl Write, samples: &[f32]) -> io::Result<()> {
    for s in samples {
        w.write_all(&s.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(in_rate: f64, out_rate: f64) -> StreamArgs {
        StreamArgs {
            in_rate,
            out_rate,
            channels: 1,
            quality: Quality::High,
            threads: 1,
        }
    }

    #[test]
    fn test_block_sizes() {
        assert_eq!(args(96000.0, 44100.0).block_sizes(), (10278, 4722));
        assert_eq!(args(8000.0, 8000.0).block_sizes(), (7500, 7500));
        assert_eq!(args(1.0e9, 1.0).block_sizes(), (14999, 1));
    }
}
