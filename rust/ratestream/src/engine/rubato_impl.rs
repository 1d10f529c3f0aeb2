//! Rubato-based engine.
//!
//! Input frames are queued per channel and fed to a rubato resampler in fixed
//! blocks, so the output depends only on the concatenated input and never on
//! how a caller split it. At end of input the last block is zero-padded and
//! the stream is cut at `ceil(frames_in * out_rate / in_rate)` frames.

use std::collections::VecDeque;

use rubato::{
    FastFixedIn, FftFixedIn, PolynomialDegree, Resampler as RubatoResampler, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use super::Engine;
use super::convert::{self, Quantizer};
use crate::buffer::{InputBuffer, OutputBuffer};
use crate::config::{CoefInterpolation, IoSpec, QualityFlags, QualitySpec, RuntimeSpec};
use crate::error::{Error, Result};
use crate::shape::Shape;

/// Smallest sinc oversampling factor the coefficient budget may force.
const MIN_OVERSAMPLING: usize = 16;

/// How the kernel is built, kept so it can be rebuilt for a new channel count.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Plan {
    Passthrough,
    Poly {
        ratio: f64,
    },
    Sinc {
        ratio: f64,
        sinc_len: usize,
        f_cutoff: f32,
        oversampling: usize,
        cubic: bool,
    },
    Fft {
        in_rate: usize,
        out_rate: usize,
    },
}

impl Plan {
    fn choose(
        in_rate: f64,
        out_rate: f64,
        quality: &QualitySpec,
        runtime: &RuntimeSpec,
    ) -> Plan {
        let ratio = out_rate / in_rate;
        let precision = quality.precision();
        if in_rate == out_rate {
            return Plan::Passthrough;
        }
        if precision <= 0.0 {
            return Plan::Poly { ratio };
        }

        let integral = in_rate.fract() == 0.0
            && out_rate.fract() == 0.0
            && in_rate <= usize::MAX as f64
            && out_rate <= usize::MAX as f64;
        if integral
            && precision >= 20.0
            && !quality.flags().contains(QualityFlags::VARIABLE_RATE)
        {
            return Plan::Fft {
                in_rate: in_rate as usize,
                out_rate: out_rate as usize,
            };
        }

        let sinc_len = match precision {
            p if p <= 16.0 => 64,
            p if p <= 20.0 => 128,
            p if p <= 24.0 => 192,
            _ => 256,
        };
        let mut oversampling = if precision > 20.0 { 256 } else { 128 };
        let budget = runtime.coef_size_kbytes() as usize * 1024;
        while oversampling > MIN_OVERSAMPLING
            && sinc_len * oversampling * size_of::<f64>() > budget
        {
            oversampling /= 2;
        }
        let cubic = match runtime.coef_interpolation() {
            CoefInterpolation::Auto => precision > 16.0,
            CoefInterpolation::Low => false,
            CoefInterpolation::High => true,
        };
        let band = ((quality.passband_end() + quality.stopband_begin()) / 2.0) as f32;
        let window_cutoff: f32 =
            rubato::calculate_cutoff(sinc_len, WindowFunction::BlackmanHarris2);
        let f_cutoff = window_cutoff.min(band);

        Plan::Sinc {
            ratio,
            sinc_len,
            f_cutoff,
            oversampling,
            cubic,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Plan::Passthrough => "passthrough",
            Plan::Poly { .. } => "poly-cubic",
            Plan::Sinc { .. } => "sinc",
            Plan::Fft { .. } => "fft",
        }
    }
}

enum Kernel {
    Passthrough,
    Poly(FastFixedIn<f64>),
    Sinc(SincFixedIn<f64>),
    Fft(FftFixedIn<f64>),
}

impl Kernel {
    fn build(plan: Plan, chunk: usize, channels: usize) -> Result<Kernel> {
        let kernel = match plan {
            Plan::Passthrough => Kernel::Passthrough,
            Plan::Poly { ratio } => Kernel::Poly(FastFixedIn::<f64>::new(
                ratio,
                1.0,
                PolynomialDegree::Cubic,
                chunk,
                channels,
            )?),
            Plan::Sinc {
                ratio,
                sinc_len,
                f_cutoff,
                oversampling,
                cubic,
            } => {
                let params = SincInterpolationParameters {
                    sinc_len,
                    f_cutoff,
                    oversampling_factor: oversampling,
                    interpolation: if cubic {
                        SincInterpolationType::Cubic
                    } else {
                        SincInterpolationType::Linear
                    },
                    window: WindowFunction::BlackmanHarris2,
                };
                Kernel::Sinc(SincFixedIn::<f64>::new(ratio, 1.0, params, chunk, channels)?)
            }
            Plan::Fft { in_rate, out_rate } => Kernel::Fft(FftFixedIn::<f64>::new(
                in_rate, out_rate, chunk, 2, channels,
            )?),
        };
        Ok(kernel)
    }

    /// Frames the next block needs, or `None` when any amount will do.
    fn frames_next(&self) -> Option<usize> {
        match self {
            Kernel::Passthrough => None,
            Kernel::Poly(r) => Some(r.input_frames_next()),
            Kernel::Sinc(r) => Some(r.input_frames_next()),
            Kernel::Fft(r) => Some(r.input_frames_next()),
        }
    }

    fn output_frames_max(&self, chunk: usize) -> usize {
        match self {
            Kernel::Passthrough => chunk,
            Kernel::Poly(r) => r.output_frames_max(),
            Kernel::Sinc(r) => r.output_frames_max(),
            Kernel::Fft(r) => r.output_frames_max(),
        }
    }

    fn output_delay(&self) -> usize {
        match self {
            Kernel::Passthrough => 0,
            Kernel::Poly(r) => r.output_delay(),
            Kernel::Sinc(r) => r.output_delay(),
            Kernel::Fft(r) => r.output_delay(),
        }
    }

    fn reset(&mut self) {
        match self {
            Kernel::Passthrough => {}
            Kernel::Poly(r) => r.reset(),
            Kernel::Sinc(r) => r.reset(),
            Kernel::Fft(r) => r.reset(),
        }
    }

    /// Runs one block, returning (frames consumed, frames written).
    fn process<V: AsRef<[f64]>>(
        &mut self,
        input: &[V],
        output: &mut [Vec<f64>],
    ) -> Result<(usize, usize)> {
        let done = match self {
            Kernel::Passthrough => {
                let frames = input.first().map_or(0, |ch| ch.as_ref().len());
                let frames = frames.min(output.first().map_or(0, Vec::len));
                for (dst, src) in output.iter_mut().zip(input) {
                    dst[..frames].copy_from_slice(&src.as_ref()[..frames]);
                }
                (frames, frames)
            }
            Kernel::Poly(r) => r.process_into_buffer(input, output, None)?,
            Kernel::Sinc(r) => r.process_into_buffer(input, output, None)?,
            Kernel::Fft(r) => r.process_into_buffer(input, output, None)?,
        };
        Ok(done)
    }
}

impl From<rubato::ResamplerConstructionError> for Error {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        Error::Create(e.to_string())
    }
}

impl From<rubato::ResampleError> for Error {
    fn from(e: rubato::ResampleError) -> Self {
        Error::Engine(e.to_string())
    }
}

/// The default engine, built on rubato.
///
/// Equal rates are passed through with only format conversion. Otherwise the
/// quality spec picks the kernel: cubic interpolation for the quick recipe,
/// an FFT resampler for integral rates at 20 bits or more, and a windowed
/// sinc resampler for everything else.
pub struct RubatoEngine {
    plan: Plan,
    kernel: Kernel,
    ratio: f64,
    channels: usize,
    chunk: usize,
    /// Input not yet fed to the kernel.
    pending: Vec<Vec<f64>>,
    /// Kernel output not yet delivered.
    ready: Vec<VecDeque<f64>>,
    scratch: Vec<Vec<f64>>,
    /// Start-up frames still to discard.
    skip: usize,
    frames_in: u64,
    produced: u64,
    delivered: u64,
    flushing: bool,
    quantizer: Quantizer,
}

impl RubatoEngine {
    /// Creates an engine converting `in_rate` to `out_rate`.
    pub fn new(
        in_rate: f64,
        out_rate: f64,
        channels: usize,
        io: &IoSpec,
        quality: &QualitySpec,
        runtime: &RuntimeSpec,
    ) -> Result<Self> {
        if !(in_rate.is_finite() && in_rate > 0.0 && out_rate.is_finite() && out_rate > 0.0) {
            return Err(Error::Create(format!(
                "invalid rates: {in_rate} -> {out_rate}"
            )));
        }
        if channels == 0 {
            return Err(Error::Create("channel count must be at least 1".to_string()));
        }
        runtime
            .check()
            .map_err(|e| Error::Create(e.to_string()))?;

        let plan = Plan::choose(in_rate, out_rate, quality, runtime);
        let chunk = 1usize << runtime.log2_min_dft_size();
        let kernel = Kernel::build(plan, chunk, channels)?;

        debug!(
            in_rate,
            out_rate,
            channels,
            engine = plan.name(),
            chunk,
            threads = runtime.num_threads(),
            "resampling engine created"
        );

        let mut engine = Self {
            plan,
            kernel,
            ratio: out_rate / in_rate,
            channels,
            chunk,
            pending: Vec::new(),
            ready: Vec::new(),
            scratch: Vec::new(),
            skip: 0,
            frames_in: 0,
            produced: 0,
            delivered: 0,
            flushing: false,
            quantizer: Quantizer::new(io.scale(), io.dither()),
        };
        engine.reset_buffers();
        Ok(engine)
    }

    fn reset_buffers(&mut self) {
        let max_out = self.kernel.output_frames_max(self.chunk);
        self.pending = vec![Vec::new(); self.channels];
        self.ready = vec![VecDeque::new(); self.channels];
        self.scratch = vec![vec![0.0; max_out]; self.channels];
        self.skip = self.kernel.output_delay();
        self.frames_in = 0;
        self.produced = 0;
        self.delivered = 0;
        self.flushing = false;
    }

    /// Output frames the whole stream will have once input ends.
    fn target(&self) -> u64 {
        (self.frames_in as f64 * self.ratio).ceil() as u64
    }

    fn ready_frames(&self) -> usize {
        self.ready.first().map_or(0, VecDeque::len)
    }

    /// Runs one block through the kernel. Returns false when nothing can be
    /// done until more input arrives.
    fn step(&mut self) -> Result<bool> {
        let have = self.pending.first().map_or(0, Vec::len);
        let (used, written) = match self.kernel.frames_next() {
            None => {
                if have == 0 {
                    return Ok(false);
                }
                let take = have.min(self.chunk);
                let block: Vec<&[f64]> = self.pending.iter().map(|q| &q[..take]).collect();
                self.kernel.process(&block, &mut self.scratch)?
            }
            Some(need) => {
                if have < need {
                    if !self.flushing || self.produced >= self.target() {
                        return Ok(false);
                    }
                    for queue in &mut self.pending {
                        queue.resize(need, 0.0);
                    }
                }
                self.kernel.process(&self.pending, &mut self.scratch)?
            }
        };

        for queue in &mut self.pending {
            queue.drain(..used.min(queue.len()));
        }

        let skipped = written.min(self.skip);
        self.skip -= skipped;
        let mut fresh = written - skipped;
        if self.flushing {
            let room = self.target().saturating_sub(self.produced);
            fresh = fresh.min(usize::try_from(room).unwrap_or(usize::MAX));
        }
        for (queue, out) in self.ready.iter_mut().zip(&self.scratch) {
            queue.extend(&out[skipped..skipped + fresh]);
        }
        self.produced += fresh as u64;
        Ok(used > 0 || written > 0)
    }
}

impl Engine for RubatoEngine {
    fn name(&self) -> &str {
        self.plan.name()
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn set_channels(&mut self, channels: usize) -> Result<()> {
        if channels == 0 {
            return Err(Error::Config("channel count must be at least 1".to_string()));
        }
        if self.frames_in > 0 || self.flushing {
            return Err(Error::Config(
                "channel count cannot change once processing has started".to_string(),
            ));
        }
        if channels == self.channels {
            return Ok(());
        }
        self.kernel = Kernel::build(self.plan, self.chunk, channels)
            .map_err(|e| Error::Config(e.to_string()))?;
        self.channels = channels;
        self.reset_buffers();
        Ok(())
    }

    fn io_ratio(&self) -> f64 {
        1.0 / self.ratio
    }

    fn input(&mut self, buf: &InputBuffer<'_>, shape: Shape) -> Result<usize> {
        if self.flushing {
            return Ok(0);
        }
        convert::load_frames(buf, shape, &mut self.pending)?;
        self.frames_in += shape.frames as u64;
        Ok(shape.frames)
    }

    fn flush(&mut self) {
        self.flushing = true;
    }

    fn output(&mut self, buf: &mut OutputBuffer<'_>, shape: Shape) -> Result<usize> {
        let mut want = shape.frames;
        if self.flushing {
            let left = self.target().saturating_sub(self.delivered);
            want = want.min(usize::try_from(left).unwrap_or(usize::MAX));
        }
        while self.ready_frames() < want {
            if !self.step()? {
                break;
            }
        }
        let frames = self.ready_frames().min(want);
        convert::store_frames(&mut self.ready, frames, buf, shape, &mut self.quantizer)?;
        let was_drained = self.is_drained();
        self.delivered += frames as u64;
        if !was_drained && self.is_drained() {
            debug!(frames = self.delivered, clips = self.quantizer.clips(), "drain complete");
        }
        Ok(frames)
    }

    fn clear(&mut self) -> Result<()> {
        self.kernel.reset();
        self.reset_buffers();
        self.quantizer.reset();
        Ok(())
    }

    fn delay(&self) -> f64 {
        if self.is_drained() {
            return 0.0;
        }
        (self.frames_in as f64 * self.ratio - self.delivered as f64).max(0.0)
    }

    fn clips(&self) -> u64 {
        self.quantizer.clips()
    }

    fn is_drained(&self) -> bool {
        self.flushing && self.delivered >= self.target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Recipe;
    use crate::sample::Layout;

    fn quality(recipe: Recipe) -> QualitySpec {
        QualitySpec::from_recipe(recipe, QualityFlags::default()).unwrap()
    }

    fn engine(in_rate: f64, out_rate: f64, channels: usize, recipe: Recipe) -> RubatoEngine {
        RubatoEngine::new(
            in_rate,
            out_rate,
            channels,
            &IoSpec::validate(
                crate::sample::ElementType::Float64,
                crate::sample::ElementType::Float64,
            )
            .unwrap(),
            &quality(recipe),
            &RuntimeSpec::default(),
        )
        .unwrap()
    }

    fn mono(frames: usize) -> Shape {
        Shape {
            layout: Layout::Interleaved,
            frames,
            channels: 1,
        }
    }

    /// Feeds everything, flushes and collects the whole stream.
    fn run(engine: &mut RubatoEngine, input: &[f64]) -> Vec<f64> {
        let buf = InputBuffer::interleaved(input);
        assert_eq!(engine.input(&buf, mono(input.len())).unwrap(), input.len());
        engine.flush();
        let mut all = Vec::new();
        let mut out = vec![0.0f64; 100];
        loop {
            let n = {
                let mut ob = OutputBuffer::interleaved(&mut out[..]);
                engine.output(&mut ob, mono(100)).unwrap()
            };
            if n == 0 {
                break;
            }
            all.extend_from_slice(&out[..n]);
        }
        all
    }

    #[test]
    fn test_path_selection() {
        assert_eq!(engine(48000.0, 48000.0, 1, Recipe::High).name(), "passthrough");
        assert_eq!(engine(44100.0, 48000.0, 1, Recipe::Quick).name(), "poly-cubic");
        assert_eq!(engine(44100.0, 48000.0, 1, Recipe::High).name(), "fft");
        assert_eq!(engine(44100.0, 48000.0, 1, Recipe::Medium).name(), "sinc");
        assert_eq!(engine(44100.5, 48000.0, 1, Recipe::VeryHigh).name(), "sinc");
    }

    #[test]
    fn test_variable_rate_avoids_fft() {
        let q = QualitySpec::from_recipe(Recipe::High, QualityFlags::VARIABLE_RATE).unwrap();
        let plan = Plan::choose(16000.0, 48000.0, &q, &RuntimeSpec::default());
        assert_eq!(plan.name(), "sinc");
    }

    #[test]
    fn test_coef_budget_limits_oversampling() {
        let rt = RuntimeSpec::default().with_coef_size_kbytes(16).unwrap();
        let plan = Plan::choose(44100.5, 48000.0, &quality(Recipe::VeryHigh), &rt);
        match plan {
            Plan::Sinc {
                sinc_len,
                oversampling,
                ..
            } => {
                assert_eq!(sinc_len, 256);
                assert_eq!(oversampling, MIN_OVERSAMPLING);
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_create_errors() {
        let io = IoSpec::default();
        let q = QualitySpec::default();
        let rt = RuntimeSpec::default();
        assert!(matches!(
            RubatoEngine::new(0.0, 48000.0, 1, &io, &q, &rt),
            Err(Error::Create(_))
        ));
        assert!(matches!(
            RubatoEngine::new(f64::NAN, 48000.0, 1, &io, &q, &rt),
            Err(Error::Create(_))
        ));
        assert!(matches!(
            RubatoEngine::new(8000.0, 16000.0, 0, &io, &q, &rt),
            Err(Error::Create(_))
        ));
    }

    #[test]
    fn test_output_length_is_exact() {
        for (in_rate, out_rate, recipe, frames) in [
            (1.0, 2.0, Recipe::Low, 24),
            (16000.0, 48000.0, Recipe::High, 1500),
            (48000.0, 16000.0, Recipe::High, 1500),
            (44100.0, 48000.0, Recipe::Quick, 2000),
            (48000.0, 48000.0, Recipe::High, 333),
        ] {
            let mut e = engine(in_rate, out_rate, 1, recipe);
            let input: Vec<f64> = (0..frames).map(|i| ((i % 8) as f64 - 3.5) / 8.0).collect();
            let out = run(&mut e, &input);
            let want = (frames as f64 * out_rate / in_rate).ceil() as usize;
            assert_eq!(out.len(), want, "{in_rate} -> {out_rate}");
            assert!(e.is_drained());
            assert_eq!(e.delay(), 0.0);
        }
    }

    #[test]
    fn test_passthrough_is_identity() {
        let mut e = engine(8000.0, 8000.0, 1, Recipe::High);
        let input = [0.25, -0.5, 0.75, 0.0, 1.0];
        assert_eq!(run(&mut e, &input), input.to_vec());
    }

    #[test]
    fn test_dc_is_preserved() {
        let mut e = engine(16000.0, 24000.0, 1, Recipe::Medium);
        let input = vec![0.5; 4000];
        let out = run(&mut e, &input);
        let mid = &out[1000..5000];
        assert!(mid.iter().all(|v| (v - 0.5).abs() < 0.02));
    }

    #[test]
    fn test_input_after_flush_is_ignored() {
        let mut e = engine(8000.0, 16000.0, 1, Recipe::High);
        e.flush();
        let data = [0.0f64; 10];
        let buf = InputBuffer::interleaved(&data[..]);
        assert_eq!(e.input(&buf, mono(10)).unwrap(), 0);
    }

    #[test]
    fn test_set_channels() {
        let mut e = engine(8000.0, 16000.0, 1, Recipe::High);
        e.set_channels(2).unwrap();
        assert_eq!(e.channels(), 2);
        assert!(e.set_channels(0).is_err());

        let data = [0.0f64; 8];
        let buf = InputBuffer::interleaved(&data[..]);
        let shape = Shape {
            layout: Layout::Interleaved,
            frames: 4,
            channels: 2,
        };
        e.input(&buf, shape).unwrap();
        assert!(matches!(e.set_channels(1), Err(Error::Config(_))));

        e.clear().unwrap();
        e.set_channels(1).unwrap();
    }

    #[test]
    fn test_clear_restarts_stream() {
        let mut e = engine(16000.0, 24000.0, 1, Recipe::Medium);
        let input: Vec<f64> = (0..700).map(|i| (i as f64 * 0.01).sin()).collect();
        let first = run(&mut e, &input);
        e.clear().unwrap();
        assert!(!e.is_drained());
        assert_eq!(e.delay(), 0.0);
        let second = run(&mut e, &input);
        assert_eq!(first, second);
    }
}
