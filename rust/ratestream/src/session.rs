//! Streaming resampler session.

use tracing::{debug, trace, warn};

use crate::buffer::{BufferView, InputBuffer, OutputBuffer};
use crate::config::{IoSpec, QualitySpec, RuntimeSpec};
use crate::engine::{self, Engine};
use crate::error::{Error, Result};
use crate::provider::{BoxError, FnProvider, InputProvider};
use crate::shape::{self, Shape};

/// Lifecycle state of a [`Resampler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// No data exchanged since creation or the last `clear`.
    Created,
    /// Processing.
    Active,
    /// End of input signalled; buffered output is being drained.
    Draining,
    /// The engine has been torn down.
    Closed,
}

/// Frames consumed and produced by one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Progress {
    pub consumed: usize,
    pub produced: usize,
}

struct Registered {
    provider: Box<dyn InputProvider + Send>,
    max_frames: usize,
}

/// A streaming sample-rate converter.
///
/// Input is pushed with [`process`](Resampler::process) or pulled from a
/// registered provider by [`output`](Resampler::output). Either way, frames
/// consumed need not match frames produced on any one call: the session keeps
/// what it has not converted yet, and callers keep calling until the stream is
/// drained.
///
/// Calls on one session must not overlap. Distinct sessions are independent.
///
/// ```no_run
/// use ratestream::{InputBuffer, OutputBuffer, Resampler};
///
/// let mut resampler = Resampler::with_defaults(44100.0, 48000.0, 1)?;
/// let input = vec![0.0f32; 4410];
/// let mut output = vec![0.0f32; 4800];
///
/// let step = resampler.process(
///     Some(&InputBuffer::interleaved(&input[..])),
///     &mut OutputBuffer::interleaved(&mut output[..]),
/// )?;
/// assert!(step.consumed <= input.len());
/// # Ok::<(), ratestream::Error>(())
/// ```
pub struct Resampler {
    engine: Option<Box<dyn Engine>>,
    io: IoSpec,
    channels: usize,
    state: State,
    provider: Option<Registered>,
    /// Terminal engine error, replayed by every later call.
    fault: Option<Error>,
    /// Provider error held back because its `output` call had produced frames.
    deferred: Option<Error>,
    engine_name: String,
    /// Clip count kept after `close`.
    clips: u64,
}

impl Resampler {
    /// Creates a session converting `in_rate` to `out_rate` for `channels`
    /// channels.
    pub fn new(
        in_rate: f64,
        out_rate: f64,
        channels: usize,
        io: IoSpec,
        quality: QualitySpec,
        runtime: RuntimeSpec,
    ) -> Result<Self> {
        let engine = engine::create(in_rate, out_rate, channels, &io, &quality, &runtime)?;
        Ok(Self::from_engine(engine, io))
    }

    /// Creates a session with f32 input and output, high quality and one
    /// thread.
    pub fn with_defaults(in_rate: f64, out_rate: f64, channels: usize) -> Result<Self> {
        Self::new(
            in_rate,
            out_rate,
            channels,
            IoSpec::default(),
            QualitySpec::default(),
            RuntimeSpec::default(),
        )
    }

    /// Wraps an existing engine.
    pub fn from_engine(engine: Box<dyn Engine>, io: IoSpec) -> Self {
        let channels = engine.channels();
        let engine_name = engine.name().to_string();
        debug!(engine = %engine_name, channels, input = %io.input(), output = %io.output(), "resampler ready");
        Self {
            engine: Some(engine),
            io,
            channels,
            state: State::Created,
            provider: None,
            fault: None,
            deferred: None,
            engine_name,
            clips: 0,
        }
    }

    /// Converts frames from `input` into `output`.
    ///
    /// Passing `None` signals end of input: the session starts draining, and
    /// later calls return the remaining output until they produce nothing.
    /// At most `ceil(output frames * in_rate / out_rate)` input frames are
    /// taken per call; the caller resubmits the rest.
    ///
    /// A provider error held back by an earlier [`output`](Resampler::output)
    /// call is returned here too, before any input is taken.
    pub fn process(
        &mut self,
        input: Option<&InputBuffer<'_>>,
        output: &mut OutputBuffer<'_>,
    ) -> Result<Progress> {
        self.step(input, output, false)
    }

    /// Like [`process`](Resampler::process), and signals end of input once
    /// all of `input` has been taken.
    pub fn process_last(
        &mut self,
        input: &InputBuffer<'_>,
        output: &mut OutputBuffer<'_>,
    ) -> Result<Progress> {
        self.step(Some(input), output, true)
    }

    fn step(
        &mut self,
        input: Option<&InputBuffer<'_>>,
        output: &mut OutputBuffer<'_>,
        last: bool,
    ) -> Result<Progress> {
        self.check_usable()?;
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let out_shape = self.output_shape(output)?;
        let in_shape = input.map(|buf| self.input_shape(buf)).transpose()?;
        let ratio = self.io_ratio();

        let mut consumed = 0;
        let flush = match (input, in_shape) {
            (Some(buf), Some(shape)) => {
                let take = shape.frames.min(frames_for(out_shape.frames, ratio));
                if take > 0 && self.state != State::Draining {
                    let view = buf.frames(shape, 0..take);
                    let view_shape = Shape {
                        frames: take,
                        ..shape
                    };
                    consumed = self.with_engine(|e| e.input(&view, view_shape))?;
                }
                last && take == shape.frames
            }
            _ => true,
        };

        if flush {
            self.start_draining()?;
        } else if self.state == State::Created {
            self.state = State::Active;
        }

        let produced = self.with_engine(|e| e.output(output, out_shape))?;
        trace!(consumed, produced, state = ?self.state, "process");
        Ok(Progress { consumed, produced })
    }

    /// Registers the pull-mode input source, replacing any previous one.
    ///
    /// The provider is asked for at most `max_frames` frames per call
    /// (0 means no limit). Output already returned is not affected.
    pub fn set_input_provider<P>(&mut self, provider: P, max_frames: usize) -> Result<()>
    where
        P: InputProvider + Send + 'static,
    {
        self.check_usable()?;
        let max_frames = if max_frames == 0 {
            usize::MAX
        } else {
            max_frames
        };
        if self.provider.is_some() {
            debug!(max_frames, "input provider replaced");
        } else {
            debug!(max_frames, "input provider registered");
        }
        self.provider = Some(Registered {
            provider: Box::new(provider),
            max_frames,
        });
        self.deferred = None;
        Ok(())
    }

    /// Registers a closure as the pull-mode input source.
    pub fn set_input_fn<F>(&mut self, f: F, max_frames: usize) -> Result<()>
    where
        F: FnMut(usize) -> std::result::Result<InputBuffer<'static>, BoxError> + Send + 'static,
    {
        self.set_input_provider(FnProvider(f), max_frames)
    }

    /// Fills `output`, pulling input from the registered provider as needed.
    ///
    /// Returns fewer frames than requested only at the end of the stream or
    /// when the provider fails after some frames were written; in the latter
    /// case the provider error is returned by the next call.
    pub fn output(&mut self, output: &mut OutputBuffer<'_>) -> Result<usize> {
        self.check_usable()?;
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let out_shape = self.output_shape(output)?;
        if self.provider.is_none() {
            return Err(Error::NoProvider);
        }
        if self.state == State::Created {
            self.state = State::Active;
        }

        let total = out_shape.frames;
        let mut done = 0;
        while done < total {
            let rest = Shape {
                frames: total - done,
                ..out_shape
            };
            let produced = {
                let mut view = output.frames_mut(out_shape, done..total);
                self.with_engine(|e| e.output(&mut view, rest))?
            };
            done += produced;
            if done == total {
                break;
            }
            if self.state == State::Draining {
                if produced == 0 {
                    break;
                }
                continue;
            }
            if let Err(err) = self.pull(total - done) {
                if err.is_fatal() || done == 0 {
                    return Err(err);
                }
                warn!(error = %err, produced = done, "input provider failed, reporting on next call");
                self.deferred = Some(err);
                break;
            }
        }
        trace!(produced = done, state = ?self.state, "output");
        Ok(done)
    }

    /// Asks the provider for input worth `remaining` output frames and feeds
    /// it to the engine.
    fn pull(&mut self, remaining: usize) -> Result<()> {
        let ratio = self.io_ratio();
        let expected = self.io.input();
        let channels = self.channels;

        let fed = {
            let registered = self.provider.as_mut().ok_or(Error::NoProvider)?;
            let request = frames_for(remaining, ratio)
                .min(registered.max_frames)
                .max(1);
            let buf = registered
                .provider
                .provide(request)
                .map_err(|e| Error::Provider(e.to_string()))?;
            if buf.element_type() != expected {
                return Err(Error::Provider(format!(
                    "provider returned {} samples, expected {expected}",
                    buf.element_type()
                )));
            }
            let shape = shape::resolve(&buf, channels)?;
            if shape.frames > request {
                return Err(Error::Provider(format!(
                    "provider returned {} frames, at most {request} requested",
                    shape.frames
                )));
            }
            if shape.frames == 0 {
                None
            } else {
                let engine = self.engine.as_deref_mut().ok_or(Error::Closed)?;
                Some(engine.input(&buf, shape))
            }
        };

        match fed {
            None => self.start_draining(),
            Some(result) => {
                let taken = self.record(result)?;
                trace!(requested = remaining, taken, "pulled input");
                Ok(())
            }
        }
    }

    fn start_draining(&mut self) -> Result<()> {
        if self.state != State::Draining {
            self.with_engine(|e| {
                e.flush();
                Ok(())
            })?;
            self.state = State::Draining;
            debug!("end of input, draining");
        }
        Ok(())
    }

    /// Drops buffered input and output and returns to [`State::Created`].
    ///
    /// Configuration, the registered provider and the clip count are kept.
    pub fn clear(&mut self) -> Result<()> {
        self.check_usable()?;
        self.with_engine(|e| e.clear())?;
        self.state = State::Created;
        self.deferred = None;
        debug!("resampler cleared");
        Ok(())
    }

    /// Changes the channel count. Only allowed before any data has been
    /// exchanged (after creation or `clear`).
    pub fn reconfigure_channels(&mut self, channels: usize) -> Result<()> {
        self.check_usable()?;
        if channels == 0 {
            return Err(Error::Config("channel count must be at least 1".to_string()));
        }
        if self.state != State::Created {
            return Err(Error::Config(format!(
                "cannot change channel count while {:?}",
                self.state
            )));
        }
        self.with_engine(|e| e.set_channels(channels))?;
        debug!(from = self.channels, to = channels, "channel count changed");
        self.channels = channels;
        Ok(())
    }

    /// Returns the output frames still buffered inside the engine.
    pub fn delay(&self) -> f64 {
        self.engine.as_ref().map_or(0.0, |e| e.delay())
    }

    /// Returns the number of output samples clamped since creation.
    pub fn clip_count(&self) -> u64 {
        self.engine.as_ref().map_or(self.clips, |e| e.clips())
    }

    /// Returns the name of the processing path in use.
    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn io_spec(&self) -> &IoSpec {
        &self.io
    }

    /// Returns the engine error that made this session unusable, if any.
    pub fn error(&self) -> Option<&Error> {
        self.fault.as_ref()
    }

    /// Returns true once end of input was signalled and all output delivered.
    pub fn is_drained(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_drained())
    }

    /// Tears the engine down. Later calls fail with [`Error::Closed`];
    /// `clip_count`, `delay` and `engine_name` keep answering.
    pub fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.clips = engine.clips();
            debug!(clips = self.clips, "resampler closed");
        }
        self.provider = None;
        self.deferred = None;
        self.state = State::Closed;
    }

    fn check_usable(&self) -> Result<()> {
        if self.state == State::Closed || self.engine.is_none() {
            return Err(Error::Closed);
        }
        match &self.fault {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn io_ratio(&self) -> f64 {
        self.engine.as_ref().map_or(1.0, |e| e.io_ratio())
    }

    pub(crate) fn input_shape(&self, buf: &InputBuffer<'_>) -> Result<Shape> {
        if buf.element_type() != self.io.input() {
            return Err(Error::Type(format!(
                "input buffer holds {} samples, expected {}",
                buf.element_type(),
                self.io.input()
            )));
        }
        Ok(shape::resolve(buf, self.channels)?)
    }

    pub(crate) fn output_shape(&self, buf: &OutputBuffer<'_>) -> Result<Shape> {
        if buf.element_type() != self.io.output() {
            return Err(Error::Type(format!(
                "output buffer holds {} samples, expected {}",
                buf.element_type(),
                self.io.output()
            )));
        }
        Ok(shape::resolve(buf, self.channels)?)
    }

    fn with_engine<T>(&mut self, f: impl FnOnce(&mut dyn Engine) -> Result<T>) -> Result<T> {
        let engine = self.engine.as_deref_mut().ok_or(Error::Closed)?;
        let result = f(engine);
        self.record(result)
    }

    /// Keeps fatal errors so later calls replay them.
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() {
                warn!(error = %err, "engine failed, resampler is unusable");
                self.fault = Some(err.clone());
            }
        }
        result
    }
}

/// Input frames worth `out_frames` output frames.
fn frames_for(out_frames: usize, io_ratio: f64) -> usize {
    (out_frames as f64 * io_ratio).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::ElementType;

    fn passthrough(channels: usize) -> Resampler {
        let io = IoSpec::default();
        Resampler::new(
            8000.0,
            8000.0,
            channels,
            io,
            QualitySpec::default(),
            RuntimeSpec::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mut r = passthrough(1);
        assert_eq!(r.state(), State::Created);

        let input = [0.1f32, 0.2, 0.3];
        let mut out = [0.0f32; 3];
        let step = r
            .process(
                Some(&InputBuffer::interleaved(&input[..])),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap();
        assert_eq!(r.state(), State::Active);
        assert_eq!(step, Progress { consumed: 3, produced: 3 });
        assert_eq!(out, input);

        r.process(None, &mut OutputBuffer::interleaved(&mut out[..]))
            .unwrap();
        assert_eq!(r.state(), State::Draining);
        assert!(r.is_drained());

        r.clear().unwrap();
        assert_eq!(r.state(), State::Created);

        r.close();
        assert_eq!(r.state(), State::Closed);
        assert_eq!(r.clear(), Err(Error::Closed));
    }

    #[test]
    fn test_consumption_is_limited_by_output() {
        let mut r = passthrough(1);
        let input = [0.5f32; 10];
        let mut out = [0.0f32; 4];
        let step = r
            .process(
                Some(&InputBuffer::interleaved(&input[..])),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap();
        assert_eq!(step.consumed, 4);
        assert_eq!(step.produced, 4);
    }

    #[test]
    fn test_process_last_flushes_only_when_all_taken() {
        let mut r = passthrough(1);
        let input = [0.5f32; 6];
        let mut out = [0.0f32; 4];
        let step = r
            .process_last(
                &InputBuffer::interleaved(&input[..]),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap();
        assert_eq!(step.consumed, 4);
        assert_ne!(r.state(), State::Draining);

        let step = r
            .process_last(
                &InputBuffer::interleaved(&input[4..]),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap();
        assert_eq!(step, Progress { consumed: 2, produced: 2 });
        assert_eq!(r.state(), State::Draining);
        assert!(r.is_drained());
    }

    #[test]
    fn test_type_and_shape_errors_are_not_fatal() {
        let mut r = passthrough(2);
        let wrong = [0i16; 4];
        let mut out = [0.0f32; 4];
        let err = r
            .process(
                Some(&InputBuffer::interleaved(&wrong[..])),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Type(_)));

        let a = [0.0f32; 2];
        let err = r
            .process(
                Some(&InputBuffer::planar([&a[..], &a[..], &a[..]])),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Shape(_)));

        assert!(r.error().is_none());
        assert_eq!(r.state(), State::Created);
    }

    #[test]
    fn test_output_without_provider() {
        let mut r = passthrough(1);
        let mut out = [0.0f32; 4];
        assert_eq!(
            r.output(&mut OutputBuffer::interleaved(&mut out[..])),
            Err(Error::NoProvider)
        );
    }

    #[test]
    fn test_reconfigure_channels() {
        let mut r = passthrough(1);
        r.reconfigure_channels(2).unwrap();
        assert_eq!(r.channels(), 2);
        assert!(matches!(r.reconfigure_channels(0), Err(Error::Config(_))));

        let input = [0.0f32; 4];
        let mut out = [0.0f32; 4];
        r.process(
            Some(&InputBuffer::interleaved(&input[..])),
            &mut OutputBuffer::interleaved(&mut out[..]),
        )
        .unwrap();
        assert!(matches!(r.reconfigure_channels(1), Err(Error::Config(_))));

        r.clear().unwrap();
        r.reconfigure_channels(1).unwrap();
    }

    #[test]
    fn test_close_keeps_introspection() {
        let mut r = Resampler::new(
            8000.0,
            8000.0,
            1,
            IoSpec::validate(ElementType::Float32, ElementType::Int16)
                .unwrap()
                .without_dither(),
            QualitySpec::default(),
            RuntimeSpec::default(),
        )
        .unwrap();
        let input = [2.0f32];
        let mut out = [0i16; 1];
        r.process_last(
            &InputBuffer::interleaved(&input[..]),
            &mut OutputBuffer::interleaved(&mut out[..]),
        )
        .unwrap();
        assert_eq!(out, [i16::MAX]);
        assert_eq!(r.clip_count(), 1);

        r.close();
        assert_eq!(r.clip_count(), 1);
        assert_eq!(r.engine_name(), "passthrough");
        assert_eq!(r.delay(), 0.0);
        assert!(r.set_input_fn(|_| Ok(InputBuffer::empty(ElementType::Float32)), 0).is_err());
    }

    #[test]
    fn test_deferred_provider_error_reaches_process() {
        let mut r = passthrough(1);
        let mut calls = 0;
        r.set_input_fn(
            move |n| {
                calls += 1;
                if calls == 1 {
                    Ok(InputBuffer::owned_interleaved(vec![0.5f32; n]))
                } else {
                    Err("read failed".into())
                }
            },
            2,
        )
        .unwrap();

        let mut out = [0.0f32; 4];
        assert_eq!(r.output(&mut OutputBuffer::interleaved(&mut out[..])), Ok(2));

        let input = [0.25f32; 2];
        let err = r
            .process(
                Some(&InputBuffer::interleaved(&input[..])),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap_err();
        assert_eq!(err, Error::Provider("read failed".to_string()));

        // Reported once; nothing was taken by the failed call.
        let step = r
            .process(
                Some(&InputBuffer::interleaved(&input[..])),
                &mut OutputBuffer::interleaved(&mut out[..]),
            )
            .unwrap();
        assert_eq!(step, Progress { consumed: 2, produced: 2 });
        assert_eq!(&out[..2], &[0.25, 0.25]);
    }

    #[test]
    fn test_frames_for() {
        assert_eq!(frames_for(48, 0.5), 24);
        assert_eq!(frames_for(10, 1.0 / 3.0), 4);
        assert_eq!(frames_for(0, 2.0), 0);
    }
}
