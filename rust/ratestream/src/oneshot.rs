//! One-shot conversion.

use tracing::debug;

use crate::buffer::{InputBuffer, OutputBuffer};
use crate::config::{IoSpec, QualitySpec, RuntimeSpec};
use crate::error::Result;
use crate::session::{Progress, Resampler};

/// Converts all of `input` into `output` in one call.
///
/// A session is created, fed `input` with end of input signalled, and drained
/// until `output` is full or nothing more comes out. The result is the same as
/// streaming the same frames through a session in any number of pieces.
#[allow(clippy::too_many_arguments)]
pub fn oneshot(
    in_rate: f64,
    out_rate: f64,
    channels: usize,
    input: &InputBuffer<'_>,
    output: &mut OutputBuffer<'_>,
    io: IoSpec,
    quality: QualitySpec,
    runtime: RuntimeSpec,
) -> Result<Progress> {
    let mut session = Resampler::new(in_rate, out_rate, channels, io, quality, runtime)?;
    let in_shape = session.input_shape(input)?;
    let out_shape = session.output_shape(output)?;

    let mut total = Progress::default();
    loop {
        let rest_in = input.frames(in_shape, total.consumed..in_shape.frames);
        let mut rest_out = output.frames_mut(out_shape, total.produced..out_shape.frames);
        let step = session.process_last(&rest_in, &mut rest_out)?;
        total.consumed += step.consumed;
        total.produced += step.produced;
        if total.produced >= out_shape.frames || step == Progress::default() {
            break;
        }
    }

    debug!(
        engine = session.engine_name(),
        consumed = total.consumed,
        produced = total.produced,
        clips = session.clip_count(),
        "oneshot done"
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QualityFlags, Recipe};
    use crate::error::Error;
    use crate::sample::ElementType;

    #[test]
    fn test_oneshot_upsample_length() {
        let input: Vec<f32> = (0..100).map(|i| if i % 4 < 2 { 0.5 } else { -0.5 }).collect();
        let mut output = vec![0.0f32; 300];
        let done = oneshot(
            1.0,
            3.0,
            1,
            &InputBuffer::interleaved(&input[..]),
            &mut OutputBuffer::interleaved(&mut output[..]),
            IoSpec::default(),
            QualitySpec::from_recipe(Recipe::Medium, QualityFlags::default()).unwrap(),
            RuntimeSpec::default(),
        )
        .unwrap();
        assert_eq!(done, Progress { consumed: 100, produced: 300 });
    }

    #[test]
    fn test_oneshot_small_output() {
        let input = vec![0.25f64; 64];
        let mut output = vec![0.0f64; 10];
        let done = oneshot(
            8000.0,
            8000.0,
            2,
            &InputBuffer::interleaved(&input[..]),
            &mut OutputBuffer::interleaved(&mut output[..]),
            IoSpec::validate(ElementType::Float64, ElementType::Float64).unwrap(),
            QualitySpec::default(),
            RuntimeSpec::default(),
        )
        .unwrap();
        assert_eq!(done.produced, 5);
        assert_eq!(done.consumed, 5);
        assert!(output.iter().all(|&v| v == 0.25));
    }

    #[test]
    fn test_oneshot_errors() {
        let input = [0.0f32; 4];
        let mut output = [0i16; 4];
        let err = oneshot(
            8000.0,
            16000.0,
            1,
            &InputBuffer::interleaved(&input[..]),
            &mut OutputBuffer::interleaved(&mut output[..]),
            IoSpec::default(),
            QualitySpec::default(),
            RuntimeSpec::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Type(_)));

        let mut output = [0.0f32; 4];
        let err = oneshot(
            -1.0,
            16000.0,
            1,
            &InputBuffer::interleaved(&input[..]),
            &mut OutputBuffer::interleaved(&mut output[..]),
            IoSpec::default(),
            QualitySpec::default(),
            RuntimeSpec::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Create(_)));
    }
}
