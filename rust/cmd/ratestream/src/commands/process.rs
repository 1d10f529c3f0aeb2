//! Push mode: blocks read from stdin are handed to the session.

use std::io::{self, BufWriter, Write};

use anyhow::{Result, anyhow};
use clap::Args;
use tracing::info;

use ratestream::{InputProvider, OutputBuffer, SampleReader, resolve};

use super::{StreamArgs, write_samples};

#[derive(Args, Debug)]
pub struct ProcessCommand {
    #[command(flatten)]
    pub stream: StreamArgs,
}

impl ProcessCommand {
    pub fn run(&self) -> Result<()> {
        let args = &self.stream;
        let channels = args.channels;
        let mut resampler = args.session()?;
        let (ilen, olen) = args.block_sizes();

        let mut reader = SampleReader::<_, f32>::new(io::stdin().lock(), channels);
        let mut out = BufWriter::new(io::stdout().lock());
        let mut obuf = vec![0.0f32; olen * channels];
        let mut total = 0usize;

        loop {
            let block = reader
                .provide(ilen)
                .map_err(|e| anyhow!("read stdin: {e}"))?;
            let shape = resolve(&block, channels)?;
            if shape.frames == 0 {
                break;
            }
            let mut pos = 0;
            while pos < shape.frames {
                let rest = block.frames(shape, pos..shape.frames);
                let step = resampler.process(
                    Some(&rest),
                    &mut OutputBuffer::interleaved(&mut obuf[..]),
                )?;
                pos += step.consumed;
                total += step.produced;
                write_samples(&mut out, &obuf[..step.produced * channels])?;
            }
        }

        loop {
            let step = resampler.process(None, &mut OutputBuffer::interleaved(&mut obuf[..]))?;
            if step.produced == 0 {
                break;
            }
            total += step.produced;
            write_samples(&mut out, &obuf[..step.produced * channels])?;
        }
        out.flush()?;

        info!(frames = total, clips = resampler.clip_count(), "process done");
        eprintln!(
            "{} clips; engine {}",
            resampler.clip_count(),
            resampler.engine_name()
        );
        Ok(())
    }
}
