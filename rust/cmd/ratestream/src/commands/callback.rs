//! Pull mode: the session reads stdin through an input provider.

use std::io::{self, BufWriter, Write};

use anyhow::{Result, anyhow};
use clap::Args;
use tracing::info;

use ratestream::{OutputBuffer, SampleReader};

use super::{StreamArgs, write_samples};

#[derive(Args, Debug)]
pub struct CallbackCommand {
    #[command(flatten)]
    pub stream: StreamArgs,
}

impl CallbackCommand {
    pub fn run(&self) -> Result<()> {
        let args = &self.stream;
        let channels = args.channels;
        let mut resampler = args.session()?;
        let (ilen, olen) = args.block_sizes();

        resampler.set_input_provider(SampleReader::<_, f32>::new(io::stdin(), channels), ilen)?;

        let mut out = BufWriter::new(io::stdout().lock());
        let mut obuf = vec![0.0f32; olen * channels];
        let mut total = 0usize;
        let result = loop {
            match resampler.output(&mut OutputBuffer::interleaved(&mut obuf[..])) {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    total += n;
                    write_samples(&mut out, &obuf[..n * channels])?;
                }
                Err(err) => break Err(anyhow!(err)),
            }
        };
        out.flush()?;

        info!(frames = total, clips = resampler.clip_count(), "callback done");
        eprintln!(
            "{}; {} clips; engine {}",
            match &result {
                Ok(()) => "no error".to_string(),
                Err(err) => err.to_string(),
            },
            resampler.clip_count(),
            resampler.engine_name()
        );
        result
    }
}
