//! ratestream - resample raw audio from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{CallbackCommand, OneshotCommand, ProcessCommand};

/// ratestream - resample raw audio from the command line.
///
/// The `process` and `callback` commands read interleaved little-endian f32
/// samples from stdin and write resampled f32 samples to stdout:
///
///   sox in.wav -t f32 - | ratestream process 48000 16000 > out.f32
#[derive(Parser)]
#[command(name = "ratestream")]
#[command(about = "Streaming sample-rate conversion")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logs on stderr)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upsample a short square wave to split stereo and print it
    Oneshot(OneshotCommand),
    /// Resample stdin to stdout, pushing input blocks into the session
    Process(ProcessCommand),
    /// Resample stdin to stdout, letting the session pull its input
    Callback(CallbackCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG overrides the default level.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Oneshot(cmd) => cmd.run(),
        Commands::Process(cmd) => cmd.run(),
        Commands::Callback(cmd) => cmd.run(),
    }
}
