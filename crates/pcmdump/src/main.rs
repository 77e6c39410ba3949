//! pcmdump: decode an audio file and write raw PCM to stdout.
//!
//! Output is mono little-endian `f32` at 44.1 kHz, ready to pipe into a player:
//!
//! ```text
//! pcmdump song.flac | ffplay -f f32le -ar 44100 -ac 1 -
//! ```
//!
//! With `--bpm` it prints an estimated tempo instead.
//!
//! Logs go to stderr so stdout carries only samples.

use std::io::Write;

use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pcmdump::{cli, runtime};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,pcmdump=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.into_config();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match config.bpm {
        Some(precision) => match runtime::run_bpm(&config, precision)? {
            Some(bpm) => writeln!(out, "{bpm:.2}")?,
            None => bail!("{}: no audio decoded", config.path.display()),
        },
        None => {
            runtime::run_dump(&config, &mut out)?;
        }
    }
    Ok(())
}
