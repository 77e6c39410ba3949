//! Dump runtime.
//!
//! Opens one pipeline, streams its output to a writer through a fixed staging
//! buffer, then closes the pipeline and reports how decoding ended. The tempo
//! mode reads the same stream but reduces it to a single estimate.

use std::io::{self, Write};

use anyhow::{Context, Result};
use pcm_pipeline::{Pipeline, SAMPLE_BYTES};

use crate::bpm::BpmEstimator;
use crate::config::{BpmPrecision, DumpConfig, DumpMode};

/// Size of the caller-owned staging buffer, in bytes.
pub const STAGING_BYTES: usize = 64 * 1024;

/// Decode `config.path` and write the raw `f32le` stream to `out`.
///
/// Returns the number of bytes written. A reader that hangs up early (broken
/// pipe) ends the dump without an error.
pub fn run_dump<W: Write>(config: &DumpConfig, out: &mut W) -> Result<u64> {
    let mut pipeline = Pipeline::open(&config.path, &config.pipeline)
        .with_context(|| format!("open {}", config.path.display()))?;

    let mut written = 0u64;
    let streamed = match config.mode {
        DumpMode::Buffers => dump_buffers(&mut pipeline, out, &mut written),
        DumpMode::Samples => dump_staged(
            pipeline.samples().flat_map(f32::to_le_bytes),
            out,
            &mut written,
        ),
        DumpMode::Bytes => dump_staged(pipeline.le_bytes(), out, &mut written),
    }
    .and_then(|()| out.flush());

    let closed = pipeline.close();

    match streamed {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::info!(bytes = written, "output closed by reader");
            return Ok(written);
        }
        Err(e) => return Err(e).context("write output"),
    }

    closed.with_context(|| format!("decode {}", config.path.display()))?;
    tracing::info!(bytes = written, mode = ?config.mode, "dump complete");
    Ok(written)
}

/// Decode `config.path` and estimate its tempo in beats per minute.
///
/// Returns `None` when the stream decodes to no samples.
pub fn run_bpm(config: &DumpConfig, precision: BpmPrecision) -> Result<Option<f32>> {
    let mut pipeline = Pipeline::open(&config.path, &config.pipeline)
        .with_context(|| format!("open {}", config.path.display()))?;

    let estimator = BpmEstimator::new(precision, config.pipeline.target_rate);
    let bpm = estimator.estimate(pipeline.samples());

    pipeline
        .close()
        .with_context(|| format!("decode {}", config.path.display()))?;

    match bpm {
        Some(bpm) => tracing::info!(bpm, ?precision, "tempo estimated"),
        None => tracing::warn!("no samples decoded; tempo unknown"),
    }
    Ok(bpm)
}

/// Write each buffer the pipeline hands out, capped to the staging size.
fn dump_buffers<W: Write>(
    pipeline: &mut Pipeline,
    out: &mut W,
    written: &mut u64,
) -> io::Result<()> {
    let mut staging = Vec::with_capacity(STAGING_BYTES);
    // A read error ends the loop; `close` reports it.
    while let Ok(Some(samples)) = pipeline.next_buffer(STAGING_BYTES / SAMPLE_BYTES) {
        staging.clear();
        staging.extend(samples.iter().flat_map(|v| v.to_le_bytes()));
        out.write_all(&staging)?;
        *written += staging.len() as u64;
    }
    Ok(())
}

/// Collect bytes into the staging buffer and write it whenever it fills.
fn dump_staged<W: Write>(
    bytes: impl Iterator<Item = u8>,
    out: &mut W,
    written: &mut u64,
) -> io::Result<()> {
    let mut staging = Vec::with_capacity(STAGING_BYTES);
    for byte in bytes {
        staging.push(byte);
        if staging.len() == STAGING_BYTES {
            out.write_all(&staging)?;
            *written += staging.len() as u64;
            staging.clear();
        }
    }
    if !staging.is_empty() {
        out.write_all(&staging)?;
        *written += staging.len() as u64;
    }
    Ok(())
}
