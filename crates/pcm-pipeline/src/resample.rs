//! Filter stage: downmix, resample and rechunk.
//!
//! Uses Rubato to convert decoded `f32` audio from the source rate to the fixed
//! target rate. Decoded units are downmixed to mono on the way in and buffered
//! until a full input chunk is available; each `receive` turns one chunk into one
//! output block. When the source already runs at the target rate the resampler is
//! skipped and chunks pass through untouched.
//!
//! ## End of stream
//! After `finish`, the buffered remainder is processed as a partial chunk, then
//! zero chunks are pushed until the resampler's delay line has produced exactly
//! `round(frames_in * ratio)` output frames. The number of zero chunks is sized
//! from the remaining delay and the chunk length, so small chunks still drain
//! the whole tail.
//!
//! Chunks whose output is entirely resampler latency are absorbed inside
//! `receive`; callers never see an empty block.

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

use crate::config::PipelineConfig;
use crate::engine::{DecodedUnit, EngineError, Feed, Filter, Poll};
use crate::error::{PipelineError, Result};

enum Conversion {
    Bypass,
    Sinc {
        resampler: Box<dyn Resampler<f32>>,
        out: Vec<f32>,
        ratio: f64,
        /// Leading output frames that are resampler latency, not signal.
        delay_left: usize,
    },
}

/// Rubato-backed [`Filter`] producing mono `f32` blocks at the configured rate.
pub struct RubatoFilter {
    source_rate: u32,
    chunk_frames: usize,
    pending: Vec<f32>,
    conversion: Conversion,
    finished: bool,
    frames_in: u64,
    frames_out: u64,
    flush_chunks: usize,
    /// Zero chunks allowed to drain the delay line, fixed at the first flush.
    flush_budget: Option<usize>,
}

impl RubatoFilter {
    pub fn new(source_rate: u32, config: &PipelineConfig) -> Result<Self> {
        if source_rate == 0 || config.target_rate == 0 {
            return Err(PipelineError::FilterGraphInitFailure(format!(
                "invalid rates {source_rate} Hz -> {} Hz",
                config.target_rate
            )));
        }

        let chunk_frames = config.chunk_frames.max(1);

        let conversion = if source_rate == config.target_rate {
            tracing::debug!(rate_hz = source_rate, "resample skipped");
            Conversion::Bypass
        } else {
            let ratio = config.target_rate as f64 / source_rate as f64;

            let sinc_len = 128;
            let window = WindowFunction::BlackmanHarris2;
            let params = SincInterpolationParameters {
                sinc_len,
                f_cutoff: calculate_cutoff(sinc_len, window),
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window,
            };

            let resampler =
                Async::<f32>::new_sinc(ratio, 1.1, &params, chunk_frames, 1, FixedAsync::Input)
                    .map_err(|e| PipelineError::FilterGraphInitFailure(e.to_string()))?;
            let out = vec![0.0f32; resampler.output_frames_max()];
            let delay_left = resampler.output_delay();

            tracing::debug!(
                from_hz = source_rate,
                to_hz = config.target_rate,
                chunk_frames,
                "resampling"
            );

            Conversion::Sinc {
                resampler: Box::new(resampler),
                out,
                ratio,
                delay_left,
            }
        };

        Ok(Self {
            source_rate,
            chunk_frames,
            pending: Vec::with_capacity(chunk_frames * 2),
            conversion,
            finished: false,
            frames_in: 0,
            frames_out: 0,
            flush_chunks: 0,
            flush_budget: None,
        })
    }

    /// Whether a resampler is active (false when source and target rates match).
    pub fn is_resampling(&self) -> bool {
        matches!(self.conversion, Conversion::Sinc { .. })
    }

    /// Run `frames` buffered mono frames through the conversion.
    fn process(&mut self, frames: usize) -> std::result::Result<Vec<f32>, EngineError> {
        let input: Vec<f32> = self.pending.drain(..frames).collect();

        let block = match &mut self.conversion {
            Conversion::Bypass => input,
            Conversion::Sinc {
                resampler,
                out,
                ratio,
                delay_left,
            } => {
                let produced = run_chunk(resampler.as_mut(), &input, self.chunk_frames, out)?;
                let skip = (*delay_left).min(produced);
                *delay_left -= skip;

                // A partial final chunk is zero-padded; keep only what the input accounts for.
                let mut end = produced;
                if self.finished {
                    let expected = (self.frames_in as f64 * *ratio).round() as u64;
                    let wanted = expected.saturating_sub(self.frames_out) as usize;
                    end = end.min(skip + wanted);
                }
                out[skip..end].to_vec()
            }
        };

        self.frames_out += block.len() as u64;
        Ok(block)
    }

    /// Push one zero chunk to drain the delay line, trimming to the expected length.
    fn flush(&mut self) -> std::result::Result<Poll<Vec<f32>>, EngineError> {
        let Conversion::Sinc {
            resampler,
            out,
            ratio,
            delay_left,
        } = &mut self.conversion
        else {
            return Ok(Poll::Exhausted);
        };

        let expected = (self.frames_in as f64 * *ratio).round() as u64;
        if self.frames_out >= expected {
            return Ok(Poll::Exhausted);
        }
        let missing = (expected - self.frames_out) as usize;
        let budget = *self
            .flush_budget
            .get_or_insert(flush_budget(*delay_left + missing, self.chunk_frames, *ratio));
        if self.flush_chunks >= budget {
            tracing::warn!(missing, budget, "resampler tail cut short");
            return Ok(Poll::Exhausted);
        }
        self.flush_chunks += 1;

        let produced = run_chunk(resampler.as_mut(), &[], self.chunk_frames, out)?;
        let skip = (*delay_left).min(produced);
        *delay_left -= skip;

        let wanted = expected.saturating_sub(self.frames_out) as usize;
        let end = produced.min(skip + wanted);
        let block = out[skip..end].to_vec();

        self.frames_out += block.len() as u64;
        Ok(Poll::Ready(block))
    }
}

impl Filter for RubatoFilter {
    fn feed(&mut self, unit: DecodedUnit) -> std::result::Result<Feed<DecodedUnit>, EngineError> {
        if self.finished {
            return Err(EngineError::new("filter fed after end of stream"));
        }
        if unit.rate != self.source_rate {
            return Err(EngineError::new(format!(
                "sample rate changed mid-stream: {} Hz -> {} Hz",
                self.source_rate, unit.rate
            )));
        }
        if unit.channels == 0 {
            return Err(EngineError::new("decoded unit has no channels"));
        }
        if self.pending.len() >= self.chunk_frames {
            return Ok(Feed::Busy(unit));
        }

        self.frames_in += unit.frames() as u64;
        downmix_into(&unit.samples, unit.channels, &mut self.pending);
        Ok(Feed::Accepted)
    }

    fn receive(&mut self) -> std::result::Result<Poll<Vec<f32>>, EngineError> {
        // Every empty step consumed a chunk or a flush slot, so this ends.
        loop {
            match self.step()? {
                Poll::Ready(block) if block.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl RubatoFilter {
    /// Produce at most one block from buffered input or the delay line.
    fn step(&mut self) -> std::result::Result<Poll<Vec<f32>>, EngineError> {
        if self.pending.len() >= self.chunk_frames {
            return self.process(self.chunk_frames).map(Poll::Ready);
        }
        if !self.finished {
            return Ok(Poll::Starved);
        }
        if !self.pending.is_empty() {
            return self.process(self.pending.len()).map(Poll::Ready);
        }
        self.flush()
    }
}

impl Drop for RubatoFilter {
    fn drop(&mut self) {
        tracing::debug!(
            frames_in = self.frames_in,
            frames_out = self.frames_out,
            "filter released"
        );
    }
}

/// Average interleaved frames down to one channel, appending to `out`.
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Zero chunks needed to push `frames` more output frames out of the delay line.
///
/// Each chunk yields about `chunk_frames * ratio` frames; one spare absorbs rounding.
fn flush_budget(frames: usize, chunk_frames: usize, ratio: f64) -> usize {
    (frames as f64 / (chunk_frames as f64 * ratio)).ceil() as usize + 1
}

/// Resample one (possibly partial) mono chunk into `out`, returning frames produced.
fn run_chunk(
    resampler: &mut dyn Resampler<f32>,
    input: &[f32],
    chunk_frames: usize,
    out: &mut [f32],
) -> std::result::Result<usize, EngineError> {
    let frames = input.len();
    let input_adapter = InterleavedSlice::new(input, 1, frames)
        .map_err(|e| EngineError::new(format!("interleaved slice (input) error: {e}")))?;

    let out_capacity_frames = out.len();
    let mut output_adapter = InterleavedSlice::new_mut(out, 1, out_capacity_frames)
        .map_err(|e| EngineError::new(format!("interleaved slice (output) error: {e}")))?;

    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: (frames < chunk_frames).then_some(frames),
    };

    let (_nbr_in, nbr_out) = resampler
        .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
        .map_err(|e| EngineError::new(format!("resampler process error: {e}")))?;

    Ok(nbr_out)
}
