//! Decode stage.
//!
//! Uses Symphonia to:
//! - build a codec session for the selected track
//! - decode one packet per `receive` into interleaved `f32` samples
//! - skip corrupt packets, up to a limit

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{Packet, Track};

use crate::engine::{DecodedUnit, Decoder, EngineError, Feed, InputUnit, Poll};
use crate::error::{PipelineError, Result};

// A decode error on a single packet is not fatal: drop the packet and try the next.
// More than this many in a row is.
const MAX_DECODE_RETRIES: usize = 3;

/// Metadata captured while probing the source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceInfo {
    /// Container track that is decoded.
    pub track_id: u32,
    /// Codec name (best-effort).
    pub codec: Option<String>,
    /// Source bit depth (best-effort).
    pub bit_depth: Option<u16>,
    /// Container/extension hint (best-effort).
    pub container: Option<String>,
    /// Source sample rate before resampling.
    pub sample_rate: Option<u32>,
    /// Source channel count before downmix.
    pub channels: Option<usize>,
    /// Total duration in milliseconds when the container reports it.
    pub duration_ms: Option<u64>,
}

impl SourceInfo {
    /// Capture what the track's codec parameters tell us.
    pub fn from_track(track: &Track, container: Option<&str>) -> Self {
        let params = &track.codec_params;
        Self {
            track_id: track.id,
            codec: codec_name_from_params(params),
            bit_depth: params
                .bits_per_sample
                .or(params.bits_per_coded_sample)
                .and_then(|v| u16::try_from(v).ok()),
            container: container.map(str::to_string),
            sample_rate: params.sample_rate,
            channels: params.channels.map(|c| c.count()),
            duration_ms: duration_ms_from_codec_params(params),
        }
    }
}

/// Symphonia codec session wrapped as a [`Decoder`].
///
/// Symphonia decodes synchronously, so a fed packet is only queued; the actual
/// decode happens on the next `receive`. At most one packet is held at a time.
pub struct SymphoniaDecoder {
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    queued: Option<Packet>,
    finished: bool,
    decode_errors: usize,
}

impl SymphoniaDecoder {
    pub fn new(codec_params: &CodecParameters) -> Result<Self> {
        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| PipelineError::DecoderInitFailure(e.to_string()))?;

        Ok(Self {
            decoder,
            queued: None,
            finished: false,
            decode_errors: 0,
        })
    }
}

impl Decoder for SymphoniaDecoder {
    fn feed(&mut self, unit: InputUnit) -> std::result::Result<Feed<InputUnit>, EngineError> {
        if self.queued.is_some() {
            return Ok(Feed::Busy(unit));
        }
        self.queued = Some(unit.packet);
        Ok(Feed::Accepted)
    }

    fn receive(&mut self) -> std::result::Result<Poll<DecodedUnit>, EngineError> {
        let Some(packet) = self.queued.take() else {
            return Ok(if self.finished {
                Poll::Exhausted
            } else {
                Poll::Starved
            });
        };

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                self.decode_errors = 0;
                let spec = *decoded.spec();
                let frames = decoded.frames();
                if frames == 0 {
                    // Priming/padding packets decode to nothing.
                    return Ok(Poll::Starved);
                }

                let mut sample_buf = SampleBuffer::<f32>::new(frames as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);

                Ok(Poll::Ready(DecodedUnit {
                    rate: spec.rate,
                    channels: spec.channels.count(),
                    samples: sample_buf.samples().to_vec(),
                }))
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                self.decode_errors += 1;
                if self.decode_errors > MAX_DECODE_RETRIES {
                    return Err(EngineError::new(format!(
                        "{} consecutive corrupt packets, last: {msg}",
                        self.decode_errors
                    )));
                }
                tracing::warn!(
                    track_id = packet.track_id(),
                    ts = packet.ts,
                    "skipping corrupt packet: {msg}"
                );
                Ok(Poll::Starved)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for SymphoniaDecoder {
    fn drop(&mut self) {
        tracing::debug!("decoder released");
    }
}

/// Best-effort duration in milliseconds from codec metadata.
///
/// Returns `None` if the container does not provide total frames or sample rate.
fn duration_ms_from_codec_params(codec_params: &CodecParameters) -> Option<u64> {
    let frames = codec_params.n_frames?;
    let rate = codec_params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

/// Best-effort codec label for diagnostics.
fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM_S24",
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM_S32",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
