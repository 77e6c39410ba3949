//! Container demultiplexing stage.
//!
//! Uses Symphonia to open and probe the input container, pick the audio track,
//! and hand out packets one at a time. Packets of every track are returned; the
//! pipeline drops the ones that do not belong to the selected track.

use std::fs::File;
use std::io;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::{Demuxer, EngineError, InputUnit, Poll, ProbedSource};
use crate::error::{PipelineError, Result};

/// Symphonia `FormatReader` wrapped as a [`Demuxer`].
pub struct SymphoniaDemuxer {
    format: Box<dyn FormatReader>,
    container: Option<String>,
}

impl SymphoniaDemuxer {
    /// Open and probe a local file, using its extension as a probe hint.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| PipelineError::OpenFailure(format!("{}: {e}", path.display())))?;

        let container = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let mut hint = Hint::new();
        if let Some(ext) = &container {
            hint.with_extension(ext);
        }

        let mut demuxer = Self::from_media_source(Box::new(file), hint)?;
        demuxer.container = container;
        Ok(demuxer)
    }

    /// Probe an arbitrary Symphonia [`MediaSource`].
    pub fn from_media_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PipelineError::OpenFailure(e.to_string()))?;

        Ok(Self {
            format: probed.format,
            container: None,
        })
    }
}

impl ProbedSource for SymphoniaDemuxer {
    fn tracks(&self) -> &[Track] {
        self.format.tracks()
    }

    fn default_track(&self) -> Option<&Track> {
        self.format.default_track()
    }

    /// Label derived from the file extension, when known.
    fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }
}

impl Demuxer for SymphoniaDemuxer {
    fn read(&mut self) -> std::result::Result<Poll<InputUnit>, EngineError> {
        match self.format.next_packet() {
            Ok(packet) => Ok(Poll::Ready(InputUnit::new(packet))),
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Ok(Poll::Exhausted)
            }
            // Chained streams need a fresh decoder; we only ever decode the first one.
            Err(SymphoniaError::ResetRequired) => {
                tracing::debug!("container requested decoder reset; ending stream");
                Ok(Poll::Exhausted)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for SymphoniaDemuxer {
    fn drop(&mut self) {
        tracing::debug!("demuxer released");
    }
}

/// Whether a track looks like decodable audio.
fn is_audio(track: &Track) -> bool {
    track.codec_params.codec != CODEC_TYPE_NULL && track.codec_params.sample_rate.is_some()
}

/// Prefer the container's default track when it is audio, otherwise the first audio track.
pub(crate) fn select_audio_track<'a>(
    default: Option<&'a Track>,
    tracks: &'a [Track],
) -> Result<&'a Track> {
    default
        .filter(|t| is_audio(t))
        .or_else(|| tracks.iter().find(|t| is_audio(t)))
        .ok_or(PipelineError::NoAudioTrack)
}
