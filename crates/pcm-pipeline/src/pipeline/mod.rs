//! Demand-driven decode pipeline: state, lifecycle and the three stage drivers.
//!
//! Nothing runs ahead of demand. A read that finds the current block consumed calls
//! `pull_filtered`; a starved filter calls `pull_decoded`; a
//! starved decoder calls `pull_input`, which reads exactly one packet.
//! Starvation never crosses a stage boundary: every driver answers `Delivered`,
//! `Exhausted` or an error, and the caller retries one level down on starvation.
//!
//! ## End of stream
//! When the source runs dry the decoder is told `finish` once and drained; when the
//! decoder is drained the filter is told `finish` once and drained. Only when the
//! filter itself reports exhaustion does the pipeline report end of stream, so a
//! final partial block is always delivered.

mod cursor;
#[cfg(test)]
mod scripted;

pub use cursor::{Bytes, SAMPLE_BYTES, Samples};

use std::path::Path;

use crate::config::PipelineConfig;
use crate::decode::{SourceInfo, SymphoniaDecoder};
use crate::engine::{
    DecodedUnit, Decoder, Demuxer, Feed, Filter, InputUnit, Poll, ProbedSource, Stage,
};
use crate::error::{PipelineError, Result};
use crate::resample::RubatoFilter;
use crate::source::{SymphoniaDemuxer, select_audio_track};
use crate::status::{PipelineState, Status};

/// Consecutive empty filter blocks tolerated before the filter counts as stalled.
const MAX_EMPTY_BLOCKS: usize = 64;

/// Outcome of one stage pull.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pull {
    /// The stage made forward progress; the caller should retry its own engine.
    Delivered,
    Exhausted,
}

/// End-of-stream progress of one stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Flow {
    #[default]
    Open,
    /// `finish` was signalled; buffered output is still draining.
    Draining,
    Done,
}

/// One open audio source, decoded on demand to mono `f32` at a fixed rate.
///
/// The pipeline exclusively owns its three engine handles. They are released in
/// the order filter, decoder, source, either by [`Pipeline::close`], on the first
/// terminal error, or on drop.
pub struct Pipeline {
    filter: Option<Box<dyn Filter>>,
    decoder: Option<Box<dyn Decoder>>,
    source: Option<Box<dyn Demuxer>>,
    selected_track: u32,

    /// Packet the decoder answered `Busy` to; re-offered before any new read.
    pending_input: Option<InputUnit>,
    /// Decoded unit the filter answered `Busy` to; re-offered before any new decode.
    pending_decoded: Option<DecodedUnit>,

    source_flow: Flow,
    decode_flow: Flow,
    filter_flow: Flow,

    current: Vec<f32>,
    position: usize,
    byte_offset: usize,

    status: Status,
    info: SourceInfo,
    closed: bool,
}

impl Pipeline {
    /// Open `path`, select its audio track and build the decode/filter chain.
    pub fn open(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "opening");
        Self::from_source(SymphoniaDemuxer::open(path)?, config)
    }

    /// Select the audio track of an already-probed source and build the
    /// decode/filter chain behind it.
    ///
    /// Each step can fail on its own; whatever was already built is released
    /// (decoder before source) before the error is returned.
    pub fn from_source<S>(source: S, config: &PipelineConfig) -> Result<Self>
    where
        S: ProbedSource + 'static,
    {
        let track = select_audio_track(source.default_track(), source.tracks())?.clone();
        let info = SourceInfo::from_track(&track, source.container());

        let decoder = SymphoniaDecoder::new(&track.codec_params)?;

        let source_rate = track.codec_params.sample_rate.unwrap_or(0);
        let filter = RubatoFilter::new(source_rate, config)?;

        tracing::info!(
            container = info.container.as_deref().unwrap_or("unknown"),
            track_id = track.id,
            codec = info.codec.as_deref().unwrap_or("unknown"),
            from_hz = source_rate,
            to_hz = config.target_rate,
            resampling = filter.is_resampling(),
            "pipeline open"
        );

        Ok(Self::from_engines(
            Box::new(source),
            Box::new(decoder),
            Box::new(filter),
            track.id,
            info,
        ))
    }

    /// Assemble a pipeline from already-constructed engines.
    ///
    /// Packets whose track differs from `selected_track` are dropped.
    pub fn from_engines(
        source: Box<dyn Demuxer>,
        decoder: Box<dyn Decoder>,
        filter: Box<dyn Filter>,
        selected_track: u32,
        info: SourceInfo,
    ) -> Self {
        Self {
            filter: Some(filter),
            decoder: Some(decoder),
            source: Some(source),
            selected_track,
            pending_input: None,
            pending_decoded: None,
            source_flow: Flow::Open,
            decode_flow: Flow::Open,
            filter_flow: Flow::Open,
            current: Vec::new(),
            position: 0,
            byte_offset: 0,
            status: Status::default(),
            info,
            closed: false,
        }
    }

    pub fn source_info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn selected_track(&self) -> u32 {
        self.selected_track
    }

    pub fn state(&self) -> PipelineState {
        match self.status.state() {
            PipelineState::Ready if self.position >= self.current.len() => PipelineState::Starved,
            state => state,
        }
    }

    /// The terminal error, if the pipeline failed.
    pub fn error(&self) -> Option<&PipelineError> {
        self.status.error()
    }

    /// Release all engines and buffers.
    ///
    /// Idempotent and safe at any point. Returns the terminal error when the
    /// pipeline failed; every call returns the same result. Unread output is
    /// discarded and later reads report end of stream.
    pub fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.release();
            if !self.status.state().is_terminal() {
                self.status = Status::Exhausted;
            }
            tracing::debug!("pipeline closed");
        }

        match self.status.error() {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        if self.filter.take().is_some() {
            tracing::trace!("filter handle dropped");
        }
        if self.decoder.take().is_some() {
            tracing::trace!("decoder handle dropped");
        }
        if self.source.take().is_some() {
            tracing::trace!("source handle dropped");
        }
        self.pending_decoded = None;
        self.pending_input = None;
        self.current = Vec::new();
        self.position = 0;
        self.byte_offset = 0;
    }

    /// Replace the consumed block with the next one. `Ok(false)` is end of stream.
    fn advance(&mut self) -> Result<bool> {
        match &self.status {
            Status::Exhausted => return Ok(false),
            Status::Errored(e) => return Err(e.clone()),
            Status::Ready | Status::Starved => {}
        }

        self.status = Status::Starved;
        match self.pull_filtered() {
            Ok(Pull::Delivered) => {
                self.status = Status::Ready;
                Ok(true)
            }
            Ok(Pull::Exhausted) => {
                tracing::debug!("end of stream");
                self.status = Status::Exhausted;
                Ok(false)
            }
            Err(e) => {
                tracing::error!(stage = ?e.stage(), "pipeline failed: {e}");
                self.status = Status::Errored(e.clone());
                self.release();
                Err(e)
            }
        }
    }

    /// Produce one output block into `current`.
    fn pull_filtered(&mut self) -> Result<Pull> {
        let mut empty_blocks = 0usize;
        loop {
            if self.filter_flow == Flow::Done {
                return Ok(Pull::Exhausted);
            }

            match self
                .filter_mut()?
                .receive()
                .map_err(|e| PipelineError::receive(Stage::Filter, e))?
            {
                Poll::Ready(block) if block.is_empty() => {
                    empty_blocks += 1;
                    if empty_blocks > MAX_EMPTY_BLOCKS {
                        return Err(PipelineError::receive(
                            Stage::Filter,
                            format!("{empty_blocks} empty blocks in a row"),
                        ));
                    }
                    continue;
                }
                Poll::Ready(block) => {
                    self.current = block;
                    self.position = 0;
                    self.byte_offset = 0;
                    return Ok(Pull::Delivered);
                }
                Poll::Exhausted => {
                    self.filter_flow = Flow::Done;
                    return Ok(Pull::Exhausted);
                }
                Poll::Starved => {}
            }

            match self.pull_decoded()? {
                Pull::Delivered => {}
                Pull::Exhausted if self.filter_flow == Flow::Open => {
                    tracing::debug!("decoder drained; flushing filter");
                    self.filter_flow = Flow::Draining;
                    self.filter_mut()?.finish();
                }
                Pull::Exhausted => {
                    self.filter_flow = Flow::Done;
                    return Ok(Pull::Exhausted);
                }
            }
        }
    }

    /// Decode one unit and hand it to the filter.
    fn pull_decoded(&mut self) -> Result<Pull> {
        if let Some(unit) = self.pending_decoded.take() {
            return self.feed_filter(unit, true);
        }

        loop {
            if self.decode_flow == Flow::Done {
                return Ok(Pull::Exhausted);
            }

            match self
                .decoder_mut()?
                .receive()
                .map_err(|e| PipelineError::receive(Stage::Decode, e))?
            {
                Poll::Ready(unit) => return self.feed_filter(unit, false),
                Poll::Exhausted => {
                    self.decode_flow = Flow::Done;
                    return Ok(Pull::Exhausted);
                }
                Poll::Starved => {}
            }

            match self.pull_input()? {
                Pull::Delivered => {}
                Pull::Exhausted if self.decode_flow == Flow::Open => {
                    tracing::debug!("source exhausted; draining decoder");
                    self.decode_flow = Flow::Draining;
                    self.decoder_mut()?.finish();
                }
                Pull::Exhausted => {
                    self.decode_flow = Flow::Done;
                    return Ok(Pull::Exhausted);
                }
            }
        }
    }

    /// Read one packet and, if it belongs to the selected track, feed the decoder.
    fn pull_input(&mut self) -> Result<Pull> {
        let (unit, reoffer) = match self.pending_input.take() {
            Some(unit) => (unit, true),
            None => {
                if self.source_flow == Flow::Done {
                    return Ok(Pull::Exhausted);
                }

                match self
                    .source_mut()?
                    .read()
                    .map_err(|e| PipelineError::receive(Stage::Source, e))?
                {
                    Poll::Ready(unit) => (unit, false),
                    Poll::Starved => return Ok(Pull::Delivered),
                    Poll::Exhausted => {
                        self.source_flow = Flow::Done;
                        return Ok(Pull::Exhausted);
                    }
                }
            }
        };

        if unit.track_id() != self.selected_track {
            tracing::trace!(track_id = unit.track_id(), "dropping packet of unselected track");
            return Ok(Pull::Delivered);
        }

        match self
            .decoder_mut()?
            .feed(unit)
            .map_err(|e| PipelineError::feed(Stage::Decode, e))?
        {
            Feed::Accepted => {}
            Feed::Busy(_) if reoffer => return Err(stalled(Stage::Decode)),
            Feed::Busy(unit) => self.pending_input = Some(unit),
        }
        Ok(Pull::Delivered)
    }

    fn feed_filter(&mut self, unit: DecodedUnit, reoffer: bool) -> Result<Pull> {
        match self
            .filter_mut()?
            .feed(unit)
            .map_err(|e| PipelineError::feed(Stage::Filter, e))?
        {
            Feed::Accepted => {}
            Feed::Busy(_) if reoffer => return Err(stalled(Stage::Filter)),
            Feed::Busy(unit) => self.pending_decoded = Some(unit),
        }
        Ok(Pull::Delivered)
    }

    fn source_mut(&mut self) -> Result<&mut Box<dyn Demuxer>> {
        self.source.as_mut().ok_or_else(|| released(Stage::Source))
    }

    fn decoder_mut(&mut self) -> Result<&mut Box<dyn Decoder>> {
        self.decoder.as_mut().ok_or_else(|| released(Stage::Decode))
    }

    fn filter_mut(&mut self) -> Result<&mut Box<dyn Filter>> {
        self.filter.as_mut().ok_or_else(|| released(Stage::Filter))
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn released(stage: Stage) -> PipelineError {
    PipelineError::receive(stage, "engine handle already released")
}

/// A stage that refuses input while reporting starvation can never make progress.
fn stalled(stage: Stage) -> PipelineError {
    PipelineError::feed(stage, "refused input while starved")
}

#[cfg(test)]
mod tests {
    use symphonia::core::audio::Channels;
    use symphonia::core::codecs::{CODEC_TYPE_OPUS, CODEC_TYPE_PCM_S16LE, CodecParameters};
    use symphonia::core::formats::Track;

    use super::scripted::*;
    use super::*;

    fn collect_samples(pipeline: &mut Pipeline) -> Vec<f32> {
        let mut out = Vec::new();
        while let Some(v) = pipeline.next_sample().unwrap() {
            out.push(v);
        }
        out
    }

    #[test]
    fn starvation_never_drops_or_duplicates_samples() {
        let chunks: Vec<Vec<u8>> = (0u8..12).map(|i| (i * 5..i * 5 + 5).collect()).collect();
        let expected: Vec<f32> = chunks.iter().flatten().map(|&b| sample_for(b)).collect();

        for lag in [0, 1, 3] {
            for block in [1, 3, 7, 64] {
                let mut pipeline = build(
                    ScriptedDemuxer::packets(TRACK, &chunks),
                    ScriptedDecoder::new().with_lag(lag),
                    ScriptedFilter::new(block),
                );
                assert_eq!(
                    collect_samples(&mut pipeline),
                    expected,
                    "lag={lag} block={block}"
                );
            }
        }
    }

    #[test]
    fn demuxer_starvation_is_transparent() {
        let demuxer = ScriptedDemuxer::new(vec![
            Step::Starve,
            Step::Unit(packet(TRACK, &[1, 2])),
            Step::Starve,
            Step::Starve,
            Step::Unit(packet(TRACK, &[3])),
        ]);
        let mut pipeline = build(demuxer, ScriptedDecoder::new(), ScriptedFilter::new(2));
        assert_eq!(
            collect_samples(&mut pipeline),
            vec![sample_for(1), sample_for(2), sample_for(3)]
        );
    }

    #[test]
    fn packets_of_other_tracks_are_dropped() {
        let demuxer = ScriptedDemuxer::new(vec![
            Step::Unit(packet(TRACK + 1, &[90, 91])),
            Step::Unit(packet(TRACK, &[1])),
            Step::Unit(packet(TRACK + 2, &[92])),
            Step::Unit(packet(TRACK, &[2, 3])),
        ]);
        let mut pipeline = build(demuxer, ScriptedDecoder::new(), ScriptedFilter::new(8));
        assert_eq!(
            collect_samples(&mut pipeline),
            vec![sample_for(1), sample_for(2), sample_for(3)]
        );
    }

    #[test]
    fn flushed_tail_is_delivered_before_end() {
        let chunks = vec![(0u8..10).collect::<Vec<_>>()];
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &chunks),
            ScriptedDecoder::new().with_lag(1),
            ScriptedFilter::new(4),
        );

        let mut sizes = Vec::new();
        while let Some(block) = pipeline.next_block().unwrap() {
            sizes.push(block.len());
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(pipeline.state(), PipelineState::Exhausted);
    }

    #[test]
    fn single_block_source_yields_one_buffer_then_end() {
        let chunks = vec![(0u8..20).collect::<Vec<_>>()];
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &chunks),
            ScriptedDecoder::new(),
            ScriptedFilter::new(1024),
        );

        let first = pipeline.next_block().unwrap().map(<[f32]>::to_vec);
        assert_eq!(first.map(|b| b.len()), Some(20));
        assert!(pipeline.next_block().unwrap().is_none());
    }

    #[test]
    fn exhaustion_is_monotonic_across_read_modes() {
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &[vec![7]]),
            ScriptedDecoder::new(),
            ScriptedFilter::new(4),
        );
        assert_eq!(pipeline.next_sample().unwrap(), Some(sample_for(7)));
        assert_eq!(pipeline.next_sample().unwrap(), None);

        for _ in 0..3 {
            assert_eq!(pipeline.next_sample().unwrap(), None);
            assert_eq!(pipeline.next_byte().unwrap(), None);
            assert!(pipeline.next_buffer(8).unwrap().is_none());
            assert!(pipeline.next_block().unwrap().is_none());
            assert_eq!(pipeline.state(), PipelineState::Exhausted);
        }
        assert!(pipeline.close().is_ok());
    }

    #[test]
    fn empty_source_ends_immediately() {
        let mut pipeline = build(
            ScriptedDemuxer::new(Vec::new()),
            ScriptedDecoder::new(),
            ScriptedFilter::new(4),
        );
        assert_eq!(pipeline.state(), PipelineState::Starved);
        assert!(pipeline.next_block().unwrap().is_none());
        assert_eq!(pipeline.state(), PipelineState::Exhausted);
    }

    #[test]
    fn decoder_feed_failure_is_terminal_and_tagged() {
        let chunks = vec![vec![1, 2], vec![3, 4], vec![5]];
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &chunks),
            ScriptedDecoder::new().fail_on_feed(2),
            ScriptedFilter::new(1),
        );

        // Output produced before the failure stands.
        assert_eq!(pipeline.next_sample().unwrap(), Some(sample_for(1)));
        assert_eq!(pipeline.next_sample().unwrap(), Some(sample_for(2)));

        let err = pipeline.next_sample().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FeedFailure {
                stage: Stage::Decode,
                ..
            }
        ));
        assert_eq!(pipeline.state(), PipelineState::Errored);
        assert_eq!(pipeline.next_byte().unwrap_err(), err);
        assert_eq!(pipeline.next_block().unwrap_err(), err);
        assert_eq!(pipeline.close().unwrap_err(), err);
        assert_eq!(pipeline.close().unwrap_err(), err);
    }

    #[test]
    fn filter_receive_failure_is_tagged_with_filter_stage() {
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &[vec![1, 2, 3]]),
            ScriptedDecoder::new(),
            ScriptedFilter::new(1).fail_on_receive(4),
        );
        assert!(pipeline.next_sample().unwrap().is_some());
        assert!(pipeline.next_sample().unwrap().is_some());
        let err = pipeline.next_sample().unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Filter));
        assert!(matches!(err, PipelineError::ReceiveFailure { .. }));
    }

    #[test]
    fn source_read_failure_is_receive_failure() {
        let demuxer = ScriptedDemuxer::new(vec![Step::Unit(packet(TRACK, &[1])), Step::Fail]);
        let mut pipeline = build(demuxer, ScriptedDecoder::new(), ScriptedFilter::new(4));
        let err = pipeline.next_sample().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ReceiveFailure {
                stage: Stage::Source,
                ..
            }
        ));
    }

    #[test]
    fn busy_decoder_gets_the_same_packet_again() {
        let chunks = vec![vec![1, 2], vec![3]];
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &chunks),
            ScriptedDecoder::new().busy_for(1),
            ScriptedFilter::new(2),
        );
        assert_eq!(
            collect_samples(&mut pipeline),
            vec![sample_for(1), sample_for(2), sample_for(3)]
        );
    }

    #[test]
    fn busy_filter_gets_the_same_unit_again() {
        let chunks = vec![vec![1, 2], vec![3]];
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &chunks),
            ScriptedDecoder::new(),
            ScriptedFilter::new(2).busy_for(1),
        );
        assert_eq!(
            collect_samples(&mut pipeline),
            vec![sample_for(1), sample_for(2), sample_for(3)]
        );
    }

    #[test]
    fn decoder_refusing_input_while_starved_is_feed_failure() {
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &[vec![1]]),
            ScriptedDecoder::new().busy_for(usize::MAX),
            ScriptedFilter::new(2),
        );
        let err = pipeline.next_sample().unwrap_err();
        assert_eq!(err, stalled(Stage::Decode));
    }

    #[test]
    fn close_releases_filter_then_decoder_then_source() {
        let log = ReleaseLog::default();
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &[vec![1, 2, 3]]).logged(&log),
            ScriptedDecoder::new().logged(&log),
            ScriptedFilter::new(2).logged(&log),
        );
        assert!(pipeline.next_sample().unwrap().is_some());

        assert!(pipeline.close().is_ok());
        assert_eq!(*log.borrow(), vec!["filter", "decoder", "source"]);

        assert!(pipeline.close().is_ok());
        assert_eq!(log.borrow().len(), 3);

        // Unread output is discarded.
        assert_eq!(pipeline.next_sample().unwrap(), None);
        drop(pipeline);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn terminal_error_releases_handles_before_close() {
        let log = ReleaseLog::default();
        let mut pipeline = build(
            ScriptedDemuxer::new(vec![Step::Fail]).logged(&log),
            ScriptedDecoder::new().logged(&log),
            ScriptedFilter::new(2).logged(&log),
        );
        assert!(pipeline.next_sample().is_err());
        assert_eq!(*log.borrow(), vec!["filter", "decoder", "source"]);
        assert!(pipeline.close().is_err());
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn drop_releases_in_order() {
        let log = ReleaseLog::default();
        let pipeline = build(
            ScriptedDemuxer::packets(TRACK, &[vec![1]]).logged(&log),
            ScriptedDecoder::new().logged(&log),
            ScriptedFilter::new(2).logged(&log),
        );
        drop(pipeline);
        assert_eq!(*log.borrow(), vec!["filter", "decoder", "source"]);
    }

    fn pcm_track(id: u32, rate: u32) -> Track {
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_PCM_S16LE)
            .with_sample_rate(rate)
            .with_channels(Channels::FRONT_LEFT)
            .with_bits_per_sample(16)
            .with_bits_per_coded_sample(16)
            .with_max_frames_per_packet(1024);
        Track::new(id, params)
    }

    #[test]
    fn source_without_audio_track_is_released_alone() {
        let log = ReleaseLog::default();
        let source = ScriptedDemuxer::new(vec![]).logged(&log);
        let err = Pipeline::from_source(source, &PipelineConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, PipelineError::NoAudioTrack);
        assert_eq!(*log.borrow(), vec!["source"]);
    }

    #[test]
    fn unsupported_codec_is_decoder_init_failure() {
        let log = ReleaseLog::default();
        let mut params = CodecParameters::new();
        params.for_codec(CODEC_TYPE_OPUS).with_sample_rate(48_000);
        let source = ScriptedDemuxer::new(vec![])
            .with_tracks(vec![Track::new(TRACK, params)])
            .logged(&log);

        let err = Pipeline::from_source(source, &PipelineConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::DecoderInitFailure(_)));
        assert_eq!(*log.borrow(), vec!["source"]);
    }

    #[test]
    fn zero_rate_track_fails_filter_init_after_decoder() {
        let log = ReleaseLog::default();
        let source = ScriptedDemuxer::new(vec![])
            .with_tracks(vec![pcm_track(TRACK, 0)])
            .logged(&log);

        let err = Pipeline::from_source(source, &PipelineConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::FilterGraphInitFailure(_)));
        assert_eq!(*log.borrow(), vec!["source"]);
    }

    #[test]
    fn probed_source_decodes_through_real_engines() {
        // s16le: 16384, -16384, 8192, 0
        let chunks = vec![vec![0x00, 0x40, 0x00, 0xC0], vec![0x00, 0x20, 0x00, 0x00]];
        let source =
            ScriptedDemuxer::packets(TRACK, &chunks).with_tracks(vec![pcm_track(TRACK, 44_100)]);

        let mut pipeline = Pipeline::from_source(source, &PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.selected_track(), TRACK);
        assert_eq!(pipeline.source_info().container.as_deref(), Some("scripted"));
        assert_eq!(collect_samples(&mut pipeline), vec![0.5, -0.5, 0.25, 0.0]);
        assert_eq!(pipeline.state(), PipelineState::Exhausted);
    }

    #[test]
    fn a_few_empty_filter_blocks_are_skipped() {
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &[vec![1, 2, 3]]),
            ScriptedDecoder::new(),
            ScriptedFilter::new(2).empty_for(5),
        );
        assert_eq!(
            collect_samples(&mut pipeline),
            vec![sample_for(1), sample_for(2), sample_for(3)]
        );
    }

    #[test]
    fn endless_empty_filter_blocks_are_a_filter_failure() {
        let log = ReleaseLog::default();
        let mut pipeline = build(
            ScriptedDemuxer::packets(TRACK, &[vec![1, 2, 3]]).logged(&log),
            ScriptedDecoder::new().logged(&log),
            ScriptedFilter::new(2).empty_for(usize::MAX).logged(&log),
        );
        let err = pipeline.next_sample().unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Filter));
        assert!(matches!(err, PipelineError::ReceiveFailure { .. }));
        assert_eq!(pipeline.state(), PipelineState::Errored);
        assert_eq!(*log.borrow(), vec!["filter", "decoder", "source"]);
    }
}
