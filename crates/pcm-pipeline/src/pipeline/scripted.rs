//! Scripted engines for driving the cascade deterministically in tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use symphonia::core::formats::{Packet, Track};

use super::Pipeline;
use crate::decode::SourceInfo;
use crate::engine::{
    DecodedUnit, Decoder, Demuxer, EngineError, Feed, Filter, InputUnit, Poll, ProbedSource,
};

pub(crate) const TRACK: u32 = 1;
const RATE: u32 = 44_100;

/// Engine names in the order their handles were dropped.
pub(crate) type ReleaseLog = Rc<RefCell<Vec<&'static str>>>;

/// Sample the scripted decoder produces for an input byte.
pub(crate) fn sample_for(byte: u8) -> f32 {
    f32::from(byte) * 0.25 - 3.0
}

pub(crate) fn packet(track_id: u32, data: &[u8]) -> InputUnit {
    InputUnit::new(Packet::new_from_slice(track_id, 0, data.len() as u64, data))
}

pub(crate) fn build(
    demuxer: ScriptedDemuxer,
    decoder: ScriptedDecoder,
    filter: ScriptedFilter,
) -> Pipeline {
    Pipeline::from_engines(
        Box::new(demuxer),
        Box::new(decoder),
        Box::new(filter),
        TRACK,
        SourceInfo::default(),
    )
}

pub(crate) enum Step {
    Unit(InputUnit),
    Starve,
    Fail,
}

pub(crate) struct ScriptedDemuxer {
    steps: VecDeque<Step>,
    tracks: Vec<Track>,
    log: Option<ReleaseLog>,
}

impl ScriptedDemuxer {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            tracks: Vec::new(),
            log: None,
        }
    }

    pub(crate) fn packets(track_id: u32, chunks: &[Vec<u8>]) -> Self {
        Self::new(
            chunks
                .iter()
                .map(|c| Step::Unit(packet(track_id, c)))
                .collect(),
        )
    }

    pub(crate) fn with_tracks(mut self, tracks: Vec<Track>) -> Self {
        self.tracks = tracks;
        self
    }

    pub(crate) fn logged(mut self, log: &ReleaseLog) -> Self {
        self.log = Some(log.clone());
        self
    }
}

impl ProbedSource for ScriptedDemuxer {
    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn container(&self) -> Option<&str> {
        Some("scripted")
    }
}

impl Demuxer for ScriptedDemuxer {
    fn read(&mut self) -> Result<Poll<InputUnit>, EngineError> {
        match self.steps.pop_front() {
            Some(Step::Unit(unit)) => Ok(Poll::Ready(unit)),
            Some(Step::Starve) => Ok(Poll::Starved),
            Some(Step::Fail) => Err(EngineError::new("scripted read failure")),
            None => Ok(Poll::Exhausted),
        }
    }
}

impl Drop for ScriptedDemuxer {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.borrow_mut().push("source");
        }
    }
}

/// Turns each packet byte into one mono sample.
#[derive(Default)]
pub(crate) struct ScriptedDecoder {
    queue: VecDeque<Vec<u8>>,
    /// Packets held back before any output, like a codec with priming delay.
    lag: usize,
    busy_left: usize,
    fail_on_feed: Option<usize>,
    feeds: usize,
    finished: bool,
    log: Option<ReleaseLog>,
}

impl ScriptedDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_lag(mut self, lag: usize) -> Self {
        self.lag = lag;
        self
    }

    /// Answer the next `n` feeds with `Busy`.
    pub(crate) fn busy_for(mut self, n: usize) -> Self {
        self.busy_left = n;
        self
    }

    /// Fail the `n`th feed (1-based).
    pub(crate) fn fail_on_feed(mut self, n: usize) -> Self {
        self.fail_on_feed = Some(n);
        self
    }

    pub(crate) fn logged(mut self, log: &ReleaseLog) -> Self {
        self.log = Some(log.clone());
        self
    }
}

impl Decoder for ScriptedDecoder {
    fn feed(&mut self, unit: InputUnit) -> Result<Feed<InputUnit>, EngineError> {
        self.feeds += 1;
        if self.fail_on_feed == Some(self.feeds) {
            return Err(EngineError::new("scripted feed failure"));
        }
        if self.busy_left > 0 {
            self.busy_left -= 1;
            return Ok(Feed::Busy(unit));
        }
        self.queue.push_back(unit.packet.buf().to_vec());
        Ok(Feed::Accepted)
    }

    fn receive(&mut self) -> Result<Poll<DecodedUnit>, EngineError> {
        if self.queue.len() > self.lag || self.finished {
            if let Some(bytes) = self.queue.pop_front() {
                return Ok(Poll::Ready(DecodedUnit {
                    rate: RATE,
                    channels: 1,
                    samples: bytes.into_iter().map(sample_for).collect(),
                }));
            }
        }
        Ok(if self.finished {
            Poll::Exhausted
        } else {
            Poll::Starved
        })
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for ScriptedDecoder {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.borrow_mut().push("decoder");
        }
    }
}

/// Rechunks mono input into fixed-size blocks; the tail is emitted after `finish`.
pub(crate) struct ScriptedFilter {
    block: usize,
    pending: Vec<f32>,
    busy_left: usize,
    /// Empty blocks returned before any real output; `usize::MAX` never stops.
    empty_left: usize,
    fail_on_receive: Option<usize>,
    receives: usize,
    finished: bool,
    log: Option<ReleaseLog>,
}

impl ScriptedFilter {
    pub(crate) fn new(block: usize) -> Self {
        Self {
            block,
            pending: Vec::new(),
            busy_left: 0,
            empty_left: 0,
            fail_on_receive: None,
            receives: 0,
            finished: false,
            log: None,
        }
    }

    pub(crate) fn busy_for(mut self, n: usize) -> Self {
        self.busy_left = n;
        self
    }

    /// Answer the next `n` receives with an empty block.
    pub(crate) fn empty_for(mut self, n: usize) -> Self {
        self.empty_left = n;
        self
    }

    /// Fail the `n`th receive (1-based).
    pub(crate) fn fail_on_receive(mut self, n: usize) -> Self {
        self.fail_on_receive = Some(n);
        self
    }

    pub(crate) fn logged(mut self, log: &ReleaseLog) -> Self {
        self.log = Some(log.clone());
        self
    }
}

impl Filter for ScriptedFilter {
    fn feed(&mut self, unit: DecodedUnit) -> Result<Feed<DecodedUnit>, EngineError> {
        if self.busy_left > 0 {
            self.busy_left -= 1;
            return Ok(Feed::Busy(unit));
        }
        self.pending.extend(unit.samples);
        Ok(Feed::Accepted)
    }

    fn receive(&mut self) -> Result<Poll<Vec<f32>>, EngineError> {
        self.receives += 1;
        if self.fail_on_receive == Some(self.receives) {
            return Err(EngineError::new("scripted receive failure"));
        }
        if self.empty_left > 0 {
            self.empty_left -= 1;
            return Ok(Poll::Ready(Vec::new()));
        }
        if self.pending.len() >= self.block {
            return Ok(Poll::Ready(self.pending.drain(..self.block).collect()));
        }
        if self.finished {
            if self.pending.is_empty() {
                return Ok(Poll::Exhausted);
            }
            return Ok(Poll::Ready(std::mem::take(&mut self.pending)));
        }
        Ok(Poll::Starved)
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for ScriptedFilter {
    fn drop(&mut self) {
        if let Some(log) = &self.log {
            log.borrow_mut().push("filter");
        }
    }
}
