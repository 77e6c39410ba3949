//! Engine adapter boundary.
//!
//! The pipeline never talks to Symphonia or Rubato directly. Each engine sits behind
//! one of the traits below and answers every call with a tagged result:
//! - `feed` either accepts the unit or hands it back ([`Feed::Busy`])
//! - `receive` yields a unit, reports starvation, or reports exhaustion
//!
//! Closing an engine is dropping its box; adapters must release everything in `Drop`.

use std::fmt;

use symphonia::core::formats::{Packet, Track};
use thiserror::Error;

/// One of the three cascaded stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Container demultiplexing.
    Source,
    /// Codec decoding.
    Decode,
    /// Downmix, resample and rechunk.
    Filter,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Source => "source",
            Stage::Decode => "decode",
            Stage::Filter => "filter",
        })
    }
}

/// Outcome of asking an engine for output.
#[derive(Debug)]
pub enum Poll<T> {
    /// One unit of output.
    Ready(T),
    /// Needs more input before it can produce anything. Not an error.
    Starved,
    /// No more output will ever be produced.
    Exhausted,
}

/// Outcome of offering an engine a unit.
#[derive(Debug)]
pub enum Feed<T> {
    Accepted,
    /// The engine cannot take the unit right now; ownership returns to the caller.
    Busy(T),
}

/// Opaque failure raised inside an engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<symphonia::core::errors::Error> for EngineError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        Self(e.to_string())
    }
}

/// One container-level chunk of compressed data (a packet).
pub struct InputUnit {
    pub packet: Packet,
}

impl InputUnit {
    pub fn new(packet: Packet) -> Self {
        Self { packet }
    }

    /// Container track the packet belongs to.
    pub fn track_id(&self) -> u32 {
        self.packet.track_id()
    }
}

impl fmt::Debug for InputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputUnit")
            .field("track_id", &self.packet.track_id())
            .field("ts", &self.packet.ts())
            .field("dur", &self.packet.dur())
            .field("len", &self.packet.buf().len())
            .finish()
    }
}

/// One decoder-produced block of interleaved `f32` samples, before reformatting.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedUnit {
    pub rate: u32,
    pub channels: usize,
    pub samples: Vec<f32>,
}

impl DecodedUnit {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Container reader bound to one open input.
pub trait Demuxer {
    /// Read the next packet of any track.
    fn read(&mut self) -> Result<Poll<InputUnit>, EngineError>;
}

/// A demuxer whose tracks are known before the first packet is read.
pub trait ProbedSource: Demuxer {
    fn tracks(&self) -> &[Track];

    /// Track the container marks as default, if any.
    fn default_track(&self) -> Option<&Track> {
        None
    }

    /// Container label for diagnostics.
    fn container(&self) -> Option<&str> {
        None
    }
}

/// Codec session bound to the selected track.
pub trait Decoder {
    fn feed(&mut self, unit: InputUnit) -> Result<Feed<InputUnit>, EngineError>;
    fn receive(&mut self) -> Result<Poll<DecodedUnit>, EngineError>;
    /// Signal end of input; queued data must still drain through `receive`.
    fn finish(&mut self);
}

/// Reformatting session producing mono `f32` blocks at the target rate.
///
/// `receive` should not yield empty blocks; the pipeline skips a few but treats
/// a long run of them as a stalled filter.
pub trait Filter {
    fn feed(&mut self, unit: DecodedUnit) -> Result<Feed<DecodedUnit>, EngineError>;
    fn receive(&mut self) -> Result<Poll<Vec<f32>>, EngineError>;
    /// Signal end of input; the buffered remainder must still drain through `receive`.
    fn finish(&mut self);
}
