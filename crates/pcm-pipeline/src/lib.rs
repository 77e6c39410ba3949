//! Pull-driven audio decoding to a fixed-format `f32` PCM stream.
//!
//! A [`Pipeline`] cascades three stages (demux, decode, filter) and only does work
//! when a caller reads. Output is mono little-endian `f32` at
//! [`config::DEFAULT_TARGET_RATE`] unless configured otherwise.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod resample;
pub mod source;
pub mod status;

pub use config::PipelineConfig;
pub use decode::SourceInfo;
pub use engine::Stage;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, SAMPLE_BYTES};
pub use status::PipelineState;
