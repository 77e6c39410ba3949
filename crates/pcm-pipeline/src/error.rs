//! Pipeline error taxonomy.
//!
//! Every terminal failure is tagged with the stage that originated it so the
//! diagnostic printed at teardown names the real culprit. End of stream is not
//! an error and never appears here.

use thiserror::Error;

use crate::engine::Stage;

/// Terminal pipeline failure.
///
/// Errors are `Clone` because the pipeline keeps the first one and hands it back
/// from every later read and from [`crate::Pipeline::close`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The container could not be opened or probed.
    #[error("cannot open input: {0}")]
    OpenFailure(String),

    /// No track in the container carries decodable audio.
    #[error("no audio track found in input")]
    NoAudioTrack,

    #[error("cannot initialise decoder: {0}")]
    DecoderInitFailure(String),

    #[error("cannot build filter graph: {0}")]
    FilterGraphInitFailure(String),

    /// A stage refused a unit for a reason other than back-pressure.
    #[error("{stage} stage rejected input: {reason}")]
    FeedFailure { stage: Stage, reason: String },

    /// A stage reported an error (not starvation) while producing output.
    #[error("{stage} stage failed to produce output: {reason}")]
    ReceiveFailure { stage: Stage, reason: String },
}

impl PipelineError {
    pub(crate) fn feed(stage: Stage, reason: impl ToString) -> Self {
        Self::FeedFailure {
            stage,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn receive(stage: Stage, reason: impl ToString) -> Self {
        Self::ReceiveFailure {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Stage that raised a runtime failure; `None` for construction errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::FeedFailure { stage, .. } | Self::ReceiveFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;
