use crate::error::PipelineError;

/// Externally visible state of a pipeline's read cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// The current block has unread elements.
    Ready,
    /// The current block is consumed; the next read pulls through the cascade.
    Starved,
    /// End of stream was reached. Terminal.
    Exhausted,
    /// A stage failed. Terminal.
    Errored,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Errored)
    }
}

/// Most recent result recorded by the pipeline; keeps the terminal error for teardown.
#[derive(Clone, Debug, Default)]
pub(crate) enum Status {
    #[default]
    Ready,
    Starved,
    Exhausted,
    Errored(PipelineError),
}

impl Status {
    pub(crate) fn state(&self) -> PipelineState {
        match self {
            Status::Ready => PipelineState::Ready,
            Status::Starved => PipelineState::Starved,
            Status::Exhausted => PipelineState::Exhausted,
            Status::Errored(_) => PipelineState::Errored,
        }
    }

    pub(crate) fn error(&self) -> Option<&PipelineError> {
        match self {
            Status::Errored(e) => Some(e),
            _ => None,
        }
    }
}
